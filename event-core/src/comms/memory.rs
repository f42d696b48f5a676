use events::{Message, MessageCallback, MessageConsumer, MessageProducer};
use log::{debug, error, trace};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

/// In-process message broker for testing and demos.
///
/// Routes every published frame to each live transport subscribed to the channel.
/// Transports are held weakly; dropped ones are pruned on the next publish.
pub struct MemoryBroker {
    transports: Mutex<Vec<Weak<MemoryTransport>>>,
}

impl MemoryBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            transports: Mutex::new(Vec::new()),
        })
    }

    /// Creates a transport attached to this broker.
    ///
    /// # Arguments
    ///
    /// * `name` - The name the transport reports as producer and consumer.
    pub fn create_transport(self: &Arc<Self>, name: impl Into<String>) -> Arc<MemoryTransport> {
        let transport = Arc::new(MemoryTransport {
            name: name.into(),
            broker: self.clone(),
            channels: Mutex::new(HashSet::new()),
            callback: RwLock::new(None),
            online: AtomicBool::new(true),
        });
        self.transports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::downgrade(&transport));
        transport
    }

    /// Delivers a frame and returns the number of transports it reached.
    fn route(&self, channel: &str, frame: &[u8]) -> usize {
        let targets: Vec<Arc<MemoryTransport>> = {
            let mut transports = self.transports.lock().unwrap_or_else(PoisonError::into_inner);
            transports.retain(|t| t.strong_count() > 0);
            transports.iter().filter_map(Weak::upgrade).collect()
        };

        let mut reached = 0;
        for transport in targets.iter().filter(|t| t.is_subscribed(channel)) {
            if transport.receive(channel, frame) {
                reached += 1;
            }
        }
        trace!("Routed frame on '{}' to {} transport(s)", channel, reached);
        reached
    }
}

/// Loopback transport binding: both a producer and a consumer.
///
/// Messages are encoded to their JSON wire form on publish and decoded again on
/// receipt, exactly as a network transport would. A transport taken offline rejects
/// publishes and ignores inbound frames.
pub struct MemoryTransport {
    name: String,
    broker: Arc<MemoryBroker>,
    channels: Mutex<HashSet<String>>,
    callback: RwLock<Option<Arc<dyn MessageCallback>>>,
    online: AtomicBool,
}

impl MemoryTransport {
    /// Simulates a connection loss (`false`) or recovery (`true`).
    pub fn set_online(&self, online: bool) {
        debug!("Memory transport '{}' is now {}", self.name, if online { "online" } else { "offline" });
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(channel)
    }

    fn receive(&self, channel: &str, frame: &[u8]) -> bool {
        if !self.is_online() {
            return false;
        }

        let message = match Message::from_bytes(frame) {
            Ok(message) => message,
            Err(e) => {
                error!("Memory transport '{}' received a malformed frame: {}", self.name, e);
                return false;
            }
        };

        let callback = self.callback.read().unwrap_or_else(PoisonError::into_inner).clone();
        match callback {
            Some(callback) => {
                callback.on_message(channel, &message);
                true
            }
            None => false,
        }
    }
}

impl MessageProducer for MemoryTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&self, channel: &str, message: &Message) -> bool {
        if !self.is_online() {
            return false;
        }

        match message.to_bytes() {
            Ok(frame) => {
                self.broker.route(channel, &frame);
                true
            }
            Err(e) => {
                error!("Memory transport '{}' cannot encode message {}: {}", self.name, message.get_id(), e);
                false
            }
        }
    }
}

impl MessageConsumer for MemoryTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_callback(&self, callback: Option<Arc<dyn MessageCallback>>) {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = callback;
    }

    fn subscribe(&self, channel: &str) -> bool {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.to_string())
    }

    fn unsubscribe(&self, channel: &str) -> bool {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(channel)
    }
}
