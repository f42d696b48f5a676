//! Merges inbound traffic from every registered transport.

use crate::event::subscriptions::same_instance;
use crate::messaging::WeakCallback;
use events::{Message, MessageCallback, MessageConsumer};
use log::{debug, error};
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::{Duration, Instant};
use uuid::Uuid;

type Callbacks = HashMap<String, Vec<Arc<dyn MessageCallback>>>;

/// Remembers recently delivered publication ids.
///
/// Entries are kept in arrival order, so only the oldest entry has to be looked at
/// to know whether a sweep is due.
struct DeliveredCache {
    max_life: Duration,
    arrivals: HashMap<String, Instant>,
    order: VecDeque<(String, Instant)>,
}

impl DeliveredCache {
    fn new(max_life: Duration) -> Self {
        Self {
            max_life,
            arrivals: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Records `id` and returns true on its first sighting within the window.
    fn first_delivery(&mut self, id: &str, now: Instant) -> bool {
        self.evict_expired(now);

        if self.arrivals.contains_key(id) {
            return false;
        }
        self.arrivals.insert(id.to_string(), now);
        self.order.push_back((id.to_string(), now));
        true
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some((_, arrived)) = self.order.front() {
            if now.saturating_duration_since(*arrived) <= self.max_life {
                break;
            }
            if let Some((id, _)) = self.order.pop_front() {
                self.arrivals.remove(&id);
            }
        }
    }

    fn len(&self) -> usize {
        self.arrivals.len()
    }
}

#[derive(Clone, Copy)]
enum ChannelAction {
    Subscribe,
    Unsubscribe,
}

/// A transport call decided under the callbacks lock and made after it is released.
struct PendingAction {
    consumer: Arc<dyn MessageConsumer>,
    channel: String,
    action: ChannelAction,
}

impl PendingAction {
    fn apply(&self) {
        match self.action {
            ChannelAction::Subscribe => call_consumer(&self.consumer, "subscribe", || {
                self.consumer.subscribe(&self.channel);
            }),
            ChannelAction::Unsubscribe => call_consumer(&self.consumer, "unsubscribe", || {
                self.consumer.unsubscribe(&self.channel);
            }),
        }
    }
}

#[derive(Default)]
struct TransportQueue {
    pending: VecDeque<PendingAction>,
    draining: bool,
}

/// Runs one call into a transport, logging a panic instead of unwinding into the caller.
fn call_consumer(consumer: &Arc<dyn MessageConsumer>, operation: &str, call: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(call)).is_err() {
        error!("Consumer '{}' panicked during {}", consumer.name(), operation);
    }
}

/// Aggregates the registered message consumers.
///
/// Callbacks subscribe per channel; the first callback on a channel subscribes it on
/// every transport and the last one unsubscribes it. With two or more transports the
/// same publication can arrive more than once, so publication ids seen within the
/// dedup window are dropped.
///
/// Transport calls are queued while the callback map is locked and made once it is
/// released, in the order the channels opened and closed. A transport may therefore
/// deliver from inside `subscribe`, and the delivery may subscribe again.
pub struct ConsumerService {
    node_id: String,
    consumers: RwLock<Vec<Arc<dyn MessageConsumer>>>,
    callbacks: Mutex<Callbacks>,
    transport_queue: Mutex<TransportQueue>,
    delivered: Mutex<DeliveredCache>,
    weak_self: Weak<ConsumerService>,
}

impl ConsumerService {
    /// Creates a consumer service.
    ///
    /// # Arguments
    ///
    /// * `node_id` - Identifier of this consumer node; a random one is generated when `None`.
    /// * `dedup_max_life` - How long a delivered publication id is remembered.
    pub fn new(node_id: Option<String>, dedup_max_life: Duration) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            node_id: node_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            consumers: RwLock::new(Vec::new()),
            callbacks: Mutex::new(HashMap::new()),
            transport_queue: Mutex::new(TransportQueue::default()),
            delivered: Mutex::new(DeliveredCache::new(dedup_max_life)),
            weak_self: weak_self.clone(),
        })
    }

    pub fn get_node_id(&self) -> &str {
        &self.node_id
    }

    fn lock_callbacks(&self) -> MutexGuard<'_, Callbacks> {
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_queue(&self) -> MutexGuard<'_, TransportQueue> {
        self.transport_queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn consumers(&self) -> Vec<Arc<dyn MessageConsumer>> {
        self.consumers.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Queues `action` on `channel` for each of `consumers`. Callers hold the callbacks lock.
    fn enqueue<'a>(
        &self,
        consumers: impl IntoIterator<Item = &'a Arc<dyn MessageConsumer>>,
        channel: &str,
        action: ChannelAction,
    ) {
        let mut queue = self.lock_queue();
        for consumer in consumers {
            queue.pending.push_back(PendingAction {
                consumer: consumer.clone(),
                channel: channel.to_string(),
                action,
            });
        }
    }

    /// Makes the queued transport calls in order, holding no lock while a transport runs.
    ///
    /// If another drain is already running, on this thread or another, its loop picks
    /// up the new work and this call returns at once.
    pub(crate) fn flush_transports(&self) {
        {
            let mut queue = self.lock_queue();
            if queue.draining {
                return;
            }
            queue.draining = true;
        }

        loop {
            let next = {
                let mut queue = self.lock_queue();
                let next = queue.pending.pop_front();
                if next.is_none() {
                    queue.draining = false;
                }
                next
            };
            match next {
                Some(pending) => pending.apply(),
                None => return,
            }
        }
    }

    /// Registers a consumer, routes its traffic here and subscribes it to every active channel.
    ///
    /// # Returns
    ///
    /// * `false` if this instance is already registered.
    pub fn register_consumer(&self, consumer: Arc<dyn MessageConsumer>) -> bool {
        {
            let callbacks = self.lock_callbacks();
            let mut consumers = self.consumers.write().unwrap_or_else(PoisonError::into_inner);
            if consumers.iter().any(|c| same_instance(c, &consumer)) {
                return false;
            }
            consumers.push(consumer.clone());
            for channel in callbacks.keys() {
                self.enqueue([&consumer], channel, ChannelAction::Subscribe);
            }
        }

        let relay: Arc<dyn MessageCallback> = Arc::new(WeakCallback::new(self.weak_self.clone()));
        call_consumer(&consumer, "set_callback", || consumer.set_callback(Some(relay)));
        self.flush_transports();
        debug!("Registered consumer '{}'", consumer.name());
        true
    }

    /// Unregisters a consumer, unsubscribing it from every active channel.
    ///
    /// # Returns
    ///
    /// * `false` if it was not registered.
    pub fn unregister_consumer(&self, consumer: &Arc<dyn MessageConsumer>) -> bool {
        {
            let callbacks = self.lock_callbacks();
            let mut consumers = self.consumers.write().unwrap_or_else(PoisonError::into_inner);
            match consumers.iter().position(|c| same_instance(c, consumer)) {
                Some(index) => consumers.remove(index),
                None => return false,
            };
            for channel in callbacks.keys() {
                self.enqueue([consumer], channel, ChannelAction::Unsubscribe);
            }
        }

        self.flush_transports();
        call_consumer(consumer, "set_callback", || consumer.set_callback(None));
        debug!("Unregistered consumer '{}'", consumer.name());
        true
    }

    /// Returns the registered consumers in registration order.
    pub fn registered_consumers(&self) -> Vec<Arc<dyn MessageConsumer>> {
        self.consumers()
    }

    /// Adds a callback for `channel`.
    ///
    /// # Returns
    ///
    /// * `false` if the callback was already subscribed to the channel.
    pub fn subscribe(&self, channel: &str, callback: Arc<dyn MessageCallback>) -> bool {
        let added = self.add_callback(channel, callback);
        self.flush_transports();
        added
    }

    /// Removes a callback from `channel`.
    ///
    /// # Returns
    ///
    /// * `false` if the callback was not subscribed to the channel.
    pub fn unsubscribe(&self, channel: &str, callback: &Arc<dyn MessageCallback>) -> bool {
        let removed = self.remove_callback(channel, callback);
        self.flush_transports();
        removed
    }

    /// Adds a callback and queues the transport calls without making them.
    ///
    /// Lets a caller order channel changes under its own lock and call
    /// `flush_transports` after releasing it.
    pub(crate) fn add_callback(&self, channel: &str, callback: Arc<dyn MessageCallback>) -> bool {
        let mut callbacks = self.lock_callbacks();
        let list = callbacks.entry(channel.to_string()).or_default();
        if list.iter().any(|c| same_instance(c, &callback)) {
            return false;
        }
        list.push(callback);

        if list.len() == 1 {
            debug!("Subscribing transports to channel '{}'", channel);
            self.enqueue(&self.consumers(), channel, ChannelAction::Subscribe);
        }
        true
    }

    /// Removes a callback and queues the transport calls without making them.
    pub(crate) fn remove_callback(&self, channel: &str, callback: &Arc<dyn MessageCallback>) -> bool {
        let mut callbacks = self.lock_callbacks();
        let Some(list) = callbacks.get_mut(channel) else {
            return false;
        };
        let Some(index) = list.iter().position(|c| same_instance(c, callback)) else {
            return false;
        };
        list.remove(index);

        if list.is_empty() {
            callbacks.remove(channel);
            debug!("Unsubscribing transports from channel '{}'", channel);
            self.enqueue(&self.consumers(), channel, ChannelAction::Unsubscribe);
        }
        true
    }

    /// Returns the channels that currently have callbacks.
    pub fn get_channels(&self) -> Vec<String> {
        self.lock_callbacks().keys().cloned().collect()
    }

    /// Returns true if the message should be delivered, recording it if so.
    fn is_new_delivery(&self, message: &Message) -> bool {
        if self.consumers.read().unwrap_or_else(PoisonError::into_inner).len() < 2 {
            return true;
        }

        match message.get_publication_id() {
            Some(id) => self
                .delivered
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .first_delivery(id, Instant::now()),
            None => true,
        }
    }
}

impl MessageCallback for ConsumerService {
    fn on_message(&self, channel: &str, message: &Message) {
        if !self.is_new_delivery(message) {
            debug!("Dropping duplicate message {} on '{}'", message.get_id(), channel);
            return;
        }

        let callbacks = self.lock_callbacks().get(channel).cloned().unwrap_or_default();
        for callback in callbacks {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback.on_message(channel, message)));
            if outcome.is_err() {
                error!("Message callback panicked on channel '{}'", channel);
            }
        }
    }
}
