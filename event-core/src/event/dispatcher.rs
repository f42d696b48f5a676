//! Bridges local event delivery to the messaging transports.

use crate::config::MessagingConfig;
use crate::error::EventError;
use crate::event::manager::EventManager;
use crate::event::ping::{EVENT_PING_REQUEST, PingEventHandler};
use crate::event::subscriptions::same_instance;
use crate::event::util::channel_name;
use crate::messaging::WeakCallback;
use crate::messaging::consumer::ConsumerService;
use crate::messaging::producer::ProducerService;
use events::model::recipient::is_excluded;
use events::{
    EventService, IdentityProvider, LocalDispatcher, Message, MessageCallback, Payload, PingFilter,
    PingRequest, PublisherInfo, Recipient, RecipientType, RemoteDispatcher,
};
use log::{debug, error, info};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use uuid::Uuid;

/// Fired remotely when this process announces that it is connected.
pub const EVENT_CONNECT: &str = "CONNECT";
/// Fired remotely when this process announces that it is disconnecting.
pub const EVENT_DISCONNECT: &str = "DISCONNECT";

/// The process-wide remote dispatcher.
///
/// Outbound, it wraps remote events into messages and hands them to the producer
/// service. Inbound, it receives messages from the consumer service and turns them
/// into local event deliveries, never publishing them again. It also owns the
/// `PublisherInfo` identifying this process and answers ping requests.
///
/// Topics sharing a first segment share a channel. The dispatcher keeps the set of
/// subscribed topics per channel and opens or closes a channel only when that set
/// becomes non-empty or empty.
pub struct GlobalEventDispatcher {
    event_manager: Arc<EventManager>,
    producer: Arc<ProducerService>,
    consumer: Arc<ConsumerService>,
    identity: Arc<dyn IdentityProvider>,
    app_name: Option<String>,
    node_id: Option<String>,
    session_id: String,
    publisher_info: RwLock<PublisherInfo>,
    ping_handler: Mutex<Option<Arc<PingEventHandler>>>,
    channel_topics: Mutex<HashMap<String, HashSet<String>>>,
    inbound: Arc<dyn MessageCallback>,
    weak_self: Weak<GlobalEventDispatcher>,
}

impl GlobalEventDispatcher {
    /// Creates a dispatcher. Nothing is wired until `init` is called.
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies the application name (commas become spaces) and node id.
    /// * `event_manager` - The local event manager this dispatcher attaches to.
    /// * `producer` / `consumer` - The transport aggregators.
    /// * `identity` - Source of the authenticated user.
    pub fn new(
        config: &MessagingConfig,
        event_manager: Arc<EventManager>,
        producer: Arc<ProducerService>,
        consumer: Arc<ConsumerService>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self: &Weak<Self>| Self {
            event_manager,
            producer,
            consumer,
            identity,
            app_name: config.app_name().map(|name| name.replace(',', " ")),
            node_id: config.node_id().map(str::to_string),
            session_id: Uuid::new_v4().to_string(),
            publisher_info: RwLock::new(PublisherInfo::new()),
            ping_handler: Mutex::new(None),
            channel_topics: Mutex::new(HashMap::new()),
            inbound: Arc::new(WeakCallback::new(weak_self.clone())),
            weak_self: weak_self.clone(),
        })
    }

    /// Builds the publisher info, attaches to the event manager and starts answering pings.
    pub fn init(&self) {
        let info = self.build_publisher_info();
        info!("Initializing global event dispatcher for {}", info);
        *self.publisher_info.write().unwrap_or_else(PoisonError::into_inner) = info.clone();

        if let Some(this) = self.weak_self.upgrade() {
            self.event_manager.set_global_event_dispatcher(Some(this));
        }

        let handler = PingEventHandler::new(self.event_manager.clone(), info);
        handler.init();
        let previous = self
            .ping_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handler);
        if let Some(previous) = previous {
            previous.destroy();
        }
    }

    /// Stops answering pings, releases the transport channels and detaches from the event manager.
    pub fn destroy(&self) {
        let handler = self.ping_handler.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handler) = handler {
            handler.destroy();
        }

        let attached = self.event_manager.get_global_event_dispatcher();
        if let (Some(attached), Some(this)) = (attached, self.weak_self.upgrade()) {
            let this: Arc<dyn RemoteDispatcher> = this;
            if same_instance(&attached, &this) {
                self.event_manager.set_global_event_dispatcher(None);
            }
        }

        {
            let mut channel_topics = self.lock_channel_topics();
            for (channel, _) in channel_topics.drain() {
                self.consumer.remove_callback(&channel, &self.inbound);
            }
        }
        self.consumer.flush_transports();
        debug!("Global event dispatcher destroyed");
    }

    fn lock_channel_topics(&self) -> MutexGuard<'_, HashMap<String, HashSet<String>>> {
        self.channel_topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn build_publisher_info(&self) -> PublisherInfo {
        let user = self.identity.get_authenticated_user();
        let mut info = PublisherInfo::new();
        info.set_endpoint_id(Some(Uuid::new_v4().to_string()));
        info.set_user_id(user.as_ref().map(|u| u.get_logical_id().to_string()));
        info.set_user_name(Some(user.map(|u| u.get_full_name().to_string()).unwrap_or_default()));
        info.set_app_name(self.app_name.clone());
        info.set_node_id(self.node_id.clone());
        info.set_consumer_id(Some(self.consumer.get_node_id().to_string()));
        info.set_producer_id(Some(self.producer.get_node_id().to_string()));
        info.set_session_id(Some(self.session_id.clone()));
        info
    }

    pub fn get_app_name(&self) -> Option<&str> {
        self.app_name.as_deref()
    }

    pub fn get_session_id(&self) -> &str {
        &self.session_id
    }

    /// Announces this process as connected or disconnected.
    ///
    /// Fires `CONNECT` or `DISCONNECT` remotely with the publisher info as payload.
    pub fn update_connection_status(&self, connected: bool) {
        let event_name = if connected { EVENT_CONNECT } else { EVENT_DISCONNECT };
        let result = serde_json::to_value(self.get_publisher_info())
            .map_err(anyhow::Error::from)
            .and_then(|info| self.fire_remote_event(event_name, &info, &[]));

        if let Err(e) = result {
            error!("Error announcing '{}': {:#}", event_name, e);
        }
    }

    fn is_message_excluded(&self, message: &Message) -> bool {
        let info = self.publisher_info.read().unwrap_or_else(PoisonError::into_inner);
        let recipients = message.get_recipients();
        if recipients.is_empty() {
            return false;
        }

        is_excluded(&recipients, RecipientType::User, info.get_user_id())
            || is_excluded(&recipients, RecipientType::Application, info.get_app_name())
            || is_excluded(&recipients, RecipientType::Session, info.get_session_id())
            || is_excluded(&recipients, RecipientType::Consumer, info.get_consumer_id())
    }
}

impl RemoteDispatcher for GlobalEventDispatcher {
    fn get_publisher_info(&self) -> PublisherInfo {
        self.publisher_info
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn subscribe_remote_event(&self, event_name: &str, subscribe: bool) -> anyhow::Result<()> {
        let channel = channel_name(event_name);

        {
            let mut channel_topics = self.lock_channel_topics();
            if subscribe {
                let topics = channel_topics.entry(channel.clone()).or_default();
                if topics.insert(event_name.to_string()) && topics.len() == 1 {
                    self.consumer.add_callback(&channel, self.inbound.clone());
                }
            } else if let Some(topics) = channel_topics.get_mut(&channel) {
                if topics.remove(event_name) && topics.is_empty() {
                    channel_topics.remove(&channel);
                    self.consumer.remove_callback(&channel, &self.inbound);
                }
            }
        }

        // Transports may deliver synchronously, and a delivery may subscribe again.
        self.consumer.flush_transports();
        Ok(())
    }

    fn fire_remote_event(&self, event_name: &str, data: &Payload, recipients: &[Recipient]) -> anyhow::Result<()> {
        let channel = channel_name(event_name);
        let mut message = Message::new(event_name, data.clone());

        if !self.producer.publish(&channel, &mut message, recipients)
            && !self.producer.registered_producers().is_empty()
        {
            return Err(EventError::PublishRejected(channel).into());
        }
        Ok(())
    }

    fn ping(&self, response_event: &str, filters: Vec<PingFilter>, recipients: &[Recipient]) -> anyhow::Result<()> {
        let consumer_id = self
            .get_publisher_info()
            .get_consumer_id()
            .map(str::to_string)
            .unwrap_or_else(|| self.consumer.get_node_id().to_string());
        let requestor = Recipient::new(RecipientType::Consumer, consumer_id);
        let request = PingRequest::new(response_event, filters, requestor);

        let payload = serde_json::to_value(&request)?;
        self.fire_remote_event(EVENT_PING_REQUEST, &payload, recipients)
    }
}

impl MessageCallback for GlobalEventDispatcher {
    fn on_message(&self, channel: &str, message: &Message) {
        if self.is_message_excluded(message) {
            debug!("Message {} on '{}' is not addressed to this process", message.get_id(), channel);
            return;
        }
        self.event_manager
            .fire_local_event(message.get_type(), message.get_payload());
    }
}
