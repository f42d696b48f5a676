//! Fan-out of outbound messages to every registered transport.

use crate::event::subscriptions::same_instance;
use events::model::message::{
    METADATA_CHANNEL, METADATA_NODE_ID, METADATA_PUBLICATION_ID, METADATA_PUBLISHED,
    METADATA_RECIPIENTS,
};
use events::{Message, MessageProducer, Recipient};
use log::{debug, error, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Aggregates the registered message producers.
///
/// Producers are kept in registration order without duplicates. Every publication
/// is stamped with this node's id, the channel, a fresh publication id, the publish
/// time and, when given, the recipient constraints.
pub struct ProducerService {
    node_id: String,
    producers: RwLock<Vec<Arc<dyn MessageProducer>>>,
}

impl ProducerService {
    /// Creates a producer service.
    ///
    /// # Arguments
    ///
    /// * `node_id` - Identifier stamped on every publication; a random one is generated when `None`.
    pub fn new(node_id: Option<String>) -> Self {
        Self {
            node_id: node_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            producers: RwLock::new(Vec::new()),
        }
    }

    pub fn get_node_id(&self) -> &str {
        &self.node_id
    }

    /// Registers a producer.
    ///
    /// # Returns
    ///
    /// * `false` if this instance is already registered.
    pub fn register_producer(&self, producer: Arc<dyn MessageProducer>) -> bool {
        let mut producers = self.producers.write().unwrap_or_else(PoisonError::into_inner);
        if producers.iter().any(|p| same_instance(p, &producer)) {
            return false;
        }
        debug!("Registered producer '{}'", producer.name());
        producers.push(producer);
        true
    }

    /// Unregisters a producer; returns `false` if it was not registered.
    pub fn unregister_producer(&self, producer: &Arc<dyn MessageProducer>) -> bool {
        let mut producers = self.producers.write().unwrap_or_else(PoisonError::into_inner);
        match producers.iter().position(|p| same_instance(p, producer)) {
            Some(index) => {
                producers.remove(index);
                debug!("Unregistered producer '{}'", producer.name());
                true
            }
            None => false,
        }
    }

    /// Returns the registered producers in registration order.
    pub fn registered_producers(&self) -> Vec<Arc<dyn MessageProducer>> {
        self.producers.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Publishes a message through every registered producer.
    ///
    /// # Arguments
    ///
    /// * `channel` - The transport channel.
    /// * `message` - The message; its metadata is stamped in place.
    /// * `recipients` - Optional recipient constraints; empty means everyone.
    ///
    /// # Returns
    ///
    /// * `true` if at least one producer accepted the message; `false` with no producers.
    pub fn publish(&self, channel: &str, message: &mut Message, recipients: &[Recipient]) -> bool {
        let producers = self.registered_producers();
        if producers.is_empty() {
            warn!("No producers registered; message for '{}' was not sent", channel);
            return false;
        }

        self.prepare(channel, message, recipients);
        let mut accepted = false;
        for producer in &producers {
            accepted |= Self::publish_with(producer, channel, message);
        }
        accepted
    }

    /// Publishes a message through the single producer registered under `name`.
    ///
    /// # Returns
    ///
    /// * `false` if no producer has that name or it rejected the message.
    pub fn publish_to(&self, name: &str, channel: &str, message: &mut Message, recipients: &[Recipient]) -> bool {
        let producer = self
            .registered_producers()
            .into_iter()
            .find(|p| p.name() == name);

        match producer {
            Some(producer) => {
                self.prepare(channel, message, recipients);
                Self::publish_with(&producer, channel, message)
            }
            None => {
                warn!("No producer named '{}' is registered", name);
                false
            }
        }
    }

    fn prepare(&self, channel: &str, message: &mut Message, recipients: &[Recipient]) {
        message.set_metadata(METADATA_NODE_ID, self.node_id.as_str());
        message.set_metadata(METADATA_CHANNEL, channel);
        message.set_metadata(METADATA_PUBLICATION_ID, Uuid::new_v4().to_string());
        message.set_metadata(METADATA_PUBLISHED, chrono::Utc::now().timestamp_millis());

        if !recipients.is_empty() {
            match serde_json::to_value(recipients) {
                Ok(value) => message.set_metadata(METADATA_RECIPIENTS, value),
                Err(e) => error!("Cannot encode recipients for '{}': {}", channel, e),
            }
        }
    }

    fn publish_with(producer: &Arc<dyn MessageProducer>, channel: &str, message: &Message) -> bool {
        match panic::catch_unwind(AssertUnwindSafe(|| producer.publish(channel, message))) {
            Ok(accepted) => {
                if !accepted {
                    debug!("Producer '{}' rejected message on '{}'", producer.name(), channel);
                }
                accepted
            }
            Err(_) => {
                error!("Producer '{}' panicked publishing on '{}'", producer.name(), channel);
                false
            }
        }
    }
}
