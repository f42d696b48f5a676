use crate::model::message::Message;
use std::sync::Arc;

/// Invoked when a message arrives on a subscribed channel.
pub trait MessageCallback: Send + Sync {
    fn on_message(&self, channel: &str, message: &Message);
}

/// A transport binding able to receive messages.
pub trait MessageConsumer: Send + Sync {
    /// A stable name identifying the binding.
    fn name(&self) -> &str;

    /// Sets the callback inbound messages are handed to; `None` detaches it.
    fn set_callback(&self, callback: Option<Arc<dyn MessageCallback>>);

    /// Starts receiving a channel.
    ///
    /// # Returns
    ///
    /// * `true` if the channel was newly subscribed.
    fn subscribe(&self, channel: &str) -> bool;

    /// Stops receiving a channel.
    ///
    /// # Returns
    ///
    /// * `false` if the channel was not subscribed.
    fn unsubscribe(&self, channel: &str) -> bool;
}
