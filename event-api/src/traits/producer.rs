use crate::model::message::Message;

/// A transport binding able to publish messages.
pub trait MessageProducer: Send + Sync {
    /// A stable name identifying the binding (e.g. "memory", "amqp").
    fn name(&self) -> &str;

    /// Hands a message to the transport.
    ///
    /// # Returns
    ///
    /// * `true` if the transport accepted the message.
    /// * `false` on expected failures; implementations must not panic for those.
    fn publish(&self, channel: &str, message: &Message) -> bool;
}
