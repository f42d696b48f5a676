//! Aggregation of transport bindings.
//!
//! The producer service fans a message out to every registered producer; the
//! consumer service merges inbound traffic from every registered consumer and
//! suppresses duplicates when more than one transport may deliver the same
//! publication.

pub mod consumer;
pub mod context;
pub mod producer;

use events::{Message, MessageCallback};
use std::sync::Weak;

/// Forwards inbound messages to a target without keeping it alive.
///
/// Handed to transports and aggregators so that registering a service never
/// creates an ownership cycle with the collaborators it registers with.
pub(crate) struct WeakCallback<T: MessageCallback> {
    target: Weak<T>,
}

impl<T: MessageCallback> WeakCallback<T> {
    pub(crate) fn new(target: Weak<T>) -> Self {
        Self { target }
    }
}

impl<T: MessageCallback> MessageCallback for WeakCallback<T> {
    fn on_message(&self, channel: &str, message: &Message) {
        if let Some(target) = self.target.upgrade() {
            target.on_message(channel, message);
        }
    }
}
