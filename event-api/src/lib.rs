//! # Events API
//!
//! Value types and collaborator contracts shared by the event manager, the global
//! dispatcher and every transport binding.
//!
//! ## Modules
//! - `model`: `Message`, `Recipient`, `PublisherInfo`, ping types and the authenticated `User`.
//! - `traits`: subscriber, dispatcher, producer/consumer and identity contracts.

pub mod error;
pub mod model;
pub mod traits;

pub use error::ModelError;
pub use model::message::Message;
pub use model::ping::{PingFilter, PingFilterType, PingRequest};
pub use model::publisher::PublisherInfo;
pub use model::recipient::{Recipient, RecipientType};
pub use model::user::User;
pub use traits::consumer::{MessageCallback, MessageConsumer};
pub use traits::dispatcher::{EventService, LocalDispatcher, RemoteDispatcher};
pub use traits::identity::IdentityProvider;
pub use traits::producer::MessageProducer;
pub use traits::subscriber::{EventSubscriber, subscriber_fn, typed_subscriber};

/// Open payload carried by events and messages.
///
/// Callers agree on the concrete shape per topic and use the typed helpers
/// (`Message::payload_as`, `typed_subscriber`) to recover it.
pub type Payload = serde_json::Value;

pub mod prelude {
    pub use crate::Payload;
    pub use crate::model::message::Message;
    pub use crate::model::ping::{PingFilter, PingFilterType};
    pub use crate::model::publisher::PublisherInfo;
    pub use crate::model::recipient::{Recipient, RecipientType};
    pub use crate::traits::dispatcher::EventService;
    pub use crate::traits::subscriber::{EventSubscriber, subscriber_fn, typed_subscriber};
}
