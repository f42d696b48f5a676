//! # Event Core Library
//!
//! Local and remote event delivery for one application process.
//!
//! ## Modules
//! - `event`: hierarchical subscriptions, the `EventManager`, the `GlobalEventDispatcher` and ping discovery.
//! - `messaging`: producer/consumer aggregation with duplicate suppression, and the hosting `MessagingContext`.
//! - `comms`: the in-memory loopback transport.
//! - `config`: layered configuration and elapsed-time parsing.
//! - `args`: standard command-line arguments.

pub mod args;
pub mod comms;
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod messaging;

pub use error::{EventError, Result};
pub use event::dispatcher::GlobalEventDispatcher;
pub use event::manager::EventManager;
pub use event::subscriptions::EventSubscriptions;
pub use messaging::consumer::ConsumerService;
pub use messaging::context::MessagingContext;
pub use messaging::producer::ProducerService;
