pub mod consumer;
pub mod dispatcher;
pub mod identity;
pub mod producer;
pub mod subscriber;
