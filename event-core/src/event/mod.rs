pub mod dispatcher;
pub mod manager;
pub mod ping;
pub mod subscriptions;
pub mod util;
