pub mod message;
pub mod ping;
pub mod publisher;
pub mod recipient;
pub mod user;
