pub mod memory;

pub use memory::{MemoryBroker, MemoryTransport};
