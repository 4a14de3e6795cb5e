//! The `broker` module owns everything that talks to the external
//! publish/subscribe broker.
//!
//! - `backend`: the `BrokerBackend` trait implemented by each broker client.
//! - `redis_backend`: Redis pub/sub.
//! - `memory`: an in-process broker with the same receiver-count semantics.
//! - `slot`: the single-slot pending-message holder.
//! - `link`: `BrokerLink`, the one subscription shared by the relay.

pub mod backend;
pub mod link;
pub mod memory;
pub mod message;
pub mod redis_backend;
pub mod slot;

pub use backend::{BrokerBackend, MessageStream};
pub use link::{BrokerLink, LinkState, LinkStats};
pub use memory::MemoryBroker;
pub use message::{Channel, Message, MessageKind};
pub use redis_backend::RedisBackend;

#[cfg(test)]
mod tests;
