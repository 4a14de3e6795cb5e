//! The `relay` module holds the client-facing contracts built on top of the
//! broker link and the streaming connection registry.
//!
//! - `poll`: `PollRelay`, the "is there a message for me right now" contract.
//! - `publish`: `PublishGateway`, publishing with a defined outcome status.
//! - `streaming`: `StreamingRelay`, the live WebSocket session registry.

pub mod poll;
pub mod publish;
pub mod streaming;

pub use poll::{NO_MESSAGE, PollRelay, PollResult};
pub use publish::PublishGateway;
pub use streaming::StreamingRelay;
