//! The `client` module defines the representation of a streaming client.
//!
//! It provides the `ClientSession` struct, which encapsulates the state of a
//! single WebSocket connection: its identifier and the channel used to send
//! frames to it.

pub mod session;
pub use session::{ClientSession, SESSION_QUEUE_CAPACITY, SessionId};
