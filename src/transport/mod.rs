//! The `transport` module is responsible for network communication with
//! clients.
//!
//! - `http`: the axum router exposing the demo page, `/publish`,
//!   `/subscribe` and `/health`.
//! - `websocket`: the WebSocket listener feeding the streaming relay.

pub mod http;
pub mod websocket;

pub use http::{HealthState, RelayState, build_router};
pub use websocket::start_websocket_server;
