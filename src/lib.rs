//! # chanrelay
//!
//! `chanrelay` bridges HTTP clients to a single channel on an external
//! publish/subscribe broker (Redis). Browsers publish with `POST /publish` and
//! poll the most recent undelivered message with `GET /subscribe`. An optional
//! WebSocket listener echoes, logs or broadcasts frames between live
//! connections.
//!
//! ## Core Modules
//!
//! - `broker`: the broker link, its subscription worker and pending-message slot.
//! - `client`: a live WebSocket session.
//! - `config`: loading and validating server configuration.
//! - `relay`: poll, publish and streaming behaviour independent of transport.
//! - `server`: wires the relays to their listeners.
//! - `transport`: the HTTP routes and the WebSocket listener.
//! - `utils`: error type and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod relay;
pub mod server;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod tests;
