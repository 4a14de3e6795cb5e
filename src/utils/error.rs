//! The `error` module defines the error types used within `chanrelay`.
//!
//! Every failure the relay can surface to a caller is a `RelayError` variant,
//! and each variant has a defined HTTP status so no request path ends with an
//! unset response code.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The broker cannot be reached, or the link to it has been lost.
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// The broker rejected the configured credentials.
    #[error("broker rejected credentials: {0}")]
    BrokerAuth(String),

    /// A required request parameter was absent or blank.
    #[error("missing parameter `{0}`")]
    MissingParameter(&'static str),

    /// The publish reached the broker but nobody was subscribed.
    #[error("published to `{channel}` but no subscriber received it")]
    NoSubscribers { channel: String },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Status code reported to HTTP callers for this error.
    ///
    /// `NoSubscribers` is resolved by the publish gateway against its
    /// configured status; the value here is its default.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameter(_) => StatusCode::BAD_REQUEST,
            Self::NoSubscribers { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BrokerUnavailable(_) | Self::BrokerAuth(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
