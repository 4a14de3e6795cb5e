use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use tracing::warn;

use crate::broker::BrokerLink;
use crate::config::MAX_POLL_WAIT_MS;

/// Body returned to a poller when there is nothing to deliver.
pub const NO_MESSAGE: &str = "-1";

/// Answer to a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult {
    /// A pending message, rendered as text. The poller now owns it.
    Message(String),
    /// Nothing was pending.
    Empty,
    /// The broker subscription is gone.
    Unavailable,
}

impl PollResult {
    pub fn body(&self) -> &str {
        match self {
            Self::Message(text) => text,
            Self::Empty | Self::Unavailable => NO_MESSAGE,
        }
    }

    /// `Unavailable` keeps the `-1` body but is told apart by its status.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Message(_) | Self::Empty => StatusCode::OK,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Polling on the relayed channel.
///
/// Pollers are competing consumers: each message goes to the first poller to
/// ask after it arrives, and to no other.
#[derive(Debug, Clone)]
pub struct PollRelay {
    link: Arc<BrokerLink>,
    wait: Duration,
}

impl PollRelay {
    /// `wait` bounds how long a poll may wait for a message; zero answers at
    /// once. It is capped at `MAX_POLL_WAIT_MS`.
    pub fn new(link: Arc<BrokerLink>, wait: Duration) -> Self {
        let wait = wait.min(Duration::from_millis(MAX_POLL_WAIT_MS));
        Self { link, wait }
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    pub async fn poll(&self) -> PollResult {
        match self.link.drain_next_within(self.wait).await {
            Ok(Some(message)) if message.is_payload() => PollResult::Message(message.payload_text()),
            Ok(_) => PollResult::Empty,
            Err(e) => {
                warn!(error = %e, channel = %self.link.channel(), "poll failed");
                PollResult::Unavailable
            }
        }
    }
}
