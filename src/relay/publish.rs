use std::sync::Arc;

use axum::http::StatusCode;
use tracing::{debug, error, warn};

use crate::broker::BrokerLink;
use crate::utils::RelayError;

/// Name of the request field carrying the payload.
pub const PAYLOAD_FIELD: &str = "type";

/// Publishing on the relayed channel.
#[derive(Debug, Clone)]
pub struct PublishGateway {
    link: Arc<BrokerLink>,
    no_subscribers_status: StatusCode,
}

impl PublishGateway {
    pub fn new(link: Arc<BrokerLink>) -> Self {
        Self {
            link,
            no_subscribers_status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Status reported when a publish reaches zero subscribers.
    pub fn with_no_subscribers_status(mut self, status: StatusCode) -> Self {
        self.no_subscribers_status = status;
        self
    }

    /// Publishes the trimmed `payload` on the link's channel.
    ///
    /// Returns the receiver count when at least one subscriber got the
    /// message. Otherwise fails with `MissingParameter`, `NoSubscribers`,
    /// `BrokerAuth` or `BrokerUnavailable`.
    pub async fn publish(&self, payload: Option<&str>) -> Result<u64, RelayError> {
        let payload = payload
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or(RelayError::MissingParameter(PAYLOAD_FIELD))?;

        let channel = self.link.channel();
        let receivers = match self.link.publish(channel, payload.as_bytes()).await {
            Ok(receivers) => receivers,
            Err(e) => {
                error!(error = %e, %channel, "publish failed");
                return Err(e);
            }
        };

        if receivers == 0 {
            warn!(%channel, "published but nobody is listening");
            return Err(RelayError::NoSubscribers {
                channel: channel.to_string(),
            });
        }

        debug!(%channel, receivers, "publish delivered");
        Ok(receivers)
    }

    /// Maps a publish result to the status returned to the caller.
    pub fn status_of(&self, result: &Result<u64, RelayError>) -> StatusCode {
        match result {
            Ok(_) => StatusCode::OK,
            Err(RelayError::NoSubscribers { .. }) => self.no_subscribers_status,
            Err(e) => e.status(),
        }
    }
}
