//! The seam between the relay and a concrete broker.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::broker::message::{Channel, Message};
use crate::utils::RelayError;

/// Messages delivered on a subscription, in broker order. The stream ends when
/// the subscription connection is lost.
pub type MessageStream = BoxStream<'static, Message>;

/// A publish/subscribe broker the relay can hold one subscription on.
#[async_trait]
pub trait BrokerBackend: Send + Sync {
    /// Opens a subscription to `channel`.
    async fn subscribe(&self, channel: &Channel) -> Result<MessageStream, RelayError>;

    /// Publishes `payload` on `channel` and returns how many subscribers
    /// received it, as reported by the broker.
    async fn publish(&self, channel: &Channel, payload: &[u8]) -> Result<u64, RelayError>;
}
