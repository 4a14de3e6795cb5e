//! Redis pub/sub backend.
//!
//! Publishes go through one multiplexed connection shared by every request;
//! the subscription uses its own dedicated connection, as Redis requires.

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::{
    AsyncCommands, Client, ConnectionAddr, ConnectionInfo, ErrorKind, RedisConnectionInfo,
    RedisError,
};
use tracing::debug;

use crate::broker::backend::{BrokerBackend, MessageStream};
use crate::broker::message::{Channel, Message, MessageKind};
use crate::config::RedisSettings;
use crate::utils::RelayError;

pub struct RedisBackend {
    client: Client,
    publisher: MultiplexedConnection,
}

impl RedisBackend {
    /// Connects to the broker described by `settings`.
    ///
    /// The publish connection is opened eagerly so unreachable hosts and
    /// rejected credentials surface here rather than on the first request.
    pub async fn connect(settings: &RedisSettings) -> Result<Self, RelayError> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(settings.host.clone(), settings.port),
            redis: RedisConnectionInfo {
                db: i64::from(settings.db),
                password: settings.password.clone(),
                ..Default::default()
            },
        };

        let client = Client::open(info).map_err(classify)?;
        let publisher = client
            .get_multiplexed_async_connection()
            .await
            .map_err(classify)?;

        debug!(host = %settings.host, port = settings.port, db = settings.db, "redis connected");
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl BrokerBackend for RedisBackend {
    async fn subscribe(&self, channel: &Channel) -> Result<MessageStream, RelayError> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(classify)?;
        pubsub.subscribe(channel.as_str()).await.map_err(classify)?;

        // The client consumes the subscribe confirmation itself; report it so
        // the subscription shape matches every other backend.
        let ack = futures_util::stream::once(futures_util::future::ready(
            Message::subscribe_ack(channel.clone()),
        ));
        let messages = pubsub.into_on_message().map(|msg| Message {
            channel: Channel::new(msg.get_channel_name()),
            kind: MessageKind::Message,
            payload: msg.get_payload_bytes().to_vec(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        });

        Ok(ack.chain(messages).boxed())
    }

    async fn publish(&self, channel: &Channel, payload: &[u8]) -> Result<u64, RelayError> {
        let mut conn = self.publisher.clone();
        let receivers: u64 = conn
            .publish(channel.as_str(), payload)
            .await
            .map_err(classify)?;
        Ok(receivers)
    }
}

/// Sorts a Redis error into the relay's broker failure variants.
pub fn classify(err: RedisError) -> RelayError {
    let auth_rejected = err.kind() == ErrorKind::AuthenticationFailed
        || matches!(err.code(), Some("NOAUTH" | "WRONGPASS"))
        || is_auth_response(&err);

    if auth_rejected {
        RelayError::BrokerAuth(err.to_string())
    } else {
        RelayError::BrokerUnavailable(err.to_string())
    }
}

/// A plain `ERR` reply to `AUTH`, such as a password sent to a server that has
/// none configured.
fn is_auth_response(err: &RedisError) -> bool {
    err.kind() == ErrorKind::ResponseError
        && err
            .detail()
            .is_some_and(|detail| detail.starts_with("AUTH") || detail.contains("invalid password"))
}
