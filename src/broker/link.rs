//! Broker link
//!
//! The single point of contact with the external broker. A `BrokerLink` owns:
//! - the backend used for publishes
//! - the one subscription to the relayed channel, read by a worker task
//! - the pending-message slot the worker writes and pollers drain
//!
//! Concurrency and usage notes:
//! - The link is constructed once at startup and shared as `Arc<BrokerLink>`
//!   by the poll and publish paths.
//! - Subscription I/O happens only on the worker task. `drain_next` never
//!   touches the network, and `publish` awaits the backend's async client, so
//!   no request can stall the runtime.
//! - There is no reconnect. When the subscription stream ends the link is
//!   `Closed` for the rest of the process lifetime.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::broker::backend::{BrokerBackend, MessageStream};
use crate::broker::message::{Channel, Message, MessageKind};
use crate::broker::redis_backend::RedisBackend;
use crate::broker::slot::PendingSlot;
use crate::config::RedisSettings;
use crate::utils::RelayError;

/// Lifecycle of a `BrokerLink`. There is no way back from `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Uninitialized,
    Connected,
    Closed,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Connected => write!(f, "connected"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Counters describing traffic through a link.
#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    delivered: AtomicU64,
    overwritten: AtomicU64,
    published: AtomicU64,
}

/// Snapshot of a link's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Payload messages read from the subscription.
    pub received: u64,
    /// Messages handed to a poller.
    pub delivered: u64,
    /// Messages replaced in the slot before any poller took them.
    pub overwritten: u64,
    /// Successful publishes.
    pub published: u64,
}

/// State shared between the link handle and its subscription worker.
#[derive(Debug)]
struct Shared {
    slot: PendingSlot,
    state: Mutex<LinkState>,
    counters: Counters,
}

pub struct BrokerLink {
    channel: Channel,
    backend: Arc<dyn BrokerBackend>,
    shared: Arc<Shared>,
    worker: JoinHandle<()>,
}

impl BrokerLink {
    /// Subscribes to `channel` on `backend` and starts the subscription worker.
    ///
    /// Fails with `BrokerUnavailable` or `BrokerAuth` if the subscription cannot
    /// be established. There is no retry.
    pub async fn connect(
        backend: Arc<dyn BrokerBackend>,
        channel: Channel,
    ) -> Result<Self, RelayError> {
        let shared = Arc::new(Shared {
            slot: PendingSlot::new(),
            state: Mutex::new(LinkState::Uninitialized),
            counters: Counters::default(),
        });

        let subscription = backend.subscribe(&channel).await?;
        *shared.state.lock() = LinkState::Connected;
        info!(%channel, "broker subscription established");

        let worker = tokio::spawn(run_subscription(
            channel.clone(),
            subscription,
            shared.clone(),
        ));

        Ok(Self {
            channel,
            backend,
            shared,
            worker,
        })
    }

    /// Connects to Redis and subscribes to the configured channel.
    pub async fn connect_redis(settings: &RedisSettings) -> Result<Self, RelayError> {
        let backend = RedisBackend::connect(settings).await?;
        Self::connect(Arc::new(backend), Channel::new(settings.channel.as_str())).await
    }

    /// The channel this link is subscribed to.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn state(&self) -> LinkState {
        *self.shared.state.lock()
    }

    pub fn stats(&self) -> LinkStats {
        let counters = &self.shared.counters;
        LinkStats {
            received: counters.received.load(Ordering::Relaxed),
            delivered: counters.delivered.load(Ordering::Relaxed),
            overwritten: counters.overwritten.load(Ordering::Relaxed),
            published: counters.published.load(Ordering::Relaxed),
        }
    }

    /// Takes the pending message without waiting.
    ///
    /// Returns `Ok(None)` when nothing is pending, and `BrokerUnavailable` when
    /// nothing is pending and the subscription is gone.
    pub fn drain_next(&self) -> Result<Option<Message>, RelayError> {
        let taken = self.shared.slot.take();
        self.settle(taken)
    }

    /// Takes the pending message, waiting up to `wait` for one to arrive.
    pub async fn drain_next_within(&self, wait: Duration) -> Result<Option<Message>, RelayError> {
        if self.state() == LinkState::Closed {
            return self.drain_next();
        }
        let taken = self.shared.slot.take_within(wait).await;
        self.settle(taken)
    }

    fn settle(&self, taken: Option<Message>) -> Result<Option<Message>, RelayError> {
        match taken {
            Some(message) => {
                self.shared.counters.delivered.fetch_add(1, Ordering::Relaxed);
                Ok(Some(message))
            }
            None if self.state() == LinkState::Closed => Err(RelayError::BrokerUnavailable(
                format!("subscription to `{}` is closed", self.channel),
            )),
            None => Ok(None),
        }
    }

    /// Publishes `payload` on `channel`, returning the broker-reported number
    /// of subscribers that received it. Fails once the link is `Closed`.
    pub async fn publish(&self, channel: &Channel, payload: &[u8]) -> Result<u64, RelayError> {
        if self.state() == LinkState::Closed {
            return Err(RelayError::BrokerUnavailable(format!(
                "link to `{}` is closed",
                self.channel
            )));
        }
        let receivers = self.backend.publish(channel, payload).await?;
        self.shared.counters.published.fetch_add(1, Ordering::Relaxed);
        debug!(%channel, receivers, bytes = payload.len(), "published");
        Ok(receivers)
    }

    /// Stops the subscription worker. The link stays `Closed` afterwards.
    pub fn close(&self) {
        self.worker.abort();
        *self.shared.state.lock() = LinkState::Closed;
        info!(channel = %self.channel, "broker link closed");
    }
}

impl fmt::Debug for BrokerLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerLink")
            .field("channel", &self.channel)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for BrokerLink {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

/// Moves messages from the subscription into the pending slot until the
/// subscription ends.
async fn run_subscription(channel: Channel, mut subscription: MessageStream, shared: Arc<Shared>) {
    while let Some(message) = subscription.next().await {
        if message.kind == MessageKind::SubscribeAck {
            debug!(%channel, "subscription confirmed by broker");
            continue;
        }

        shared.counters.received.fetch_add(1, Ordering::Relaxed);
        if shared.slot.put(message).is_some() {
            shared.counters.overwritten.fetch_add(1, Ordering::Relaxed);
            debug!(%channel, "pending message overwritten before it was polled");
        }
    }

    *shared.state.lock() = LinkState::Closed;
    error!(%channel, "broker subscription ended; polling is unavailable until restart");
}
