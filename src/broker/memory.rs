//! In-process broker.
//!
//! Each channel is a `tokio::sync::broadcast` channel, so the receiver count
//! of a publish is the number of open subscriptions, the same figure Redis
//! reports for `PUBLISH`.

use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::warn;

use crate::broker::backend::{BrokerBackend, MessageStream};
use crate::broker::message::{Channel, Message};
use crate::utils::RelayError;

/// Messages buffered per subscriber before the slowest one starts losing them.
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
pub struct MemoryBroker {
    channels: Mutex<HashMap<Channel, broadcast::Sender<Message>>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, channel: &Channel) -> broadcast::Sender<Message> {
        self.channels
            .lock()
            .entry(channel.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl BrokerBackend for MemoryBroker {
    async fn subscribe(&self, channel: &Channel) -> Result<MessageStream, RelayError> {
        let receiver = self.sender(channel).subscribe();
        let ack = stream::once(futures_util::future::ready(Message::subscribe_ack(
            channel.clone(),
        )));

        let messages = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => return Some((message, receiver)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "in-memory subscription lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(ack.chain(messages).boxed())
    }

    async fn publish(&self, channel: &Channel, payload: &[u8]) -> Result<u64, RelayError> {
        let message = Message::published(channel.clone(), payload.to_vec());
        // `send` only fails when nobody is subscribed.
        let receivers = self.sender(channel).send(message).unwrap_or(0);
        Ok(receivers as u64)
    }
}
