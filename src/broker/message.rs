use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of a broker channel, agreed on out-of-band by publishers and
/// subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Channel(String);

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Channel {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Channel {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// What a message delivered on a subscription represents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A payload published on the channel.
    Message,
    /// The broker confirming the subscription itself.
    SubscribeAck,
}

/// A message received from the broker subscription.
///
/// `timestamp` is the Unix time in milliseconds at which the relay received it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub channel: Channel,
    pub kind: MessageKind,
    pub payload: Vec<u8>,
    pub timestamp: i64,
}

impl Message {
    /// A published payload, stamped with the current time.
    pub fn published(channel: Channel, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            channel,
            kind: MessageKind::Message,
            payload: payload.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn subscribe_ack(channel: Channel) -> Self {
        Self {
            channel,
            kind: MessageKind::SubscribeAck,
            payload: Vec::new(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn is_payload(&self) -> bool {
        self.kind == MessageKind::Message
    }

    /// The payload rendered as text; invalid UTF-8 is replaced, not rejected.
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
