use std::net::SocketAddr;

use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use tungstenite::protocol::Message as WsMessage;

pub type SessionId = String;

/// Frames queued for one client before further frames are dropped.
pub const SESSION_QUEUE_CAPACITY: usize = 256;

/// A live WebSocket connection registered with the streaming relay.
///
/// The session does not own the socket. Frames pushed into `sender` are
/// written out by the connection's send loop. The queue is bounded; a client
/// that does not keep up loses frames instead of growing it.
#[derive(Debug)]
pub struct ClientSession {
    /// Unique identifier for the connection (`client-<uuid>`).
    pub id: SessionId,

    /// Remote address, when known.
    pub peer: Option<SocketAddr>,

    /// Channel to send WebSocket frames to the client.
    pub sender: Sender<WsMessage>,
}

impl ClientSession {
    pub fn new(sender: Sender<WsMessage>) -> Self {
        Self {
            id: format!("client-{}", uuid::Uuid::new_v4()),
            peer: None,
            sender,
        }
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Queues `frame` for the client without waiting.
    ///
    /// Fails with `Full` when the client is lagging and `Closed` once the
    /// connection's send loop has gone away.
    pub fn send(&self, frame: WsMessage) -> Result<(), TrySendError<WsMessage>> {
        self.sender.try_send(frame)
    }
}
