//! Streaming relay
//!
//! Keeps the registry of live WebSocket sessions and decides what happens to
//! each inbound frame, according to the configured `StreamingMode`:
//! - `Echo`: the frame goes back to the session that sent it
//! - `Log`: the frame is only logged
//! - `Broadcast`: the frame goes to every live session, sender included
//!
//! The registry is independent of the broker link. Nothing published on the
//! broker channel reaches streaming sessions.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::client::{ClientSession, SessionId};
use crate::config::StreamingMode;

#[derive(Debug)]
pub struct StreamingRelay {
    mode: StreamingMode,
    sessions: Mutex<HashMap<SessionId, ClientSession>>,
}

impl StreamingRelay {
    pub fn new(mode: StreamingMode) -> Self {
        Self {
            mode,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn mode(&self) -> StreamingMode {
        self.mode
    }

    /// Adds a session once its connection is open.
    pub fn register(&self, session: ClientSession) {
        info!(session = %session.id, peer = ?session.peer, "session opened");
        self.sessions.lock().insert(session.id.clone(), session);
    }

    /// Removes a session when its connection closes, cleanly or not.
    pub fn deregister(&self, id: &SessionId) -> Option<ClientSession> {
        let removed = self.sessions.lock().remove(id);
        if removed.is_some() {
            info!(session = %id, "session closed");
        }
        removed
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Handles one inbound data frame from session `from`.
    ///
    /// Returns how many sessions the frame was queued for. Control frames are
    /// ignored here; the transport answers pings and handles closes.
    pub fn handle_frame(&self, from: &SessionId, frame: WsMessage) -> usize {
        match &frame {
            WsMessage::Text(text) => {
                info!(session = %from, text = %text.as_str(), "text frame received");
            }
            WsMessage::Binary(bytes) => {
                info!(session = %from, bytes = bytes.len(), "binary frame received");
            }
            _ => return 0,
        }

        match self.mode {
            StreamingMode::Log => 0,
            StreamingMode::Echo => {
                let sessions = self.sessions.lock();
                match sessions.get(from) {
                    Some(session) => usize::from(queue(session, frame)),
                    None => {
                        debug!(session = %from, "frame from unregistered session");
                        0
                    }
                }
            }
            StreamingMode::Broadcast => {
                let sessions = self.sessions.lock();
                sessions
                    .values()
                    .filter(|session| queue(session, frame.clone()))
                    .count()
            }
        }
    }
}

/// Queues `frame` for `session`, dropping it if the session is lagging or gone.
fn queue(session: &ClientSession, frame: WsMessage) -> bool {
    match session.send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(session = %session.id, "client lagging, frame dropped");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(session = %session.id, "send loop closed, frame dropped");
            false
        }
    }
}
