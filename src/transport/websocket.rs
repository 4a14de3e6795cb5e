//! WebSocket transport
//!
//! Accepts WebSocket connections and hands their data frames to the
//! `StreamingRelay`. Responsibilities:
//! - Accept TCP/WebSocket connections
//! - Create a `ClientSession` for each connection and register it once open
//! - Run a send loop writing queued frames to the socket
//! - Deregister the session when the connection closes or breaks the protocol
//!
//! A protocol violation closes the connection with code 1002.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::frame::coding::CloseCode;
use tungstenite::protocol::{CloseFrame, Message as WsMessage};

use crate::client::{ClientSession, SESSION_QUEUE_CAPACITY};
use crate::relay::StreamingRelay;

/// Accepts connections on `listener` until the task is dropped.
pub async fn start_websocket_server(listener: TcpListener, relay: Arc<StreamingRelay>) {
    if let Ok(addr) = listener.local_addr() {
        info!(mode = ?relay.mode(), "WebSocket server listening on ws://{addr}");
    }

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                spawn(handle_connection(stream, peer, relay.clone()));
            }
            Err(e) => {
                warn!(error = %e, "failed to accept WebSocket connection");
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, relay: Arc<StreamingRelay>) {
    debug!(%peer, "client connecting");

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, error = %e, "WebSocket handshake error");
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<WsMessage>(SESSION_QUEUE_CAPACITY);
    let session = ClientSession::new(tx.clone()).with_peer(peer);
    let session_id = session.id.clone();
    relay.register(session);

    let send_loop = {
        let session_id = session_id.clone();
        spawn(async move {
            while let Some(msg) = rx.recv().await {
                let closing = msg.is_close();
                if let Err(e) = ws_sender.send(msg).await {
                    debug!(session = %session_id, error = %e, "failed to send frame");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = ws_sender.close().await;
            debug!(session = %session_id, "send loop closed");
        })
    };

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(WsMessage::Close(close)) => {
                let reason = close.as_ref().map(|c| c.reason.as_str().to_owned());
                debug!(session = %session_id, ?reason, "client closed connection");
                break;
            }
            Ok(msg @ (WsMessage::Text(_) | WsMessage::Binary(_))) => {
                relay.handle_frame(&session_id, msg);
            }
            // Pings are answered by tungstenite itself.
            Ok(_) => {}
            Err(e) => {
                warn!(session = %session_id, error = %e, "protocol error, closing connection");
                let _ = tx
                    .send(WsMessage::Close(Some(CloseFrame {
                        code: CloseCode::Protocol,
                        reason: "protocol error".into(),
                    })))
                    .await;
                break;
            }
        }
    }

    relay.deregister(&session_id);
    drop(tx);
    let _ = send_loop.await;
}
