//! Server shell
//!
//! Wires the relay components to their listeners according to the feature
//! flags in `Settings`:
//! - `features.enable_broker`: connect the `BrokerLink` and serve `/publish`
//!   and `/subscribe`
//! - `features.enable_streaming`: bind the WebSocket listener
//!
//! `bind` performs every step that can fail at startup (broker connection,
//! listener binds) before anything is served.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::broker::{BrokerLink, Channel, MemoryBroker};
use crate::config::{BrokerBackendKind, Settings};
use crate::relay::{PollRelay, PublishGateway, StreamingRelay};
use crate::transport::{HealthState, RelayState, build_router, start_websocket_server};
use crate::utils::RelayError;

pub struct ServerShell {
    settings: Settings,
    link: Option<Arc<BrokerLink>>,
    streaming: Option<Arc<StreamingRelay>>,
    http_listener: TcpListener,
    socket_listener: Option<TcpListener>,
}

impl ServerShell {
    /// Connects the broker and binds the listeners enabled in `settings`.
    pub async fn bind(settings: Settings) -> Result<Self, RelayError> {
        let link = if settings.features.enable_broker {
            Some(Arc::new(connect_broker(&settings).await?))
        } else {
            None
        };
        Self::bind_with_link(settings, link).await
    }

    /// Like `bind`, with an already connected link (or none).
    pub async fn bind_with_link(
        settings: Settings,
        link: Option<Arc<BrokerLink>>,
    ) -> Result<Self, RelayError> {
        let http_listener = TcpListener::bind(settings.http_addr()).await?;

        let (streaming, socket_listener) = if settings.features.enable_streaming {
            let listener = TcpListener::bind(settings.socket_addr()).await?;
            let relay = Arc::new(StreamingRelay::new(settings.socket.mode));
            (Some(relay), Some(listener))
        } else {
            (None, None)
        };

        Ok(Self {
            settings,
            link,
            streaming,
            http_listener,
            socket_listener,
        })
    }

    pub fn http_addr(&self) -> std::io::Result<SocketAddr> {
        self.http_listener.local_addr()
    }

    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.socket_listener
            .as_ref()
            .and_then(|listener| listener.local_addr().ok())
    }

    pub fn link(&self) -> Option<&Arc<BrokerLink>> {
        self.link.as_ref()
    }

    /// The HTTP router for the current settings.
    pub fn router(&self) -> Router {
        let relay = self.link.as_ref().map(|link| {
            let no_subscribers = StatusCode::from_u16(self.settings.relay.no_subscribers_status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let poll = PollRelay::new(
                link.clone(),
                Duration::from_millis(self.settings.relay.poll_wait_ms),
            );
            debug!(wait = ?poll.wait(), "poll relay ready");
            RelayState {
                poll,
                publish: PublishGateway::new(link.clone())
                    .with_no_subscribers_status(no_subscribers),
            }
        });
        let health = HealthState {
            link: self.link.clone(),
            streaming: self.streaming.clone(),
        };
        build_router(relay, health)
    }

    /// Serves until `shutdown` resolves, then closes the broker link.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), RelayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        info!(
            http = ?self.http_addr().ok(),
            socket = ?self.socket_addr(),
            broker = self.link.is_some(),
            "chanrelay serving"
        );

        let http = axum::serve(self.http_listener, router)
            .with_graceful_shutdown(shutdown)
            .into_future();

        match (self.socket_listener, self.streaming) {
            (Some(listener), Some(relay)) => {
                tokio::select! {
                    result = http => result?,
                    _ = start_websocket_server(listener, relay) => {
                        error!("WebSocket server exited unexpectedly.");
                    }
                }
            }
            _ => http.await?,
        }

        if let Some(link) = &self.link {
            link.close();
        }
        Ok(())
    }
}

async fn connect_broker(settings: &Settings) -> Result<BrokerLink, RelayError> {
    match settings.features.broker_backend {
        BrokerBackendKind::Redis => BrokerLink::connect_redis(&settings.redis).await,
        BrokerBackendKind::Memory => {
            let channel = Channel::new(settings.redis.channel.as_str());
            BrokerLink::connect(Arc::new(MemoryBroker::new()), channel).await
        }
    }
}
