//! HTTP routes
//!
//! `/publish` and `/subscribe` carry unrestricted CORS headers on every
//! response, including rejections and pre-flight replies, so browser pages
//! served from any origin can use them.

use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use crate::broker::{BrokerLink, LinkState};
use crate::relay::{PollRelay, PublishGateway, StreamingRelay};

const INDEX_HTML: &str = include_str!("static/subscribe.html");

/// Headers attached to every `/publish` and `/subscribe` response.
pub const CORS_HEADERS: [(HeaderName, &str); 4] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, GET, OPTIONS"),
    (header::ACCESS_CONTROL_MAX_AGE, "1000"),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "*"),
];

/// State of the broker-backed routes.
#[derive(Debug, Clone)]
pub struct RelayState {
    pub poll: PollRelay,
    pub publish: PublishGateway,
}

/// What `/health` reports on. Either part is `None` when disabled.
#[derive(Debug, Clone, Default)]
pub struct HealthState {
    pub link: Option<Arc<BrokerLink>>,
    pub streaming: Option<Arc<StreamingRelay>>,
}

/// Body of a publish request. The payload field is called `type`.
#[derive(Debug, Default, Deserialize)]
pub struct PublishForm {
    #[serde(rename = "type")]
    pub payload: Option<String>,
}

/// Builds the HTTP router. Without `relay` only `/` and `/health` are served.
pub fn build_router(relay: Option<RelayState>, health: HealthState) -> Router {
    let mut app = Router::new().route("/", get(index)).merge(
        Router::new()
            .route("/health", get(health_check))
            .with_state(health),
    );

    if let Some(state) = relay {
        let routes = Router::new()
            .route("/publish", axum::routing::post(publish).options(preflight))
            .route("/subscribe", get(subscribe).options(preflight))
            .with_state(state);
        app = app.merge(with_cors(routes));
    }

    app
}

fn with_cors(router: Router) -> Router {
    CORS_HEADERS.iter().fold(router, |router, (name, value)| {
        router.layer(SetResponseHeaderLayer::overriding(
            name.clone(),
            HeaderValue::from_static(*value),
        ))
    })
}

/// `GET /` — demo page polling `/subscribe`.
async fn index() -> Html<&'static str> {
    info!("index page requested");
    Html(INDEX_HTML)
}

/// `POST /publish` — publish the `type` field on the relayed channel.
///
/// The field is read from the form body, falling back to the query string.
async fn publish(
    State(state): State<RelayState>,
    Query(query): Query<PublishForm>,
    form: Result<Form<PublishForm>, FormRejection>,
) -> Response {
    let payload = form
        .ok()
        .and_then(|Form(form)| form.payload)
        .or(query.payload);

    let result = state.publish.publish(payload.as_deref()).await;
    let status = state.publish.status_of(&result);
    match result {
        Ok(_) => status.into_response(),
        Err(e) => (status, e.to_string()).into_response(),
    }
}

/// `GET /subscribe` — the pending message as text, or `-1`.
async fn subscribe(State(state): State<RelayState>) -> Response {
    let result = state.poll.poll().await;
    (result.status(), result.body().to_owned()).into_response()
}

/// `OPTIONS` on the relay routes. The CORS layer supplies the headers.
async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// `GET /health` — link state, counters and live session count.
async fn health_check(State(health): State<HealthState>) -> Response {
    let broker = health.link.as_ref().map(|link| {
        json!({
            "channel": link.channel(),
            "state": link.state(),
            "stats": link.stats(),
        })
    });
    let streaming = health.streaming.as_ref().map(|relay| {
        json!({
            "mode": relay.mode(),
            "sessions": relay.session_count(),
        })
    });

    let status = match &health.link {
        Some(link) if link.state() != LinkState::Connected => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (
        status,
        Json(json!({ "broker": broker, "streaming": streaming })),
    )
        .into_response()
}
