//! HTTP request handlers
//!
//! `/sent` and `/recv` hold the response open and stream one hub direction
//! through a [`StreamBridge`]. `/start` and `/stop` drive the node session and
//! answer with a small JSON status object.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::bridge::{ChannelSink, StreamBridge};
use crate::error::Result;
use crate::hub::Direction;
use crate::server::config::ServerConfig;
use crate::session::{NodeLauncher, NodeSession, Transition};
use crate::stats::NodeStats;

/// State shared by every handler of one server
pub struct AppState<L: NodeLauncher> {
    /// Session driven by `/start` and `/stop`
    pub session: Arc<NodeSession<L>>,
    /// Server options
    pub config: Arc<ServerConfig>,
    /// Parent of every open stream's disconnect token
    pub shutdown: CancellationToken,
}

impl<L: NodeLauncher> Clone for AppState<L> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            config: Arc::clone(&self.config),
            shutdown: self.shutdown.clone(),
        }
    }
}

/// Outcome class of a control request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlStatus {
    /// The transition happened
    Ok,
    /// Nothing to do; the node was already in the requested state
    Warning,
    /// The node failed to launch or shut down
    Error,
}

/// Body of a `/start` or `/stop` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlResponse {
    /// Outcome class
    pub status: ControlStatus,
    /// Human readable diagnostic
    pub message: String,
}

impl ControlResponse {
    fn from_result(result: Result<Transition>) -> Self {
        match result {
            Ok(transition) if transition.is_warning() => Self {
                status: ControlStatus::Warning,
                message: transition.message().to_string(),
            },
            Ok(transition) => Self {
                status: ControlStatus::Ok,
                message: transition.message().to_string(),
            },
            Err(e) => Self {
                status: ControlStatus::Error,
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for ControlResponse {
    fn into_response(self) -> Response {
        let code = match self.status {
            ControlStatus::Error => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK,
        };
        (code, Json(self)).into_response()
    }
}

/// Build the router for one node session
pub fn router<L: NodeLauncher>(state: AppState<L>) -> Router {
    Router::new()
        .route("/sent", get(sent::<L>))
        .route("/recv", get(recv::<L>))
        .route("/start", get(start::<L>).post(start::<L>))
        .route("/stop", get(stop::<L>).post(stop::<L>))
        .route("/stats", get(stats::<L>))
        .with_state(state)
}

async fn sent<L: NodeLauncher>(State(state): State<AppState<L>>) -> Response {
    stream(state, Direction::Outbound)
}

async fn recv<L: NodeLauncher>(State(state): State<AppState<L>>) -> Response {
    stream(state, Direction::Inbound)
}

async fn start<L: NodeLauncher>(State(state): State<AppState<L>>) -> ControlResponse {
    ControlResponse::from_result(state.session.start().await)
}

async fn stop<L: NodeLauncher>(State(state): State<AppState<L>>) -> ControlResponse {
    ControlResponse::from_result(state.session.stop().await)
}

async fn stats<L: NodeLauncher>(State(state): State<AppState<L>>) -> Json<NodeStats> {
    Json(state.session.node_stats())
}

fn stream<L: NodeLauncher>(state: AppState<L>, direction: Direction) -> Response {
    let hub = Arc::clone(state.session.hub().direction(direction));
    let bridge = StreamBridge::new(hub, state.config.bridge_config());
    let (mut sink, rx) = ChannelSink::new(state.config.stream_buffer);

    if bridge.ensure_streaming(&sink).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Streaming unsupported!").into_response();
    }

    // Dropping the body (client gone) or shutting the server down both end the bridge
    let disconnect = state.shutdown.child_token();
    let guard = disconnect.clone().drop_guard();

    tokio::spawn(async move {
        if let Err(e) = bridge.run(&mut sink, disconnect).await {
            tracing::debug!(direction = %direction, error = %e, "Stream ended with error");
        }
    });

    let records = ReceiverStream::new(rx).map(move |record| {
        let _guard = &guard;
        Ok::<_, Infallible>(record)
    });

    let mut response = Body::from_stream(records).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    if let Some(origin) = &state.config.allow_origin {
        match HeaderValue::from_str(origin) {
            Ok(value) => {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            }
            Err(_) => tracing::warn!(origin = %origin, "Ignoring invalid allowed origin"),
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_control_ok() {
        let body = ControlResponse::from_result(Ok(Transition::Started));
        assert_eq!(body.status, ControlStatus::Ok);
        assert_eq!(body.message, "node started");
        assert_eq!(body.into_response().status(), StatusCode::OK);
    }

    #[test]
    fn test_control_warning() {
        let body = ControlResponse::from_result(Ok(Transition::AlreadyStopped));
        assert_eq!(body.status, ControlStatus::Warning);
        assert_eq!(body.message, "node already stopped");
        assert_eq!(body.into_response().status(), StatusCode::OK);
    }

    #[test]
    fn test_control_error() {
        let body = ControlResponse::from_result(Err(Error::Node("boom".into())));
        assert_eq!(body.status, ControlStatus::Error);
        assert_eq!(body.message, "node error: boom");
        assert_eq!(body.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_control_json_shape() {
        let body = ControlResponse {
            status: ControlStatus::Warning,
            message: "node already started".into(),
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"status":"warning","message":"node already started"}"#
        );
    }
}
