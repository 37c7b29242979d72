//! HTTP Server
//!
//! Serves the peer protocol and the operator endpoints of a node.
//!
//! # Routes
//!
//! | Route                            | Response                                   |
//! |----------------------------------|--------------------------------------------|
//! | `GET <base_path><ns>/<key>`      | protobuf `FetchResponse` (peer protocol)   |
//! | `GET /api/<ns>/<key>`            | raw value bytes                            |
//! | `GET /healthz`, `/livez`         | liveness JSON, 503 once the loop stopped   |
//! | `GET /readyz`                    | readiness JSON, 503 unless serving         |
//! | `GET /metrics`                   | Prometheus text exposition                 |
//!
//! Value routes map an empty key to 400, an unknown namespace to 404 and any
//! other failure to 500.

mod health;
mod metrics;

pub use health::{Check, Lifecycle, NodeHealth, Status, StatusReport};
pub use metrics::render as render_metrics;

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::adapters::wire::{self, FetchRequest, FetchResponse};
use crate::adapters::HttpPool;
use crate::error::{Error, Result};
use crate::namespace::Registry;

/// URL prefix of the client API
pub const API_BASE_PATH: &str = "/api/";

/// Everything a node's request handlers need
#[derive(Debug)]
pub struct NodeState {
    registry: Arc<Registry>,
    pool: Option<Arc<HttpPool>>,
    base_path: String,
    health: NodeHealth,
}

impl NodeState {
    /// State for a node without peers, serving the peer protocol under the
    /// default base path
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            pool: None,
            base_path: wire::DEFAULT_BASE_PATH.to_string(),
            health: NodeHealth::new(),
        }
    }

    /// State for a node routing through `pool`; the peer protocol is served
    /// under the pool's base path
    pub fn with_pool(registry: Arc<Registry>, pool: Arc<HttpPool>) -> Self {
        Self {
            base_path: pool.base_path().to_string(),
            pool: Some(pool),
            ..Self::new(registry)
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn health(&self) -> &NodeHealth {
        &self.health
    }
}

/// Marks the node stopped when the serve loop exits or is dropped
struct StopOnExit<'a>(&'a NodeHealth);

impl Drop for StopOnExit<'_> {
    fn drop(&mut self) {
        self.0.mark_stopped();
    }
}

/// Accept connections on `listener` until an accept fails.
///
/// The node reports `serving` while the loop runs and `stopped` after it
/// returns or its future is dropped.
pub async fn serve(listener: TcpListener, state: Arc<NodeState>) -> Result<()> {
    let addr = listener.local_addr()?;
    let _stop = StopOnExit(&state.health);
    state.health.mark_serving();
    info!("Peercache listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("Server accept error: {}", e)))?;

        let io = TokioIo::new(stream);
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let state = Arc::clone(&state);
                async move { Ok::<_, Infallible>(route(&state, req.method(), req.uri().path()).await) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Server connection error: {}", e);
            }
        });
    }
}

/// Dispatch one request
pub async fn route(state: &NodeState, method: &Method, path: &str) -> Response<Full<Bytes>> {
    if method != Method::GET {
        return text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    }

    let response = match path {
        "/healthz" | "/livez" => health_json(&state.health.liveness()),
        "/readyz" => health_json(
            &state
                .health
                .readiness(&state.registry, state.pool.as_deref()),
        ),
        "/metrics" => match metrics::render(&state.registry) {
            Ok(body) => respond(StatusCode::OK, metrics::CONTENT_TYPE, body),
            Err(e) => {
                error!(error = %e, "Failed to render metrics");
                text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        },
        _ if path.starts_with(state.base_path.as_str()) => {
            match FetchRequest::from_path(&state.base_path, path) {
                Some(request) => serve_peer(state, request).await,
                None => text(StatusCode::BAD_REQUEST, "bad request"),
            }
        }
        _ if path.starts_with(API_BASE_PATH) => match FetchRequest::from_path(API_BASE_PATH, path) {
            Some(request) => serve_api(state, request).await,
            None => text(StatusCode::BAD_REQUEST, "bad request"),
        },
        _ => text(StatusCode::NOT_FOUND, "not found"),
    };

    debug!(%method, path, status = response.status().as_u16(), "Request served");
    response
}

async fn serve_peer(state: &NodeState, request: FetchRequest) -> Response<Full<Bytes>> {
    let namespace = match state.registry.lookup(&request.namespace) {
        Ok(namespace) => namespace,
        Err(e) => return error_response(&e),
    };
    namespace.stats().record_server_request();

    match namespace.get(&request.key).await {
        Ok(value) => respond(
            StatusCode::OK,
            wire::CONTENT_TYPE,
            FetchResponse::encode_value(value.bytes()),
        ),
        Err(e) => error_response(&e),
    }
}

async fn serve_api(state: &NodeState, request: FetchRequest) -> Response<Full<Bytes>> {
    let namespace = match state.registry.lookup(&request.namespace) {
        Ok(namespace) => namespace,
        Err(e) => return error_response(&e),
    };

    match namespace.get(&request.key).await {
        Ok(value) => respond(StatusCode::OK, wire::CONTENT_TYPE, value.bytes()),
        Err(e) => error_response(&e),
    }
}

/// HTTP status for a failed value request
pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::EmptyKey => StatusCode::BAD_REQUEST,
        Error::NamespaceNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: &Error) -> Response<Full<Bytes>> {
    let status = status_for(error);
    if status.is_server_error() {
        warn!(error = %error, "Request failed");
    }
    text(status, error.to_string())
}

fn health_json(response: &StatusReport) -> Response<Full<Bytes>> {
    let status = if response.is_available() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    match serde_json::to_vec(response) {
        Ok(body) => respond(status, "application/json", body),
        Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    respond(status, "text/plain; charset=utf-8", body)
}

fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

// =============================================================================
// Tests
// =============================================================================
