//! HTTP host for the worker
//!
//! Control endpoints live under `/_worker`. Every other request is treated
//! as a fetch from a controlled page and answered by the worker's fetch
//! strategy against the configured origin; the request path never selects
//! another host. Cross-origin assets from the install list (CDN scripts and
//! stylesheets) are reachable only through `GET /_worker/fetch?url=...`.

use crate::event::{EventOutcome, WorkerEvent};
use crate::error::WorkerError;
use crate::host::{Clients, NotificationSurface};
use crate::network::is_hop_header;
use crate::scheduler::{Scheduler, WorkerHandle};
use crate::strategy::RequestMode;
use crate::surface::{InMemoryClients, InMemoryNotifications};
use crate::types::{FetchRequest, FetchResponse, HealthResponse, ResponseSource};
use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Largest request body forwarded upstream
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared state for the HTTP server
pub struct ServerState {
    pub worker: WorkerHandle,
    pub scheduler: Arc<Scheduler>,
    pub notifications: Arc<InMemoryNotifications>,
    pub clients: Arc<InMemoryClients>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(
        worker: WorkerHandle,
        scheduler: Arc<Scheduler>,
        notifications: Arc<InMemoryNotifications>,
        clients: Arc<InMemoryClients>,
    ) -> Self {
        Self {
            worker,
            scheduler,
            notifications,
            clients,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
pub struct AssetQuery {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterWindow {
    pub url: String,
    #[serde(default)]
    pub controlled: bool,
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/_worker/health", get(health))
        .route("/_worker/lifecycle/install", post(install))
        .route("/_worker/lifecycle/activate", post(activate))
        .route("/_worker/push", post(push))
        .route("/_worker/notifications", get(list_notifications))
        .route("/_worker/notifications/{tag}/click", post(click_notification))
        .route("/_worker/windows", get(list_windows).post(register_window))
        .route("/_worker/fetch", get(fetch_asset))
        .fallback(intercept)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server; returns once `shutdown` resolves and open
/// connections have finished
pub async fn start_server<F>(state: SharedState, port: u16, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
    info!("Starting graceful shutdown...");
}

fn error_response(status: StatusCode, message: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn worker_error_response(err: WorkerError) -> Response {
    let status = match &err {
        WorkerError::InvalidState { .. } => StatusCode::CONFLICT,
        WorkerError::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err)
}

fn unexpected(outcome: EventOutcome) -> Response {
    error!(?outcome, "Unexpected event outcome");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "unexpected event outcome")
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;
    let config = state.scheduler.config();

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        state: state.scheduler.state().await,
        cache_version: config.cache_version.clone(),
        caches: state.scheduler.executor().storage().stats().await,
    })
}

async fn install(State(state): State<SharedState>) -> Response {
    match state.worker.send(WorkerEvent::Install).await {
        Ok(EventOutcome::Installed(report)) => Json(report).into_response(),
        Ok(other) => unexpected(other),
        Err(e) => worker_error_response(e),
    }
}

async fn activate(State(state): State<SharedState>) -> Response {
    match state.worker.send(WorkerEvent::Activate).await {
        Ok(EventOutcome::Activated(report)) => Json(report).into_response(),
        Ok(other) => unexpected(other),
        Err(e) => worker_error_response(e),
    }
}

/// Deliver a push message; the raw body is the payload
async fn push(State(state): State<SharedState>, body: Bytes) -> Response {
    let data = if body.is_empty() {
        None
    } else {
        Some(body.to_vec())
    };

    match state.worker.send(WorkerEvent::Push(data)).await {
        Ok(EventOutcome::Displayed(notification)) => {
            (StatusCode::CREATED, Json(notification)).into_response()
        }
        Ok(other) => unexpected(other),
        Err(e) => worker_error_response(e),
    }
}

async fn list_notifications(State(state): State<SharedState>) -> Response {
    Json(state.notifications.displayed().await).into_response()
}

async fn click_notification(
    State(state): State<SharedState>,
    Path(tag): Path<String>,
) -> Response {
    let Some(notification) = state.notifications.find(&tag).await else {
        return error_response(StatusCode::NOT_FOUND, "Notification not found");
    };

    match state
        .worker
        .send(WorkerEvent::NotificationClick(notification))
        .await
    {
        Ok(EventOutcome::Clicked(outcome)) => Json(outcome).into_response(),
        Ok(other) => unexpected(other),
        Err(e) => worker_error_response(e),
    }
}

async fn list_windows(State(state): State<SharedState>) -> Response {
    Json(state.clients.match_all(true).await).into_response()
}

async fn register_window(
    State(state): State<SharedState>,
    Json(window): Json<RegisterWindow>,
) -> Response {
    let url = state.scheduler.config().resolve(&window.url);
    let client = state.clients.register(url, window.controlled).await;
    (StatusCode::CREATED, Json(client)).into_response()
}

/// Classify a request as a navigation or a subresource load
pub fn request_mode(method: &Method, headers: &HeaderMap) -> RequestMode {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    };

    if header_value("sec-fetch-mode").eq_ignore_ascii_case("navigate") {
        return RequestMode::Navigate;
    }
    if method == Method::GET && header_value(header::ACCEPT.as_str()).contains("text/html") {
        return RequestMode::Navigate;
    }
    RequestMode::Subresource
}

/// Answer a page request through the worker's fetch handling
async fn intercept(State(state): State<SharedState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let url = state
        .scheduler
        .config()
        .same_origin(parts.uri.path(), parts.uri.query());

    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => return error_response(StatusCode::PAYLOAD_TOO_LARGE, e),
    };

    let headers = parts
        .headers
        .iter()
        .filter(|(name, _)| !is_hop_header(name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let fetch = FetchRequest {
        mode: request_mode(&parts.method, &parts.headers),
        url,
        method: parts.method.as_str().to_string(),
        headers,
        body,
    };
    respond(&state, fetch).await
}

/// Serve an install-list asset by absolute URL
async fn fetch_asset(
    State(state): State<SharedState>,
    Query(query): Query<AssetQuery>,
) -> Response {
    let Some(url) = state.scheduler.config().asset(&query.url) else {
        return error_response(StatusCode::NOT_FOUND, "Not a configured asset");
    };
    respond(&state, FetchRequest::subresource(url)).await
}

async fn respond(state: &SharedState, fetch: FetchRequest) -> Response {
    let url = fetch.url.clone();

    match state.worker.send(WorkerEvent::Fetch(fetch)).await {
        Ok(EventOutcome::Responded(response)) => into_http_response(response),
        Ok(other) => unexpected(other),
        Err(e) => {
            warn!(url = %url, error = %e, "Fetch failed with no cached fallback");
            error_response(StatusCode::BAD_GATEWAY, e)
        }
    }
}

fn into_http_response(response: FetchResponse) -> Response {
    let cache_header = match response.source {
        ResponseSource::Cache => "HIT",
        ResponseSource::Network => "MISS",
    };

    let mut builder = Response::builder().status(response.snapshot.status);
    for (name, value) in &response.snapshot.headers {
        if is_hop_header(name) || name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder
        .header("X-Cache", cache_header)
        .body(Body::from(response.snapshot.body))
        .unwrap_or_else(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e))
}
