//! `camber serve` — HTTP JSON API for the job lifecycle service.
//!
//! Exposes the job service facade as an async HTTP service using `axum` +
//! `tokio`. The demo server runs over the in-memory backend; durable
//! deployments swap in another `JobStorage` implementation.
//!
//! Staff endpoints read the caller's workshop from the `x-workshop-id`
//! header and the acting staff member from `x-actor-id` (session resolution
//! happens upstream). Customer endpoints are addressed by approval token
//! and carry no identity headers.
//!
//! Security features:
//! - CORS headers on all responses (permissive for local dev)
//! - Per-IP rate limiting (default: 60 req/min, CAMBER_RATE_LIMIT)
//! - Optional API key authentication via CAMBER_API_KEY env var
//!
//! Endpoints:
//! - GET   /health                        - Server status (exempt from auth)
//! - POST  /jobs                          - Create a job card
//! - GET   /jobs                          - List jobs (filter + pagination)
//! - GET   /jobs/{id}                     - Read a job card
//! - PATCH /jobs/{id}                     - Update staff-mutable fields
//! - POST  /jobs/{id}/transition          - Move a job through the lifecycle
//! - GET   /jobs/{id}/transitions         - Current status + legal targets
//! - GET   /jobs/{id}/history             - Transition history
//! - POST  /jobs/{id}/approval-token      - Issue a customer approval token
//! - GET   /approvals/{token}             - Customer view of the job
//! - POST  /approvals/{token}/{action}    - approve | reject | concern
//! - GET   /stats                         - Per-status workshop counts
//!
//! All responses use Content-Type: application/json.

mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use tower_http::cors::{Any, CorsLayer};

use camber_engine::JobService;
use camber_storage::MemoryStorage;

use self::handlers::{
    handle_create_job, handle_customer_action, handle_get_job, handle_get_job_by_token,
    handle_health, handle_history, handle_issue_token, handle_list_jobs, handle_not_found,
    handle_patch_job, handle_stats, handle_transition, handle_valid_transitions,
};
use self::middleware::{auth_middleware, rate_limit_middleware};
use self::state::{AppState, RateLimiter};

/// Maximum request body size: 1 MB. Job payloads are small.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Default rate limit: 60 requests per minute per IP.
const DEFAULT_RATE_LIMIT: u64 = 60;

/// Rate limit window duration in seconds (1 minute).
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

/// Start the HTTP server on the given port over a fresh in-memory backend.
///
/// Security:
/// - CORS: permissive (`Any` origin) for local dev; tighten for production.
/// - Rate limit: per-IP, CAMBER_RATE_LIMIT env var (default 60 req/min).
/// - API key: if CAMBER_API_KEY is set, all endpoints except /health
///   require it.
pub async fn start_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let rate_limit = std::env::var("CAMBER_RATE_LIMIT")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_RATE_LIMIT);

    let api_key = std::env::var("CAMBER_API_KEY")
        .ok()
        .filter(|k| !k.is_empty());

    if api_key.is_some() {
        eprintln!("API key authentication enabled");
    }
    eprintln!("Rate limit: {} requests per minute per IP", rate_limit);

    let state = Arc::new(AppState {
        service: JobService::new(Arc::new(MemoryStorage::new())),
        rate_limiter: RateLimiter::new(rate_limit),
        api_key,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/jobs", post(handle_create_job).get(handle_list_jobs))
        .route("/jobs/{id}", get(handle_get_job).patch(handle_patch_job))
        .route("/jobs/{id}/transition", post(handle_transition))
        .route("/jobs/{id}/transitions", get(handle_valid_transitions))
        .route("/jobs/{id}/history", get(handle_history))
        .route("/jobs/{id}/approval-token", post(handle_issue_token))
        .route("/approvals/{token}", get(handle_get_job_by_token))
        .route("/approvals/{token}/{action}", post(handle_customer_action))
        .route("/stats", get(handle_stats))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    eprintln!("Camber listening on http://0.0.0.0:{}", port);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    eprintln!("\nServer shut down.");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    eprintln!("\nReceived shutdown signal...");
}
