//! HTTP route handlers for the job service facade.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use camber_core::{JobPatch, JobStatus, NewJob, Priority};
use camber_engine::{CustomerAction, ServiceError};
use camber_storage::JobFilter;

use super::json_error;
use super::state::AppState;

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "camber_version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

// ── Identity headers ─────────────────────────────────────────────────────────

fn required_uuid_header(headers: &HeaderMap, name: &str) -> Result<Uuid, Response> {
    let raw = headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            json_error(StatusCode::BAD_REQUEST, &format!("missing {name} header"))
                .into_response()
        })?;
    raw.parse().map_err(|_| {
        json_error(StatusCode::BAD_REQUEST, &format!("invalid {name} header")).into_response()
    })
}

/// The caller's workshop, resolved upstream and forwarded as a header.
fn workshop_id(headers: &HeaderMap) -> Result<Uuid, Response> {
    required_uuid_header(headers, "x-workshop-id")
}

/// The acting staff member, for attribution on mutating requests.
fn actor_id(headers: &HeaderMap) -> Result<Uuid, Response> {
    required_uuid_header(headers, "x-actor-id")
}

// ── Error mapping ────────────────────────────────────────────────────────────

/// Map a service error to its HTTP shape. Transition and requirement
/// violations carry their structured detail; storage failures do not leak.
fn error_response(err: ServiceError) -> Response {
    match &err {
        ServiceError::NotFound => {
            json_error(StatusCode::NOT_FOUND, &err.to_string()).into_response()
        }
        ServiceError::InvalidTransition {
            current,
            requested,
            allowed,
        } => {
            let body = serde_json::json!({
                "error": err.to_string(),
                "current": current,
                "requested": requested,
                "allowed": allowed,
            });
            (StatusCode::CONFLICT, Json(body)).into_response()
        }
        ServiceError::RequirementsNotMet { unmet } => {
            let body = serde_json::json!({
                "error": err.to_string(),
                "unmet": unmet,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
        }
        ServiceError::TokenExpired => {
            json_error(StatusCode::GONE, &err.to_string()).into_response()
        }
        ServiceError::Conflict => {
            let body = serde_json::json!({
                "error": err.to_string(),
                "retryable": true,
            });
            (StatusCode::CONFLICT, Json(body)).into_response()
        }
        ServiceError::Storage(_) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal storage failure")
                .into_response()
        }
    }
}

// ── Staff endpoints ──────────────────────────────────────────────────────────

/// POST /jobs
pub(crate) async fn handle_create_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<NewJob>,
) -> Response {
    let workshop = match workshop_id(&headers) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = match actor_id(&headers) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state.service.create_job(workshop, input, actor).await {
        Ok(job) => (StatusCode::CREATED, Json(job)).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub(crate) struct ListQuery {
    status: Option<JobStatus>,
    technician_id: Option<Uuid>,
    priority: Option<Priority>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    50
}

/// GET /jobs?status=&technician_id=&priority=&limit=&offset=
pub(crate) async fn handle_list_jobs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    let workshop = match workshop_id(&headers) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let filter = JobFilter {
        status: query.status,
        technician_id: query.technician_id,
        priority: query.priority,
    };
    match state
        .service
        .list_jobs(workshop, &filter, query.limit, query.offset)
        .await
    {
        Ok((jobs, total)) => {
            let body = serde_json::json!({ "jobs": jobs, "total": total });
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /jobs/{id}
pub(crate) async fn handle_get_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let workshop = match workshop_id(&headers) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state.service.get_job(id, workshop).await {
        Ok(job) => (StatusCode::OK, Json(job)).into_response(),
        Err(e) => error_response(e),
    }
}

/// PATCH /jobs/{id}
pub(crate) async fn handle_patch_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(patch): Json<JobPatch>,
) -> Response {
    let workshop = match workshop_id(&headers) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = match actor_id(&headers) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state
        .service
        .update_job_fields(id, workshop, &patch, actor)
        .await
    {
        Ok(job) => (StatusCode::OK, Json(job)).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub(crate) struct TransitionBody {
    target: JobStatus,
    #[serde(default)]
    notes: Option<String>,
}

/// POST /jobs/{id}/transition
pub(crate) async fn handle_transition(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<TransitionBody>,
) -> Response {
    let workshop = match workshop_id(&headers) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = match actor_id(&headers) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state
        .service
        .transition(id, workshop, body.target, actor, body.notes.as_deref())
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /jobs/{id}/transitions
pub(crate) async fn handle_valid_transitions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let workshop = match workshop_id(&headers) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state.service.get_valid_transitions(id, workshop).await {
        Ok(valid) => (StatusCode::OK, Json(valid)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /jobs/{id}/history
pub(crate) async fn handle_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let workshop = match workshop_id(&headers) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state.service.get_state_history(id, workshop).await {
        Ok(history) => (StatusCode::OK, Json(history)).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub(crate) struct IssueTokenBody {
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
}

#[derive(Serialize)]
struct IssuedToken {
    token: String,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
}

/// POST /jobs/{id}/approval-token
pub(crate) async fn handle_issue_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<IssueTokenBody>,
) -> Response {
    let workshop = match workshop_id(&headers) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = match actor_id(&headers) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state
        .service
        .issue_approval_token(id, workshop, body.expires_at, actor)
        .await
    {
        Ok(token) => (
            StatusCode::CREATED,
            Json(IssuedToken {
                token,
                expires_at: body.expires_at,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

// ── Customer endpoints (token-addressed, no identity headers) ────────────────

/// GET /approvals/{token}
pub(crate) async fn handle_get_job_by_token(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Response {
    match state.service.get_job_by_token(&token).await {
        Ok(job) => (StatusCode::OK, Json(job)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /approvals/{token}/{action}
pub(crate) async fn handle_customer_action(
    State(state): State<Arc<AppState>>,
    Path((token, action)): Path<(String, String)>,
) -> Response {
    let action: CustomerAction = match action.parse() {
        Ok(a) => a,
        Err(_) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "action must be approve, reject, or concern",
            )
            .into_response()
        }
    };
    match state.service.apply_customer_action(&token, action).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => error_response(e),
    }
}

// ── Reporting ────────────────────────────────────────────────────────────────

/// GET /stats
pub(crate) async fn handle_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let workshop = match workshop_id(&headers) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state.service.get_workshop_stats(workshop).await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => error_response(e),
    }
}
