use camber_core::{JobStatus, UnmetRequirement};
use camber_storage::StorageError;

/// Errors surfaced by the job service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Job id unknown, job owned by another workshop, or token unknown —
    /// deliberately indistinguishable to the caller.
    #[error("job not found")]
    NotFound,

    /// The requested target is not reachable from the current state. The
    /// triple is reported verbatim for callers and their UIs.
    #[error(
        "invalid transition from {current} to {requested}; allowed targets: {}",
        join_statuses(.allowed)
    )]
    InvalidTransition {
        current: JobStatus,
        requested: JobStatus,
        allowed: Vec<JobStatus>,
    },

    /// The target is reachable per the table but field-level prerequisites
    /// are unmet. Carries every failing requirement, not just the first.
    #[error("requirements not met: {}", join_requirements(.unmet))]
    RequirementsNotMet { unmet: Vec<UnmetRequirement> },

    /// The approval token resolved but is past its expiry instant.
    #[error("approval token expired")]
    TokenExpired,

    /// The optimistic-concurrency retry budget was exhausted. Transient;
    /// the caller should retry the whole operation.
    #[error("concurrent update conflict; retry the operation")]
    Conflict,

    /// Storage or infrastructure failure. No partial state change is
    /// observable to subsequent reads.
    #[error("storage failure: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::JobNotFound { .. } | StorageError::TokenNotFound => {
                ServiceError::NotFound
            }
            // Conflicts are normally intercepted by the retry loops; one
            // arriving here still surfaces as the retryable category.
            StorageError::ConcurrentConflict { .. } => ServiceError::Conflict,
            other => ServiceError::Storage(other),
        }
    }
}

fn join_statuses(statuses: &[JobStatus]) -> String {
    if statuses.is_empty() {
        return "none (terminal state)".to_string();
    }
    statuses
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_requirements(unmet: &[UnmetRequirement]) -> String {
    unmet
        .iter()
        .map(|r| format!("{}: {}", r.field, r.message))
        .collect::<Vec<_>>()
        .join("; ")
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
