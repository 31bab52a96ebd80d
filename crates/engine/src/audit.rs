//! Audit entry construction.
//!
//! The audit log is broader than the history ledger: creates, field
//! updates, and token issuance are recorded here even though they move no
//! state. Entries are built by the engine and staged into the same storage
//! snapshot as the mutation they describe.

use time::OffsetDateTime;
use uuid::Uuid;

use camber_core::{JobCard, JobStatus};
use camber_storage::AuditEntry;

pub const ACTION_CREATE: &str = "job.create";
pub const ACTION_UPDATE: &str = "job.update";
pub const ACTION_TRANSITION: &str = "job.transition";
pub const ACTION_TOKEN_ISSUE: &str = "job.token_issue";
pub const ACTION_CUSTOMER_ACTION: &str = "job.customer_action";

const ENTITY_JOB: &str = "job";

/// Audit entry for any job mutation, with optional old/new snapshots.
pub(crate) fn job_entry(
    job: &JobCard,
    actor_id: Option<Uuid>,
    action: &str,
    old_values: Option<serde_json::Value>,
    new_values: Option<serde_json::Value>,
    now: OffsetDateTime,
) -> AuditEntry {
    AuditEntry {
        id: Uuid::new_v4(),
        workshop_id: job.workshop_id,
        actor_id,
        action: action.to_string(),
        entity_type: ENTITY_JOB.to_string(),
        entity_id: job.id,
        old_values,
        new_values,
        recorded_at: now,
    }
}

/// Audit entry for a status transition; snapshots status and version on
/// both sides of the write.
pub(crate) fn transition_entry(
    job: &JobCard,
    action: &str,
    previous_status: JobStatus,
    old_version: i64,
    new_version: i64,
    actor_id: Option<Uuid>,
    now: OffsetDateTime,
) -> AuditEntry {
    job_entry(
        job,
        actor_id,
        action,
        Some(serde_json::json!({
            "status": previous_status,
            "version": old_version,
        })),
        Some(serde_json::json!({
            "status": job.status,
            "version": new_version,
        })),
        now,
    )
}
