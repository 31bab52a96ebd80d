use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use camber_core::{JobCard, JobStatus, Priority};

/// A job card as stored, paired with its version counter.
///
/// The version starts at 0 on insert and is incremented by every committed
/// write; all updates are conditional on the expected value (OCC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedJob {
    pub job: JobCard,
    pub version: i64,
}

/// Immutable record of a single status transition for one job.
///
/// Appended only as a side effect of a successful transition, in the same
/// snapshot as the job write. Replaying a job's entries in order
/// reconstructs its current status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub job_id: Uuid,
    pub previous_status: JobStatus,
    pub new_status: JobStatus,
    /// None for token-authenticated customer actions.
    pub actor_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
    pub notes: Option<String>,
}

/// Immutable record of a mutating action, scoped to a workshop.
///
/// Broader than [`HistoryEntry`]: creates, field updates, and token
/// issuance are audited here even though they move no state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub workshop_id: Uuid,
    pub actor_id: Option<Uuid>,
    /// Dotted action name, e.g. `job.transition`.
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

/// Listing filter for staff job queries. Populated fields must all match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobFilter {
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub technician_id: Option<Uuid>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

impl JobFilter {
    /// Whether `job` matches every populated field.
    pub fn matches(&self, job: &JobCard) -> bool {
        if let Some(status) = self.status {
            if job.status != status {
                return false;
            }
        }
        if let Some(technician_id) = self.technician_id {
            if job.assigned_technician_id != Some(technician_id) {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if job.priority != priority {
                return false;
            }
        }
        true
    }
}
