//! Approval token manager.
//!
//! An approval token is an opaque, time-limited capability that lets the
//! customer act on exactly one job without holding a workshop session. The
//! token bypasses the tenant guard — it IS the authorization — but never
//! the transition table or the requirement checks, so it cannot be used to
//! skip workflow rules. Tokens are single-use: a successful customer action
//! clears the token fields in the same atomic write as the transition.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use camber_core::{JobCard, JobStatus};
use camber_storage::{JobStorage, StorageError, VersionedJob};

use crate::audit;
use crate::error::ServiceError;
use crate::guard;
use crate::lifecycle::{JobLookup, TransitionRequest, MAX_WRITE_ATTEMPTS};
use crate::service::JobService;

/// Random token length in bytes, before encoding.
const TOKEN_BYTES: usize = 32;

/// The actions a customer can take through an approval token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerAction {
    Approve,
    Reject,
    Concern,
}

impl CustomerAction {
    /// The lifecycle target each action maps to. The mapping defines the
    /// intent; whether the move is legal is decided by the transition path.
    pub(crate) fn target(self) -> JobStatus {
        match self {
            CustomerAction::Approve => JobStatus::InProgress,
            CustomerAction::Reject => JobStatus::Created,
            CustomerAction::Concern => JobStatus::ConcernRaised,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CustomerAction::Approve => "approve",
            CustomerAction::Reject => "reject",
            CustomerAction::Concern => "concern",
        }
    }
}

impl fmt::Display for CustomerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an action string that names no customer action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseActionError(pub String);

impl fmt::Display for ParseActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown customer action: '{}'", self.0)
    }
}

impl std::error::Error for ParseActionError {}

impl FromStr for CustomerAction {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(CustomerAction::Approve),
            "reject" => Ok(CustomerAction::Reject),
            "concern" => Ok(CustomerAction::Concern),
            other => Err(ParseActionError(other.to_string())),
        }
    }
}

/// What a customer action did, reported back to the (unauthenticated)
/// customer channel without exposing the full job record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerActionOutcome {
    pub job_id: Uuid,
    pub new_status: JobStatus,
}

/// Generate an unguessable opaque token string.
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

impl<S: JobStorage> JobService<S> {
    /// Issue (or re-issue) the approval token for a job.
    ///
    /// Tenant-guarded; overwrites any prior token so at most one is live
    /// per job. Returns the token string for the notification layer to
    /// deliver.
    pub async fn issue_approval_token(
        &self,
        job_id: Uuid,
        workshop_id: Uuid,
        expires_at: OffsetDateTime,
        actor: Uuid,
    ) -> Result<String, ServiceError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let VersionedJob { mut job, version } = self.storage.get_job(job_id).await?;
            guard::ensure_owner(&job, workshop_id)?;

            let token = generate_token();
            let now = OffsetDateTime::now_utc();
            let previous_expiry = job.approval_expires_at;
            job.approval_token = Some(token.clone());
            job.approval_expires_at = Some(expires_at);
            job.updated_by = Some(actor);
            job.updated_at = now;

            let mut snap = self.storage.begin_snapshot().await?;
            match self.storage.update_job(&mut snap, &job, version).await {
                Ok(_new_version) => {}
                Err(StorageError::ConcurrentConflict { .. }) => {
                    let _ = self.storage.abort_snapshot(snap).await;
                    if attempts >= MAX_WRITE_ATTEMPTS {
                        return Err(ServiceError::Conflict);
                    }
                    continue;
                }
                Err(e) => {
                    let _ = self.storage.abort_snapshot(snap).await;
                    return Err(e.into());
                }
            }
            // The token value itself is a capability and never audited;
            // only the expiry window is.
            let old_expiry = previous_expiry.map(|t| t.to_string());
            let entry = audit::job_entry(
                &job,
                Some(actor),
                audit::ACTION_TOKEN_ISSUE,
                Some(serde_json::json!({ "approval_expires_at": old_expiry })),
                Some(serde_json::json!({ "approval_expires_at": expires_at.to_string() })),
                now,
            );
            if let Err(e) = self.storage.insert_audit(&mut snap, entry).await {
                let _ = self.storage.abort_snapshot(snap).await;
                return Err(e.into());
            }
            self.storage.commit_snapshot(snap).await?;
            return Ok(token);
        }
    }

    /// Resolve a live token to its job.
    ///
    /// `NotFound` when no job binds the token (including consumed tokens);
    /// `TokenExpired` when the binding exists but the window has passed.
    pub async fn get_job_by_token(&self, token: &str) -> Result<JobCard, ServiceError> {
        let versioned = self.load_scoped(&JobLookup::Token { token }).await?;
        Ok(versioned.job)
    }

    /// Perform a customer action through an approval token.
    ///
    /// Runs the standard transition path with no staff actor: the table and
    /// requirement checks apply unchanged, and the token is consumed in the
    /// same atomic write on success.
    pub async fn apply_customer_action(
        &self,
        token: &str,
        action: CustomerAction,
    ) -> Result<CustomerActionOutcome, ServiceError> {
        let outcome = self
            .run_transition(
                JobLookup::Token { token },
                TransitionRequest {
                    target: action.target(),
                    actor: None,
                    notes: None,
                    audit_action: audit::ACTION_CUSTOMER_ACTION,
                    customer_approval: action == CustomerAction::Approve,
                    consume_token: true,
                },
            )
            .await?;
        Ok(CustomerActionOutcome {
            job_id: outcome.job.id,
            new_status: outcome.job.status,
        })
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
