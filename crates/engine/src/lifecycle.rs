//! The job lifecycle state machine.
//!
//! A transition runs in four steps against one loaded snapshot of the job:
//! scoped load, transition-table check, requirement evaluation, then an
//! atomic three-write commit (job update, history append, audit append).
//! The job write is conditional on the version read at load time; a
//! concurrent commit in the window triggers a full re-read / re-validate /
//! re-attempt, never a write against stale state.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use camber_core::{unmet_requirements, JobCard, JobStatus};
use camber_storage::{HistoryEntry, JobStorage, StorageError, VersionedJob};

use crate::audit;
use crate::error::ServiceError;
use crate::guard;
use crate::service::JobService;

/// Bounded OCC retry budget for the write loops.
pub(crate) const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Result of a successful transition: the updated job plus its new legal
/// moves, so callers need no second round-trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionOutcome {
    pub job: JobCard,
    pub allowed_targets: Vec<JobStatus>,
}

/// How the job is located and authorized for a transition.
pub(crate) enum JobLookup<'a> {
    /// Staff path: tenant-guarded by the caller's workshop id.
    Staff { job_id: Uuid, workshop_id: Uuid },
    /// Customer path: the token is the capability; it names exactly one job
    /// and is checked for expiry on every (re)load.
    Token { token: &'a str },
}

/// A fully-specified transition to execute.
pub(crate) struct TransitionRequest<'a> {
    pub target: JobStatus,
    pub actor: Option<Uuid>,
    pub notes: Option<&'a str>,
    /// Audit action name (`job.transition` or `job.customer_action`).
    pub audit_action: &'static str,
    /// Stamp `customer_approved_at` (customer approve only).
    pub customer_approval: bool,
    /// Clear the token fields in the same write (tokens are single-use).
    pub consume_token: bool,
}

impl<S: JobStorage> JobService<S> {
    /// Move a job to `target` on behalf of a staff actor.
    pub async fn transition(
        &self,
        job_id: Uuid,
        workshop_id: Uuid,
        target: JobStatus,
        actor: Uuid,
        notes: Option<&str>,
    ) -> Result<TransitionOutcome, ServiceError> {
        self.run_transition(
            JobLookup::Staff {
                job_id,
                workshop_id,
            },
            TransitionRequest {
                target,
                actor: Some(actor),
                notes,
                audit_action: audit::ACTION_TRANSITION,
                customer_approval: false,
                consume_token: false,
            },
        )
        .await
    }

    /// Load the job named by `lookup`, enforcing its authorization rule.
    pub(crate) async fn load_scoped(
        &self,
        lookup: &JobLookup<'_>,
    ) -> Result<VersionedJob, ServiceError> {
        match lookup {
            JobLookup::Staff {
                job_id,
                workshop_id,
            } => {
                let versioned = self.storage.get_job(*job_id).await?;
                guard::ensure_owner(&versioned.job, *workshop_id)?;
                Ok(versioned)
            }
            JobLookup::Token { token } => {
                let versioned = self.storage.get_job_by_token(token).await?;
                let now = OffsetDateTime::now_utc();
                match versioned.job.approval_expires_at {
                    Some(expires_at) if now < expires_at => Ok(versioned),
                    // A token with no recorded expiry is treated as expired.
                    _ => Err(ServiceError::TokenExpired),
                }
            }
        }
    }

    /// The shared transition path for staff and token-authenticated callers.
    pub(crate) async fn run_transition(
        &self,
        lookup: JobLookup<'_>,
        request: TransitionRequest<'_>,
    ) -> Result<TransitionOutcome, ServiceError> {
        let mut attempts = 0;
        loop {
            attempts += 1;

            // Step 1: scoped load. Everything below is evaluated against
            // this one snapshot of the job.
            let VersionedJob { mut job, version } = self.load_scoped(&lookup).await?;

            // Step 2: transition-table check.
            let allowed = job.status.allowed_targets();
            if !job.status.can_transition_to(request.target) {
                return Err(ServiceError::InvalidTransition {
                    current: job.status,
                    requested: request.target,
                    allowed: allowed.to_vec(),
                });
            }

            // Step 3: requirement checks, collecting every failure.
            let unmet = unmet_requirements(&job, request.target);
            if !unmet.is_empty() {
                return Err(ServiceError::RequirementsNotMet { unmet });
            }

            // Step 4: apply and commit the three writes as one snapshot.
            let now = OffsetDateTime::now_utc();
            let previous_status = job.status;
            job.status = request.target;
            job.stamp_stage_entry(request.target, now);
            if request.customer_approval {
                job.customer_approved_at = Some(now);
            }
            if request.consume_token {
                job.approval_token = None;
                job.approval_expires_at = None;
            }
            job.status_notes = request.notes.map(str::to_owned);
            job.updated_by = request.actor;
            job.updated_at = now;

            let mut snap = self.storage.begin_snapshot().await?;
            let new_version = match self.storage.update_job(&mut snap, &job, version).await {
                Ok(new_version) => new_version,
                Err(StorageError::ConcurrentConflict { .. }) => {
                    let _ = self.storage.abort_snapshot(snap).await;
                    if attempts >= MAX_WRITE_ATTEMPTS {
                        return Err(ServiceError::Conflict);
                    }
                    // Someone committed in the window; re-read and
                    // re-validate from the top.
                    continue;
                }
                Err(e) => {
                    let _ = self.storage.abort_snapshot(snap).await;
                    return Err(e.into());
                }
            };

            let history = HistoryEntry {
                id: Uuid::new_v4(),
                job_id: job.id,
                previous_status,
                new_status: job.status,
                actor_id: request.actor,
                recorded_at: now,
                notes: request.notes.map(str::to_owned),
            };
            if let Err(e) = self.storage.insert_history(&mut snap, history).await {
                let _ = self.storage.abort_snapshot(snap).await;
                return Err(e.into());
            }

            let entry = audit::transition_entry(
                &job,
                request.audit_action,
                previous_status,
                version,
                new_version,
                request.actor,
                now,
            );
            if let Err(e) = self.storage.insert_audit(&mut snap, entry).await {
                let _ = self.storage.abort_snapshot(snap).await;
                return Err(e.into());
            }

            self.storage.commit_snapshot(snap).await?;

            return Ok(TransitionOutcome {
                allowed_targets: job.status.allowed_targets().to_vec(),
                job,
            });
        }
    }
}
