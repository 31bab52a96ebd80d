//! The job store facade.
//!
//! [`JobService`] is the single public mutation surface over job records.
//! Status changes delegate to the lifecycle engine (`lifecycle` module);
//! everything else is tenant-guarded CRUD with OCC writes and audit
//! coupling. Construct one service per process with an explicit storage
//! handle and share it by reference.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use camber_core::{JobCard, JobPatch, JobStatus, NewJob, UnmetRequirement};
use camber_storage::{HistoryEntry, JobFilter, JobStorage, StorageError, VersionedJob};

use crate::audit;
use crate::error::ServiceError;
use crate::guard;
use crate::lifecycle::MAX_WRITE_ATTEMPTS;

/// The facade over job storage and the lifecycle engine.
pub struct JobService<S: JobStorage> {
    pub(crate) storage: Arc<S>,
}

impl<S: JobStorage> Clone for JobService<S> {
    fn clone(&self) -> Self {
        JobService {
            storage: Arc::clone(&self.storage),
        }
    }
}

/// A job's current state and its legal next moves, so a caller always knows
/// what it may request without a second round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidTransitions {
    pub current: JobStatus,
    pub allowed_targets: Vec<JobStatus>,
}

/// Aggregated job counts for one workshop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkshopStats {
    pub total: u64,
    /// Jobs not yet CLOSED or CANCELLED.
    pub active: u64,
    pub by_status: BTreeMap<JobStatus, u64>,
}

impl<S: JobStorage> JobService<S> {
    pub fn new(storage: Arc<S>) -> Self {
        JobService { storage }
    }

    /// Create a job card in CREATED from intake input.
    pub async fn create_job(
        &self,
        workshop_id: Uuid,
        input: NewJob,
        actor: Uuid,
    ) -> Result<JobCard, ServiceError> {
        if input.registration_number.trim().is_empty() {
            return Err(ServiceError::RequirementsNotMet {
                unmet: vec![UnmetRequirement {
                    field: "registration_number".to_string(),
                    message: "a vehicle registration number is required at intake".to_string(),
                }],
            });
        }

        let now = OffsetDateTime::now_utc();
        let mut job = JobCard::create(workshop_id, input, now);
        job.updated_by = Some(actor);

        let mut snap = self.storage.begin_snapshot().await?;
        if let Err(e) = self.storage.insert_job(&mut snap, &job).await {
            let _ = self.storage.abort_snapshot(snap).await;
            return Err(e.into());
        }
        let entry = audit::job_entry(
            &job,
            Some(actor),
            audit::ACTION_CREATE,
            None,
            Some(serde_json::to_value(&job).map_err(internal)?),
            now,
        );
        if let Err(e) = self.storage.insert_audit(&mut snap, entry).await {
            let _ = self.storage.abort_snapshot(snap).await;
            return Err(e.into());
        }
        self.storage.commit_snapshot(snap).await?;
        Ok(job)
    }

    /// Read a job, tenant-guarded.
    pub async fn get_job(&self, job_id: Uuid, workshop_id: Uuid) -> Result<JobCard, ServiceError> {
        let VersionedJob { job, .. } = self.storage.get_job(job_id).await?;
        guard::ensure_owner(&job, workshop_id)?;
        Ok(job)
    }

    /// List a workshop's jobs matching `filter`, windowed by `limit` and
    /// `offset`, along with the total match count.
    pub async fn list_jobs(
        &self,
        workshop_id: Uuid,
        filter: &JobFilter,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<JobCard>, usize), ServiceError> {
        Ok(self
            .storage
            .list_jobs(workshop_id, filter, limit, offset)
            .await?)
    }

    /// Apply a partial update to the staff-mutable fields.
    ///
    /// Status, stage timestamps, and token fields have no counterpart in
    /// [`JobPatch`], so this path cannot move state. The write is
    /// OCC-guarded and audited with before/after snapshots of the changed
    /// fields.
    pub async fn update_job_fields(
        &self,
        job_id: Uuid,
        workshop_id: Uuid,
        patch: &JobPatch,
        actor: Uuid,
    ) -> Result<JobCard, ServiceError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let VersionedJob { mut job, version } = self.storage.get_job(job_id).await?;
            guard::ensure_owner(&job, workshop_id)?;

            if patch.is_empty() {
                return Ok(job);
            }

            let before = serde_json::to_value(&job).map_err(internal)?;
            let now = OffsetDateTime::now_utc();
            let changed = patch.apply(&mut job);
            job.updated_by = Some(actor);
            job.updated_at = now;
            let after = serde_json::to_value(&job).map_err(internal)?;

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
            let entry = audit::job_entry(
                &job,
                Some(actor),
                audit::ACTION_UPDATE,
                Some(field_snapshot(&before, &changed)),
                Some(field_snapshot(&after, &changed)),
                now,
            );
            if let Err(e) = self.storage.insert_audit(&mut snap, entry).await {
                let _ = self.storage.abort_snapshot(snap).await;
                return Err(e.into());
            }
            self.storage.commit_snapshot(snap).await?;
            return Ok(job);
        }
    }

    /// A job's current status and allowed targets, tenant-guarded.
    pub async fn get_valid_transitions(
        &self,
        job_id: Uuid,
        workshop_id: Uuid,
    ) -> Result<ValidTransitions, ServiceError> {
        let job = self.get_job(job_id, workshop_id).await?;
        Ok(ValidTransitions {
            current: job.status,
            allowed_targets: job.status.allowed_targets().to_vec(),
        })
    }

    /// Group a workshop's jobs by status.
    pub async fn get_workshop_stats(&self, workshop_id: Uuid) -> Result<WorkshopStats, ServiceError> {
        let by_status = self.storage.count_by_status(workshop_id).await?;
        let total: u64 = by_status.values().sum();
        let inactive = by_status.get(&JobStatus::Closed).copied().unwrap_or(0)
            + by_status.get(&JobStatus::Cancelled).copied().unwrap_or(0);
        Ok(WorkshopStats {
            total,
            active: total - inactive,
            by_status,
        })
    }

    /// A job's transition history in chronological order, tenant-guarded.
    pub async fn get_state_history(
        &self,
        job_id: Uuid,
        workshop_id: Uuid,
    ) -> Result<Vec<HistoryEntry>, ServiceError> {
        // Guard on the job record first so the ledger of another workshop's
        // job is just as invisible as the job itself.
        self.get_job(job_id, workshop_id).await?;
        Ok(self.storage.list_history(job_id).await?)
    }
}

/// Project `source` down to the named fields, for audit old/new snapshots.
fn field_snapshot(source: &serde_json::Value, fields: &[&'static str]) -> serde_json::Value {
    let mut snapshot = serde_json::Map::new();
    for field in fields {
        if let Some(value) = source.get(field) {
            snapshot.insert((*field).to_string(), value.clone());
        }
    }
    serde_json::Value::Object(snapshot)
}

fn internal(err: serde_json::Error) -> ServiceError {
    ServiceError::Storage(StorageError::Backend(err.to_string()))
}
