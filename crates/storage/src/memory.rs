//! In-memory reference backend.
//!
//! Committed state lives behind an `RwLock`; writers are serialized by an
//! owned mutex guard held for the snapshot's lifetime, and snapshot writes
//! are staged in memory until commit. Because at most one snapshot is open
//! at a time, version checks performed at staging time remain valid through
//! commit, which applies all staged writes under a single write lock.
//!
//! Dropping a snapshot without committing releases the writer guard and
//! discards the staged writes — rollback is the default.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use camber_core::{JobCard, JobStatus};

use crate::error::StorageError;
use crate::record::{AuditEntry, HistoryEntry, JobFilter, VersionedJob};
use crate::traits::JobStorage;

#[derive(Default)]
struct Committed {
    jobs: HashMap<Uuid, VersionedJob>,
    history: Vec<HistoryEntry>,
    audit: Vec<AuditEntry>,
}

enum Staged {
    UpsertJob(VersionedJob),
    History(HistoryEntry),
    Audit(AuditEntry),
}

/// An open transaction against [`MemoryStorage`].
pub struct MemorySnapshot {
    /// Holding this guard is what serializes writers.
    _writer: OwnedMutexGuard<()>,
    staged: Vec<Staged>,
}

impl MemorySnapshot {
    /// The version a job would have if this snapshot committed now:
    /// the last staged write wins over committed state.
    fn staged_version(&self, job_id: Uuid) -> Option<i64> {
        self.staged.iter().rev().find_map(|write| match write {
            Staged::UpsertJob(versioned) if versioned.job.id == job_id => Some(versioned.version),
            _ => None,
        })
    }

    fn stages_insert(&self, job_id: Uuid) -> bool {
        self.staged.iter().any(
            |write| matches!(write, Staged::UpsertJob(v) if v.job.id == job_id && v.version == 0),
        )
    }
}

/// In-memory [`JobStorage`] backend for tests and the demo server.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    committed: Arc<RwLock<Committed>>,
    writer: Arc<Mutex<()>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStorage for MemoryStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError> {
        let guard = self.writer.clone().lock_owned().await;
        Ok(MemorySnapshot {
            _writer: guard,
            staged: Vec::new(),
        })
    }

    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError> {
        let mut committed = self.committed.write().await;
        for write in snapshot.staged {
            match write {
                Staged::UpsertJob(versioned) => {
                    committed.jobs.insert(versioned.job.id, versioned);
                }
                Staged::History(entry) => committed.history.push(entry),
                Staged::Audit(entry) => committed.audit.push(entry),
            }
        }
        Ok(())
    }

    async fn abort_snapshot(&self, _snapshot: Self::Snapshot) -> Result<(), StorageError> {
        // Dropping the snapshot discards staged writes and frees the writer.
        Ok(())
    }

    async fn insert_job(
        &self,
        snapshot: &mut Self::Snapshot,
        job: &JobCard,
    ) -> Result<(), StorageError> {
        let committed = self.committed.read().await;
        if committed.jobs.contains_key(&job.id) || snapshot.stages_insert(job.id) {
            return Err(StorageError::AlreadyExists { job_id: job.id });
        }
        snapshot.staged.push(Staged::UpsertJob(VersionedJob {
            job: job.clone(),
            version: 0,
        }));
        Ok(())
    }

    async fn update_job(
        &self,
        snapshot: &mut Self::Snapshot,
        job: &JobCard,
        expected_version: i64,
    ) -> Result<i64, StorageError> {
        let current = match snapshot.staged_version(job.id) {
            Some(version) => version,
            None => {
                let committed = self.committed.read().await;
                committed
                    .jobs
                    .get(&job.id)
                    .map(|versioned| versioned.version)
                    .ok_or(StorageError::JobNotFound { job_id: job.id })?
            }
        };
        if current != expected_version {
            return Err(StorageError::ConcurrentConflict {
                job_id: job.id,
                expected_version,
            });
        }
        let new_version = expected_version + 1;
        snapshot.staged.push(Staged::UpsertJob(VersionedJob {
            job: job.clone(),
            version: new_version,
        }));
        Ok(new_version)
    }

    async fn insert_history(
        &self,
        snapshot: &mut Self::Snapshot,
        entry: HistoryEntry,
    ) -> Result<(), StorageError> {
        snapshot.staged.push(Staged::History(entry));
        Ok(())
    }

    async fn insert_audit(
        &self,
        snapshot: &mut Self::Snapshot,
        entry: AuditEntry,
    ) -> Result<(), StorageError> {
        snapshot.staged.push(Staged::Audit(entry));
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> Result<VersionedJob, StorageError> {
        let committed = self.committed.read().await;
        committed
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or(StorageError::JobNotFound { job_id })
    }

    async fn get_job_by_token(&self, token: &str) -> Result<VersionedJob, StorageError> {
        let committed = self.committed.read().await;
        committed
            .jobs
            .values()
            .find(|versioned| versioned.job.approval_token.as_deref() == Some(token))
            .cloned()
            .ok_or(StorageError::TokenNotFound)
    }

    async fn list_jobs(
        &self,
        workshop_id: Uuid,
        filter: &JobFilter,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<JobCard>, usize), StorageError> {
        let committed = self.committed.read().await;
        let mut matches: Vec<&JobCard> = committed
            .jobs
            .values()
            .map(|versioned| &versioned.job)
            .filter(|job| job.workshop_id == workshop_id && filter.matches(job))
            .collect();
        // Newest first; id as a stable tie-break for equal timestamps.
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let total = matches.len();
        let page = matches
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn count_by_status(
        &self,
        workshop_id: Uuid,
    ) -> Result<BTreeMap<JobStatus, u64>, StorageError> {
        let committed = self.committed.read().await;
        let mut counts = BTreeMap::new();
        for versioned in committed.jobs.values() {
            if versioned.job.workshop_id == workshop_id {
                *counts.entry(versioned.job.status).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn list_history(&self, job_id: Uuid) -> Result<Vec<HistoryEntry>, StorageError> {
        let committed = self.committed.read().await;
        Ok(committed
            .history
            .iter()
            .filter(|entry| entry.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn list_audit(
        &self,
        workshop_id: Uuid,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, StorageError> {
        let committed = self.committed.read().await;
        let entries = committed
            .audit
            .iter()
            .filter(|entry| entry.workshop_id == workshop_id)
            .cloned();
        Ok(if limit == 0 {
            entries.collect()
        } else {
            entries.take(limit).collect()
        })
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use camber_core::NewJob;
    use time::macros::datetime;

    fn make_job(workshop_id: Uuid) -> JobCard {
        JobCard::create(
            workshop_id,
            NewJob {
                registration_number: "KA-01-HH-1234".to_string(),
                ..NewJob::default()
            },
            datetime!(2025-06-01 09:00 UTC),
        )
    }

    #[tokio::test]
    async fn insert_then_get() {
        let storage = MemoryStorage::new();
        let job = make_job(Uuid::new_v4());

        let mut snap = storage.begin_snapshot().await.unwrap();
        storage.insert_job(&mut snap, &job).await.unwrap();
        storage.commit_snapshot(snap).await.unwrap();

        let versioned = storage.get_job(job.id).await.unwrap();
        assert_eq!(versioned.version, 0);
        assert_eq!(versioned.job, job);
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible() {
        let storage = MemoryStorage::new();
        let job = make_job(Uuid::new_v4());

        let mut snap = storage.begin_snapshot().await.unwrap();
        storage.insert_job(&mut snap, &job).await.unwrap();
        assert!(matches!(
            storage.get_job(job.id).await,
            Err(StorageError::JobNotFound { .. })
        ));
        storage.abort_snapshot(snap).await.unwrap();
        assert!(storage.get_job(job.id).await.is_err());
    }

    #[tokio::test]
    async fn update_with_stale_version_conflicts() {
        let storage = MemoryStorage::new();
        let mut job = make_job(Uuid::new_v4());

        let mut snap = storage.begin_snapshot().await.unwrap();
        storage.insert_job(&mut snap, &job).await.unwrap();
        storage.commit_snapshot(snap).await.unwrap();

        job.status = JobStatus::ContextVerified;
        let mut snap = storage.begin_snapshot().await.unwrap();
        assert_eq!(storage.update_job(&mut snap, &job, 0).await.unwrap(), 1);
        storage.commit_snapshot(snap).await.unwrap();

        let mut snap = storage.begin_snapshot().await.unwrap();
        let err = storage.update_job(&mut snap, &job, 0).await.unwrap_err();
        assert!(matches!(err, StorageError::ConcurrentConflict { .. }));
    }

    #[tokio::test]
    async fn dropped_snapshot_releases_the_writer() {
        let storage = MemoryStorage::new();
        {
            let _snap = storage.begin_snapshot().await.unwrap();
        }
        // A second snapshot can be opened once the first is gone.
        let snap = storage.begin_snapshot().await.unwrap();
        storage.commit_snapshot(snap).await.unwrap();
    }

    #[tokio::test]
    async fn token_lookup_finds_the_bound_job() {
        let storage = MemoryStorage::new();
        let mut job = make_job(Uuid::new_v4());
        job.approval_token = Some("tok-abc".to_string());

        let mut snap = storage.begin_snapshot().await.unwrap();
        storage.insert_job(&mut snap, &job).await.unwrap();
        storage.commit_snapshot(snap).await.unwrap();

        let versioned = storage.get_job_by_token("tok-abc").await.unwrap();
        assert_eq!(versioned.job.id, job.id);
        assert!(matches!(
            storage.get_job_by_token("tok-other").await,
            Err(StorageError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn list_jobs_windows_and_counts() {
        let storage = MemoryStorage::new();
        let workshop = Uuid::new_v4();

        let mut snap = storage.begin_snapshot().await.unwrap();
        for hour in 0..5u8 {
            let mut job = make_job(workshop);
            job.created_at = datetime!(2025-06-01 00:00 UTC) + time::Duration::hours(hour as i64);
            storage.insert_job(&mut snap, &job).await.unwrap();
        }
        // A job in another workshop never shows up.
        let other = make_job(Uuid::new_v4());
        storage.insert_job(&mut snap, &other).await.unwrap();
        storage.commit_snapshot(snap).await.unwrap();

        let (page, total) = storage
            .list_jobs(workshop, &JobFilter::default(), 2, 1)
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        // Newest first, offset skips the newest.
        assert!(page[0].created_at > page[1].created_at);
    }
}
