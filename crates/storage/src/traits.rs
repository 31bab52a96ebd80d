use std::collections::BTreeMap;

use async_trait::async_trait;
use uuid::Uuid;

use camber_core::{JobCard, JobStatus};

use crate::error::StorageError;
use crate::record::{AuditEntry, HistoryEntry, JobFilter, VersionedJob};

/// The storage trait for Camber backends.
///
/// A `JobStorage` implementation provides durable, transactional storage for
/// job cards, the per-job history ledger, and the per-workshop audit log.
///
/// ## Snapshot semantics
///
/// All mutating operations take `&mut Self::Snapshot`, a type representing
/// an in-progress transaction:
///
/// 1. `begin_snapshot()` — start a transaction
/// 2. call mutating methods with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)` to make the writes durable, or
///    `abort_snapshot(snapshot)` to discard them
///
/// A snapshot dropped without committing MUST roll back. A transition's
/// three writes (job update, history append, audit append) all land in one
/// snapshot, so a "successful" transition with a missing ledger entry is
/// unrepresentable.
///
/// ## OCC conflict detection
///
/// `update_job` is conditional on the caller's expected version. If the
/// stored version differs, it returns
/// `Err(StorageError::ConcurrentConflict { .. })` and stages nothing.
///
/// ## Tenant scoping
///
/// `get_job` and `get_job_by_token` are id-scoped, not tenant-scoped; the
/// engine's tenant guard compares the owner before anything is released to
/// a caller. The listing/aggregation reads take an explicit `workshop_id`
/// and never return another workshop's rows.
///
/// ## Thread safety
///
/// Implementations must be `Send + Sync + 'static` to live behind axum
/// state and cross async task boundaries.
#[async_trait]
pub trait JobStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this backend.
    type Snapshot: Send;

    // ── Snapshot lifecycle ───────────────────────────────────────────────

    /// Begin a new snapshot (transaction).
    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all staged writes durable atomically.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Abort (roll back) a snapshot, discarding all staged writes.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Job writes (within snapshot) ─────────────────────────────────────

    /// Insert a new job at version 0.
    ///
    /// Returns `Err(StorageError::AlreadyExists)` if the id is taken.
    async fn insert_job(
        &self,
        snapshot: &mut Self::Snapshot,
        job: &JobCard,
    ) -> Result<(), StorageError>;

    /// Apply a version-validated write of the whole job record (OCC).
    ///
    /// Conditional on `version = expected_version`; returns the new version
    /// on success and `Err(StorageError::ConcurrentConflict)` otherwise.
    async fn update_job(
        &self,
        snapshot: &mut Self::Snapshot,
        job: &JobCard,
        expected_version: i64,
    ) -> Result<i64, StorageError>;

    // ── Ledger appends (within snapshot) ─────────────────────────────────

    /// Append a history entry.
    ///
    /// Must be staged in the SAME snapshot as the job write it describes —
    /// that coupling is what keeps the ledger consistent with current state.
    async fn insert_history(
        &self,
        snapshot: &mut Self::Snapshot,
        entry: HistoryEntry,
    ) -> Result<(), StorageError>;

    /// Append an audit entry, in the same snapshot as the mutation it
    /// records.
    async fn insert_audit(
        &self,
        snapshot: &mut Self::Snapshot,
        entry: AuditEntry,
    ) -> Result<(), StorageError>;

    // ── Reads (outside snapshot) ─────────────────────────────────────────

    /// Read a job with its current version.
    ///
    /// Returns `Err(StorageError::JobNotFound)` if absent.
    async fn get_job(&self, job_id: Uuid) -> Result<VersionedJob, StorageError>;

    /// Read the job bound to a live approval token.
    ///
    /// Returns `Err(StorageError::TokenNotFound)` when no job carries the
    /// token. Expiry is the engine's concern, not the backend's.
    async fn get_job_by_token(&self, token: &str) -> Result<VersionedJob, StorageError>;

    /// List a workshop's jobs matching `filter`, newest first, windowed by
    /// `limit`/`offset`. Also returns the total match count regardless of
    /// the window.
    async fn list_jobs(
        &self,
        workshop_id: Uuid,
        filter: &JobFilter,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<JobCard>, usize), StorageError>;

    /// Count a workshop's jobs grouped by status. Statuses with no jobs are
    /// omitted.
    async fn count_by_status(
        &self,
        workshop_id: Uuid,
    ) -> Result<BTreeMap<JobStatus, u64>, StorageError>;

    /// All history entries for a job, in append (chronological) order.
    async fn list_history(&self, job_id: Uuid) -> Result<Vec<HistoryEntry>, StorageError>;

    /// A workshop's audit entries in append order; `limit` 0 means no limit.
    async fn list_audit(
        &self,
        workshop_id: Uuid,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, StorageError>;
}
