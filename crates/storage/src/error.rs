use uuid::Uuid;

/// All errors that can be returned by a [`crate::JobStorage`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No job record with the given id.
    #[error("job not found: {job_id}")]
    JobNotFound { job_id: Uuid },

    /// No job binds the presented approval token. The token itself is not
    /// echoed back; it is a capability string.
    #[error("no job bound to the presented approval token")]
    TokenNotFound,

    /// A job with this id already exists.
    #[error("job already exists: {job_id}")]
    AlreadyExists { job_id: Uuid },

    /// Optimistic concurrency conflict — another transaction committed a
    /// write to this job after the expected version was read.
    #[error("concurrent conflict on job {job_id}: expected version {expected_version}")]
    ConcurrentConflict { job_id: Uuid, expected_version: i64 },

    /// A backend-specific failure (connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
