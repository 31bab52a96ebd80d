use std::future::Future;

use uuid::Uuid;

use super::{make_job, TestResult};
use crate::{JobStorage, StorageError};

pub(super) async fn run_init_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "init",
            "insert_creates_job_at_version_0",
            insert_creates_job_at_version_0(factory).await,
        ),
        TestResult::from_result(
            "init",
            "duplicate_insert_rejected",
            duplicate_insert_rejected(factory).await,
        ),
        TestResult::from_result(
            "init",
            "missing_job_reads_as_not_found",
            missing_job_reads_as_not_found(factory).await,
        ),
    ]
}

/// A committed insert is readable at version 0 with the inserted fields.
async fn insert_creates_job_at_version_0<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let job = make_job(Uuid::new_v4());

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .insert_job(&mut snap, &job)
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let versioned = storage
        .get_job(job.id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if versioned.version != 0 {
        return Err(format!("expected version 0, got {}", versioned.version));
    }
    if versioned.job.registration_number != job.registration_number {
        return Err("inserted fields not preserved".to_string());
    }
    Ok(())
}

/// Inserting the same job id twice fails with AlreadyExists.
async fn duplicate_insert_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let job = make_job(Uuid::new_v4());

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .insert_job(&mut snap, &job)
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin 2: {e}"))?;
    match storage.insert_job(&mut snap, &job).await {
        Err(StorageError::AlreadyExists { job_id }) if job_id == job.id => Ok(()),
        Err(e) => Err(format!("expected AlreadyExists, got {e}")),
        Ok(()) => Err("duplicate insert unexpectedly succeeded".to_string()),
    }
}

/// Reading an unknown id yields JobNotFound.
async fn missing_job_reads_as_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    match storage.get_job(Uuid::new_v4()).await {
        Err(StorageError::JobNotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected JobNotFound, got {e}")),
        Ok(_) => Err("read of unknown id unexpectedly succeeded".to_string()),
    }
}
