use std::future::Future;

use uuid::Uuid;

use super::{make_job, TestResult};
use crate::{JobStorage, StorageError};

use camber_core::JobStatus;

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "version",
            "versions_increment_per_write",
            versions_increment_per_write(factory).await,
        ),
        TestResult::from_result(
            "version",
            "stale_expected_version_conflicts",
            stale_expected_version_conflicts(factory).await,
        ),
        TestResult::from_result(
            "version",
            "conflicting_update_stages_nothing",
            conflicting_update_stages_nothing(factory).await,
        ),
    ]
}

async fn insert_committed<S: JobStorage>(
    storage: &S,
    job: &camber_core::JobCard,
) -> Result<(), String> {
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .insert_job(&mut snap, job)
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit insert: {e}"))?;
    Ok(())
}

/// Each committed write bumps the version by exactly one.
async fn versions_increment_per_write<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let mut job = make_job(Uuid::new_v4());
    insert_committed(&storage, &job).await?;

    for (expected, target) in [
        (0, JobStatus::ContextVerified),
        (1, JobStatus::Diagnosed),
        (2, JobStatus::Estimated),
    ] {
        job.status = target;
        let mut snap = storage
            .begin_snapshot()
            .await
            .map_err(|e| format!("begin: {e}"))?;
        let new_version = storage
            .update_job(&mut snap, &job, expected)
            .await
            .map_err(|e| format!("update at {expected}: {e}"))?;
        storage
            .commit_snapshot(snap)
            .await
            .map_err(|e| format!("commit at {expected}: {e}"))?;
        if new_version != expected + 1 {
            return Err(format!(
                "expected new version {}, got {new_version}",
                expected + 1
            ));
        }
    }

    let versioned = storage
        .get_job(job.id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if versioned.version != 3 {
        return Err(format!("expected final version 3, got {}", versioned.version));
    }
    Ok(())
}

/// An update against a superseded version must conflict, not apply.
async fn stale_expected_version_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let mut job = make_job(Uuid::new_v4());
    insert_committed(&storage, &job).await?;

    job.status = JobStatus::ContextVerified;
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .update_job(&mut snap, &job, 0)
        .await
        .map_err(|e| format!("update: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    // Retry with the stale expected version.
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin 2: {e}"))?;
    let result = storage.update_job(&mut snap, &job, 0).await;
    storage
        .abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    match result {
        Err(StorageError::ConcurrentConflict {
            job_id,
            expected_version,
        }) => {
            if job_id != job.id || expected_version != 0 {
                return Err("conflict carried wrong identifiers".to_string());
            }
            Ok(())
        }
        Err(e) => Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(v) => Err(format!("stale update unexpectedly succeeded at {v}")),
    }
}

/// A conflicting update leaves the stored record untouched even if the
/// snapshot is subsequently committed.
async fn conflicting_update_stages_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let mut job = make_job(Uuid::new_v4());
    insert_committed(&storage, &job).await?;

    job.status = JobStatus::ContextVerified;
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .update_job(&mut snap, &job, 0)
        .await
        .map_err(|e| format!("update: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin 2: {e}"))?;
    job.status = JobStatus::Cancelled;
    if storage.update_job(&mut snap, &job, 0).await.is_ok() {
        return Err("stale update unexpectedly accepted".to_string());
    }
    // Committing the snapshot that observed a conflict must not apply it.
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit 2: {e}"))?;

    let versioned = storage
        .get_job(job.id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if versioned.job.status != JobStatus::ContextVerified || versioned.version != 1 {
        return Err(format!(
            "conflicting write leaked: status {}, version {}",
            versioned.job.status, versioned.version
        ));
    }
    Ok(())
}
