use std::future::Future;

use uuid::Uuid;

use super::{make_job, TestResult};
use crate::{JobStorage, StorageError};

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "snapshot",
            "uncommitted_writes_invisible",
            uncommitted_writes_invisible(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "aborted_writes_discarded",
            aborted_writes_discarded(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "committed_writes_visible",
            committed_writes_visible(factory).await,
        ),
    ]
}

/// Writes staged in an open snapshot are invisible to reads.
async fn uncommitted_writes_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
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

    match storage.get_job(job.id).await {
        Err(StorageError::JobNotFound { .. }) => {}
        Err(e) => return Err(format!("expected JobNotFound, got {e}")),
        Ok(_) => return Err("uncommitted insert visible to reads".to_string()),
    }

    storage
        .abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))?;
    Ok(())
}

/// An aborted snapshot leaves no trace.
async fn aborted_writes_discarded<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    match storage.get_job(job.id).await {
        Err(StorageError::JobNotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected JobNotFound, got {e}")),
        Ok(_) => Err("aborted insert survived".to_string()),
    }
}

/// Committed writes are immediately visible to reads.
async fn committed_writes_visible<S, F, Fut>(factory: &F) -> Result<(), String>
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

    storage
        .get_job(job.id)
        .await
        .map(|_| ())
        .map_err(|e| format!("get after commit: {e}"))
}
