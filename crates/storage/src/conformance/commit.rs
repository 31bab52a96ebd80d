use std::future::Future;

use uuid::Uuid;

use super::{make_audit, make_history, make_job, TestResult};
use crate::JobStorage;

use camber_core::JobStatus;

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "commit",
            "multi_record_commit_is_atomic",
            multi_record_commit_is_atomic(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "multi_record_abort_discards_everything",
            multi_record_abort_discards_everything(factory).await,
        ),
    ]
}

/// A snapshot staging a job update plus history and audit appends commits
/// as a unit: afterwards all three records are visible.
async fn multi_record_commit_is_atomic<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let workshop = Uuid::new_v4();
    let mut job = make_job(workshop);

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
        .map_err(|e| format!("commit insert: {e}"))?;

    // The shape of a transition: job write + history + audit in one snapshot.
    job.status = JobStatus::ContextVerified;
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin 2: {e}"))?;
    storage
        .update_job(&mut snap, &job, 0)
        .await
        .map_err(|e| format!("update: {e}"))?;
    storage
        .insert_history(
            &mut snap,
            make_history(job.id, JobStatus::Created, JobStatus::ContextVerified),
        )
        .await
        .map_err(|e| format!("history: {e}"))?;
    storage
        .insert_audit(&mut snap, make_audit(workshop, job.id, "job.transition"))
        .await
        .map_err(|e| format!("audit: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let versioned = storage
        .get_job(job.id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if versioned.job.status != JobStatus::ContextVerified {
        return Err(format!("job status not updated: {}", versioned.job.status));
    }
    if versioned.version != 1 {
        return Err(format!("expected version 1, got {}", versioned.version));
    }

    let history = storage
        .list_history(job.id)
        .await
        .map_err(|e| format!("list_history: {e}"))?;
    if history.len() != 1 {
        return Err(format!("expected 1 history entry, got {}", history.len()));
    }

    let audit = storage
        .list_audit(workshop, 0)
        .await
        .map_err(|e| format!("list_audit: {e}"))?;
    if audit.len() != 1 {
        return Err(format!("expected 1 audit entry, got {}", audit.len()));
    }
    Ok(())
}

/// Aborting the same multi-record snapshot leaves none of the three writes.
async fn multi_record_abort_discards_everything<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let workshop = Uuid::new_v4();
    let mut job = make_job(workshop);

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
        .map_err(|e| format!("commit insert: {e}"))?;

    job.status = JobStatus::ContextVerified;
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin 2: {e}"))?;
    storage
        .update_job(&mut snap, &job, 0)
        .await
        .map_err(|e| format!("update: {e}"))?;
    storage
        .insert_history(
            &mut snap,
            make_history(job.id, JobStatus::Created, JobStatus::ContextVerified),
        )
        .await
        .map_err(|e| format!("history: {e}"))?;
    storage
        .insert_audit(&mut snap, make_audit(workshop, job.id, "job.transition"))
        .await
        .map_err(|e| format!("audit: {e}"))?;
    storage
        .abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    let versioned = storage
        .get_job(job.id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if versioned.job.status != JobStatus::Created {
        return Err("aborted job update was applied".to_string());
    }
    if versioned.version != 0 {
        return Err(format!("expected version 0, got {}", versioned.version));
    }
    let history = storage
        .list_history(job.id)
        .await
        .map_err(|e| format!("list_history: {e}"))?;
    if !history.is_empty() {
        return Err("aborted history entry survived".to_string());
    }
    let audit = storage
        .list_audit(workshop, 0)
        .await
        .map_err(|e| format!("list_audit: {e}"))?;
    if !audit.is_empty() {
        return Err("aborted audit entry survived".to_string());
    }
    Ok(())
}
