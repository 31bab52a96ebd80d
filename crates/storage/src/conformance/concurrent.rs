use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;

use super::{make_job, TestResult};
use crate::{JobStorage, StorageError};

use camber_core::JobStatus;

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_updates_exactly_one_wins",
            concurrent_updates_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_updates_different_jobs_all_succeed",
            concurrent_updates_different_jobs_all_succeed(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_updates_final_state_consistent",
            concurrent_updates_final_state_consistent(factory).await,
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

/// N tasks each open a snapshot and attempt to update the same job from
/// version 0. Exactly one commit succeeds; the rest get ConcurrentConflict.
///
/// This exercises real concurrency — `tokio::spawn` creates parallel tasks
/// racing the OCC version check, unlike the sequential simulation in the
/// `version` module.
async fn concurrent_updates_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let job = make_job(Uuid::new_v4());
    insert_committed(storage.as_ref(), &job).await?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        let mut contender = job.clone();
        handles.push(tokio::spawn(async move {
            contender.status = JobStatus::ContextVerified;
            let mut snap = s.begin_snapshot().await?;
            let result = s.update_job(&mut snap, &contender, 0).await;
            match result {
                Ok(_new_version) => {
                    s.commit_snapshot(snap).await?;
                    Ok(true) // won the race
                }
                Err(StorageError::ConcurrentConflict { .. }) => {
                    s.abort_snapshot(snap).await?;
                    Ok(false) // lost the race
                }
                Err(e) => {
                    let _ = s.abort_snapshot(snap).await;
                    Err(e)
                }
            }
        }));
    }

    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }
    Ok(())
}

/// N tasks each update a different job. All succeed — no false conflicts
/// when there is no contention.
async fn concurrent_updates_different_jobs_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let workshop = Uuid::new_v4();

    let mut jobs = Vec::new();
    {
        let mut snap = storage
            .begin_snapshot()
            .await
            .map_err(|e| format!("begin: {e}"))?;
        for i in 0..N {
            let job = make_job(workshop);
            storage
                .insert_job(&mut snap, &job)
                .await
                .map_err(|e| format!("insert {i}: {e}"))?;
            jobs.push(job);
        }
        storage
            .commit_snapshot(snap)
            .await
            .map_err(|e| format!("commit init: {e}"))?;
    }

    let mut handles = Vec::new();
    for mut job in jobs.clone() {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            job.status = JobStatus::ContextVerified;
            let mut snap = s.begin_snapshot().await?;
            s.update_job(&mut snap, &job, 0).await?;
            s.commit_snapshot(snap).await?;
            Ok::<(), StorageError>(())
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        handle
            .await
            .map_err(|e| format!("task {i} panic: {e}"))?
            .map_err(|e| format!("task {i} failed: {e}"))?;
    }

    for (i, job) in jobs.iter().enumerate() {
        let versioned = storage
            .get_job(job.id)
            .await
            .map_err(|e| format!("get {i}: {e}"))?;
        if versioned.job.status != JobStatus::ContextVerified {
            return Err(format!(
                "job {i}: expected CONTEXT_VERIFIED, got {}",
                versioned.job.status
            ));
        }
        if versioned.version != 1 {
            return Err(format!("job {i}: expected version 1, got {}", versioned.version));
        }
    }
    Ok(())
}

/// After a concurrent race on one job, the final state is consistent:
/// exactly version 1, in the target state, readable by a plain read.
async fn concurrent_updates_final_state_consistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let job = make_job(Uuid::new_v4());
    insert_committed(storage.as_ref(), &job).await?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        let mut contender = job.clone();
        handles.push(tokio::spawn(async move {
            contender.status = JobStatus::ContextVerified;
            let mut snap = s.begin_snapshot().await?;
            match s.update_job(&mut snap, &contender, 0).await {
                Ok(_) => {
                    s.commit_snapshot(snap).await?;
                    Ok(())
                }
                Err(StorageError::ConcurrentConflict { .. }) => {
                    s.abort_snapshot(snap).await?;
                    Ok(())
                }
                Err(e) => {
                    let _ = s.abort_snapshot(snap).await;
                    Err(e)
                }
            }
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
    }

    let versioned = storage
        .get_job(job.id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if versioned.version != 1 {
        return Err(format!(
            "expected version 1 after single winning update, got {}",
            versioned.version
        ));
    }
    if versioned.job.status != JobStatus::ContextVerified {
        return Err(format!(
            "expected CONTEXT_VERIFIED, got {}",
            versioned.job.status
        ));
    }
    Ok(())
}
