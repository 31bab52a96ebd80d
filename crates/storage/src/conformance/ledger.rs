use std::future::Future;

use uuid::Uuid;

use super::{make_audit, make_history, make_job, TestResult};
use crate::JobStorage;

use camber_core::JobStatus;

pub(super) async fn run_ledger_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "ledger",
            "history_preserves_append_order",
            history_preserves_append_order(factory).await,
        ),
        TestResult::from_result(
            "ledger",
            "history_is_scoped_to_its_job",
            history_is_scoped_to_its_job(factory).await,
        ),
        TestResult::from_result(
            "ledger",
            "audit_is_scoped_to_its_workshop",
            audit_is_scoped_to_its_workshop(factory).await,
        ),
    ]
}

/// History entries come back in the order they were appended, so replaying
/// them reconstructs the status sequence.
async fn history_preserves_append_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let mut job = make_job(Uuid::new_v4());

    let steps = [
        (JobStatus::Created, JobStatus::ContextVerified),
        (JobStatus::ContextVerified, JobStatus::Diagnosed),
        (JobStatus::Diagnosed, JobStatus::Estimated),
    ];

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

    for (i, (from, to)) in steps.into_iter().enumerate() {
        job.status = to;
        let mut snap = storage
            .begin_snapshot()
            .await
            .map_err(|e| format!("begin {i}: {e}"))?;
        storage
            .update_job(&mut snap, &job, i as i64)
            .await
            .map_err(|e| format!("update {i}: {e}"))?;
        storage
            .insert_history(&mut snap, make_history(job.id, from, to))
            .await
            .map_err(|e| format!("history {i}: {e}"))?;
        storage
            .commit_snapshot(snap)
            .await
            .map_err(|e| format!("commit {i}: {e}"))?;
    }

    let history = storage
        .list_history(job.id)
        .await
        .map_err(|e| format!("list_history: {e}"))?;
    if history.len() != steps.len() {
        return Err(format!(
            "expected {} entries, got {}",
            steps.len(),
            history.len()
        ));
    }
    for (entry, (from, to)) in history.iter().zip(steps) {
        if entry.previous_status != from || entry.new_status != to {
            return Err(format!(
                "entry out of order: {} -> {}",
                entry.previous_status, entry.new_status
            ));
        }
    }
    // Replay: each entry's previous status must equal the prior entry's new
    // status, and the tail must match the stored job.
    for pair in history.windows(2) {
        if pair[1].previous_status != pair[0].new_status {
            return Err("history chain is broken".to_string());
        }
    }
    let versioned = storage
        .get_job(job.id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if history.last().map(|e| e.new_status) != Some(versioned.job.status) {
        return Err("history tail disagrees with stored status".to_string());
    }
    Ok(())
}

/// One job's ledger never contains another job's transitions.
async fn history_is_scoped_to_its_job<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let job_a = make_job(Uuid::new_v4());
    let job_b = make_job(Uuid::new_v4());

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .insert_job(&mut snap, &job_a)
        .await
        .map_err(|e| format!("insert a: {e}"))?;
    storage
        .insert_job(&mut snap, &job_b)
        .await
        .map_err(|e| format!("insert b: {e}"))?;
    storage
        .insert_history(
            &mut snap,
            make_history(job_a.id, JobStatus::Created, JobStatus::ContextVerified),
        )
        .await
        .map_err(|e| format!("history: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let history_b = storage
        .list_history(job_b.id)
        .await
        .map_err(|e| format!("list_history: {e}"))?;
    if !history_b.is_empty() {
        return Err("job B sees job A's history".to_string());
    }
    Ok(())
}

/// One workshop's audit log never contains another workshop's entries.
async fn audit_is_scoped_to_its_workshop<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let workshop_a = Uuid::new_v4();
    let workshop_b = Uuid::new_v4();
    let job = make_job(workshop_a);

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .insert_job(&mut snap, &job)
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .insert_audit(&mut snap, make_audit(workshop_a, job.id, "job.create"))
        .await
        .map_err(|e| format!("audit: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let audit_a = storage
        .list_audit(workshop_a, 0)
        .await
        .map_err(|e| format!("list_audit a: {e}"))?;
    if audit_a.len() != 1 {
        return Err(format!("expected 1 entry for workshop A, got {}", audit_a.len()));
    }
    let audit_b = storage
        .list_audit(workshop_b, 0)
        .await
        .map_err(|e| format!("list_audit b: {e}"))?;
    if !audit_b.is_empty() {
        return Err("workshop B sees workshop A's audit entries".to_string());
    }
    Ok(())
}
