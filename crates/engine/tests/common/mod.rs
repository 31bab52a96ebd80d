//! Shared fixtures for the engine integration tests.

use std::sync::Arc;

use uuid::Uuid;

use camber_core::{JobCard, JobPatch, JobStatus, NewJob};
use camber_engine::JobService;
use camber_storage::MemoryStorage;

/// A service over a fresh in-memory backend, plus the backend handle for
/// direct ledger inspection.
pub fn service() -> (JobService<MemoryStorage>, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    (JobService::new(Arc::clone(&storage)), storage)
}

/// Intake input with a registration number and one symptom recorded.
pub fn intake() -> NewJob {
    NewJob {
        registration_number: "KA-01-HH-1234".to_string(),
        symptoms: vec!["rattle at idle".to_string()],
        ..NewJob::default()
    }
}

/// Walk a freshly created job down the mainline to `target`, attaching the
/// diagnosis payload before the estimate stage.
pub async fn advance(
    service: &JobService<MemoryStorage>,
    job: &JobCard,
    actor: Uuid,
    target: JobStatus,
) -> JobCard {
    let mainline = [
        JobStatus::ContextVerified,
        JobStatus::Diagnosed,
        JobStatus::Estimated,
        JobStatus::CustomerApproval,
        JobStatus::InProgress,
        JobStatus::Pdi,
        JobStatus::Invoiced,
        JobStatus::Closed,
    ];

    let mut current = job.clone();
    for next in mainline {
        if next == JobStatus::Estimated && current.diagnosis.is_none() {
            current = service
                .update_job_fields(
                    job.id,
                    job.workshop_id,
                    &JobPatch {
                        diagnosis: Some(serde_json::json!({"fault": "loose heat shield"})),
                        ..JobPatch::default()
                    },
                    actor,
                )
                .await
                .expect("attach diagnosis");
        }
        current = service
            .transition(job.id, job.workshop_id, next, actor, None)
            .await
            .unwrap_or_else(|e| panic!("advance to {next}: {e}"))
            .job;
        if next == target {
            break;
        }
    }
    assert_eq!(current.status, target);
    current
}
