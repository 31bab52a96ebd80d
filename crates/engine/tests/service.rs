//! Facade behavior: creation, listing, patching, and the audit coupling of
//! the non-status mutation paths.

mod common;

use uuid::Uuid;

use camber_core::{JobPatch, JobStatus, NewJob, Priority};
use camber_engine::ServiceError;
use camber_storage::{JobFilter, JobStorage};

use common::{advance, intake, service};

#[tokio::test]
async fn create_audits_and_reads_back() {
    let (service, storage) = service();
    let workshop = Uuid::new_v4();
    let actor = Uuid::new_v4();

    let job = service.create_job(workshop, intake(), actor).await.unwrap();
    assert_eq!(job.status, JobStatus::Created);
    assert_eq!(job.updated_by, Some(actor));

    let reread = service.get_job(job.id, workshop).await.unwrap();
    assert_eq!(reread, job);

    let audit = storage.list_audit(workshop, 0).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action, "job.create");
    assert_eq!(audit[0].entity_id, job.id);
    assert_eq!(audit[0].actor_id, Some(actor));
    assert!(audit[0].old_values.is_none());
    assert!(audit[0].new_values.is_some());
}

#[tokio::test]
async fn create_requires_a_registration_number() {
    let (service, _storage) = service();
    let err = service
        .create_job(Uuid::new_v4(), NewJob::default(), Uuid::new_v4())
        .await
        .unwrap_err();
    match err {
        ServiceError::RequirementsNotMet { unmet } => {
            assert_eq!(unmet[0].field, "registration_number");
        }
        other => panic!("expected RequirementsNotMet, got {other}"),
    }
}

#[tokio::test]
async fn list_filters_compose_and_totals_ignore_the_window() {
    let (service, _storage) = service();
    let workshop = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let technician = Uuid::new_v4();

    for i in 0..4 {
        let mut input = intake();
        if i % 2 == 0 {
            input.priority = Some(Priority::High);
        }
        if i == 0 {
            input.assigned_technician_id = Some(technician);
        }
        service.create_job(workshop, input, actor).await.unwrap();
    }
    let moved = service.create_job(workshop, intake(), actor).await.unwrap();
    service
        .transition(moved.id, workshop, JobStatus::ContextVerified, actor, None)
        .await
        .unwrap();

    let (all, total) = service
        .list_jobs(workshop, &JobFilter::default(), 100, 0)
        .await
        .unwrap();
    assert_eq!(total, 5);
    assert_eq!(all.len(), 5);

    let (page, total) = service
        .list_jobs(workshop, &JobFilter::default(), 2, 0)
        .await
        .unwrap();
    assert_eq!(total, 5, "total counts matches outside the page");
    assert_eq!(page.len(), 2);

    let (high, _) = service
        .list_jobs(
            workshop,
            &JobFilter {
                priority: Some(Priority::High),
                ..JobFilter::default()
            },
            100,
            0,
        )
        .await
        .unwrap();
    assert_eq!(high.len(), 2);
    assert!(high.iter().all(|j| j.priority == Priority::High));

    let (assigned, _) = service
        .list_jobs(
            workshop,
            &JobFilter {
                technician_id: Some(technician),
                ..JobFilter::default()
            },
            100,
            0,
        )
        .await
        .unwrap();
    assert_eq!(assigned.len(), 1);

    let (verified, _) = service
        .list_jobs(
            workshop,
            &JobFilter {
                status: Some(JobStatus::ContextVerified),
                ..JobFilter::default()
            },
            100,
            0,
        )
        .await
        .unwrap();
    assert_eq!(verified.len(), 1);
    assert_eq!(verified[0].id, moved.id);

    // A different workshop sees an empty list.
    let (other, total) = service
        .list_jobs(Uuid::new_v4(), &JobFilter::default(), 100, 0)
        .await
        .unwrap();
    assert!(other.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn patch_writes_the_allow_listed_fields_and_audits_the_diff() {
    let (service, storage) = service();
    let workshop = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let job = service.create_job(workshop, intake(), actor).await.unwrap();

    let editor = Uuid::new_v4();
    let updated = service
        .update_job_fields(
            job.id,
            workshop,
            &JobPatch {
                customer_phone: Some("+91-98765-43210".to_string()),
                priority: Some(Priority::Critical),
                ..JobPatch::default()
            },
            editor,
        )
        .await
        .unwrap();
    assert_eq!(updated.customer_phone.as_deref(), Some("+91-98765-43210"));
    assert_eq!(updated.priority, Priority::Critical);
    assert_eq!(updated.updated_by, Some(editor));
    // The patch path cannot move state.
    assert_eq!(updated.status, JobStatus::Created);

    let audit = storage.list_audit(workshop, 0).await.unwrap();
    let entry = audit.iter().find(|e| e.action == "job.update").unwrap();
    let old = entry.old_values.as_ref().unwrap();
    let new = entry.new_values.as_ref().unwrap();
    // Snapshots carry exactly the changed fields.
    assert_eq!(old.get("priority"), Some(&serde_json::json!("NORMAL")));
    assert_eq!(new.get("priority"), Some(&serde_json::json!("CRITICAL")));
    assert!(old.get("status").is_none());
    assert!(new.get("customer_phone").is_some());
}

#[tokio::test]
async fn empty_patch_is_a_no_op() {
    let (service, storage) = service();
    let workshop = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let job = service.create_job(workshop, intake(), actor).await.unwrap();

    let unchanged = service
        .update_job_fields(job.id, workshop, &JobPatch::default(), actor)
        .await
        .unwrap();
    assert_eq!(unchanged, job);

    let audit = storage.list_audit(workshop, 0).await.unwrap();
    assert!(audit.iter().all(|e| e.action != "job.update"));
}

#[tokio::test]
async fn patching_is_tenant_guarded() {
    let (service, _storage) = service();
    let workshop = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let job = service.create_job(workshop, intake(), actor).await.unwrap();

    assert!(matches!(
        service
            .update_job_fields(
                job.id,
                Uuid::new_v4(),
                &JobPatch {
                    priority: Some(Priority::Low),
                    ..JobPatch::default()
                },
                actor,
            )
            .await,
        Err(ServiceError::NotFound)
    ));
}

#[tokio::test]
async fn valid_transitions_reports_current_and_allowed() {
    let (service, _storage) = service();
    let workshop = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let job = service.create_job(workshop, intake(), actor).await.unwrap();

    let valid = service.get_valid_transitions(job.id, workshop).await.unwrap();
    assert_eq!(valid.current, JobStatus::Created);
    assert_eq!(valid.allowed_targets, vec![JobStatus::ContextVerified]);

    advance(&service, &job, actor, JobStatus::CustomerApproval).await;
    let valid = service.get_valid_transitions(job.id, workshop).await.unwrap();
    assert_eq!(valid.current, JobStatus::CustomerApproval);
    assert_eq!(
        valid.allowed_targets,
        vec![
            JobStatus::InProgress,
            JobStatus::ConcernRaised,
            JobStatus::Created
        ]
    );
}

#[tokio::test]
async fn unknown_job_reads_as_not_found() {
    let (service, _storage) = service();
    assert!(matches!(
        service.get_job(Uuid::new_v4(), Uuid::new_v4()).await,
        Err(ServiceError::NotFound)
    ));
}
