//! Approval token behavior: issuance, expiry, single-use consumption, and
//! the rule that a token never bypasses workflow checks.

mod common;

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use camber_core::JobStatus;
use camber_engine::{CustomerAction, ServiceError};
use camber_storage::JobStorage;

use common::{advance, intake, service};

fn in_one_day() -> OffsetDateTime {
    OffsetDateTime::now_utc() + Duration::days(1)
}

#[tokio::test]
async fn issued_token_resolves_to_its_job() {
    let (service, _storage) = service();
    let workshop = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let job = service.create_job(workshop, intake(), actor).await.unwrap();
    advance(&service, &job, actor, JobStatus::CustomerApproval).await;

    let token = service
        .issue_approval_token(job.id, workshop, in_one_day(), actor)
        .await
        .unwrap();

    let resolved = service.get_job_by_token(&token).await.unwrap();
    assert_eq!(resolved.id, job.id);
    assert_eq!(resolved.approval_token.as_deref(), Some(token.as_str()));
}

#[tokio::test]
async fn unknown_token_reads_as_not_found() {
    let (service, _storage) = service();
    assert!(matches!(
        service.get_job_by_token("not-a-token").await,
        Err(ServiceError::NotFound)
    ));
}

#[tokio::test]
async fn expired_token_is_rejected_and_moves_nothing() {
    let (service, _storage) = service();
    let workshop = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let job = service.create_job(workshop, intake(), actor).await.unwrap();
    advance(&service, &job, actor, JobStatus::CustomerApproval).await;

    let expired = OffsetDateTime::now_utc() - Duration::seconds(1);
    let token = service
        .issue_approval_token(job.id, workshop, expired, actor)
        .await
        .unwrap();

    assert!(matches!(
        service.get_job_by_token(&token).await,
        Err(ServiceError::TokenExpired)
    ));
    let err = service
        .apply_customer_action(&token, CustomerAction::Approve)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::TokenExpired));

    let reread = service.get_job(job.id, workshop).await.unwrap();
    assert_eq!(reread.status, JobStatus::CustomerApproval);
    assert!(reread.customer_approved_at.is_none());
}

#[tokio::test]
async fn approve_starts_work_and_consumes_the_token() {
    let (service, _storage) = service();
    let workshop = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let job = service.create_job(workshop, intake(), actor).await.unwrap();
    advance(&service, &job, actor, JobStatus::CustomerApproval).await;

    let token = service
        .issue_approval_token(job.id, workshop, in_one_day(), actor)
        .await
        .unwrap();
    let outcome = service
        .apply_customer_action(&token, CustomerAction::Approve)
        .await
        .unwrap();
    assert_eq!(outcome.job_id, job.id);
    assert_eq!(outcome.new_status, JobStatus::InProgress);

    let approved = service.get_job(job.id, workshop).await.unwrap();
    assert_eq!(approved.status, JobStatus::InProgress);
    assert!(approved.customer_approved_at.is_some());
    assert!(approved.started_at.is_some());
    // Token-authenticated: no staff actor recorded.
    assert_eq!(approved.updated_by, None);
    // Single-use: consumed in the same write.
    assert!(approved.approval_token.is_none());
    assert!(approved.approval_expires_at.is_none());

    // A consumed token no longer resolves.
    assert!(matches!(
        service.get_job_by_token(&token).await,
        Err(ServiceError::NotFound)
    ));
    assert!(matches!(
        service
            .apply_customer_action(&token, CustomerAction::Approve)
            .await,
        Err(ServiceError::NotFound)
    ));
}

#[tokio::test]
async fn concern_diverts_the_job_with_no_actor_on_record() {
    let (service, storage) = service();
    let workshop = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let job = service.create_job(workshop, intake(), actor).await.unwrap();
    advance(&service, &job, actor, JobStatus::CustomerApproval).await;

    let token = service
        .issue_approval_token(job.id, workshop, in_one_day(), actor)
        .await
        .unwrap();
    let outcome = service
        .apply_customer_action(&token, CustomerAction::Concern)
        .await
        .unwrap();
    assert_eq!(outcome.new_status, JobStatus::ConcernRaised);

    let history = service.get_state_history(job.id, workshop).await.unwrap();
    let entry = history.last().unwrap();
    assert_eq!(entry.previous_status, JobStatus::CustomerApproval);
    assert_eq!(entry.new_status, JobStatus::ConcernRaised);
    assert_eq!(entry.actor_id, None);

    // Audited under the customer-action name, with no actor.
    let audit = storage.list_audit(workshop, 0).await.unwrap();
    let entry = audit
        .iter()
        .find(|e| e.action == "job.customer_action")
        .expect("customer action audited");
    assert_eq!(entry.actor_id, None);
    assert_eq!(entry.entity_id, job.id);
}

#[tokio::test]
async fn reject_returns_to_intake_without_clearing_stamps() {
    let (service, _storage) = service();
    let workshop = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let job = service.create_job(workshop, intake(), actor).await.unwrap();
    advance(&service, &job, actor, JobStatus::CustomerApproval).await;

    let token = service
        .issue_approval_token(job.id, workshop, in_one_day(), actor)
        .await
        .unwrap();
    let outcome = service
        .apply_customer_action(&token, CustomerAction::Reject)
        .await
        .unwrap();
    assert_eq!(outcome.new_status, JobStatus::Created);

    let rejected = service.get_job(job.id, workshop).await.unwrap();
    assert_eq!(rejected.status, JobStatus::Created);
    // The audit trail stays monotonic.
    assert!(rejected.sent_for_approval_at.is_some());
}

#[tokio::test]
async fn a_token_cannot_skip_workflow_rules() {
    let (service, _storage) = service();
    let workshop = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let job = service.create_job(workshop, intake(), actor).await.unwrap();
    // Token issued while the job is still waiting on an estimate.
    advance(&service, &job, actor, JobStatus::Estimated).await;

    let token = service
        .issue_approval_token(job.id, workshop, in_one_day(), actor)
        .await
        .unwrap();
    let err = service
        .apply_customer_action(&token, CustomerAction::Approve)
        .await
        .unwrap_err();
    match err {
        ServiceError::InvalidTransition {
            current, requested, ..
        } => {
            assert_eq!(current, JobStatus::Estimated);
            assert_eq!(requested, JobStatus::InProgress);
        }
        other => panic!("expected InvalidTransition, got {other}"),
    }

    // The failed action consumed nothing: the job is unmoved and the token
    // still resolves.
    let reread = service.get_job(job.id, workshop).await.unwrap();
    assert_eq!(reread.status, JobStatus::Estimated);
    assert!(service.get_job_by_token(&token).await.is_ok());
}

#[tokio::test]
async fn reissue_overwrites_the_previous_token() {
    let (service, _storage) = service();
    let workshop = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let job = service.create_job(workshop, intake(), actor).await.unwrap();
    advance(&service, &job, actor, JobStatus::CustomerApproval).await;

    let first = service
        .issue_approval_token(job.id, workshop, in_one_day(), actor)
        .await
        .unwrap();
    let second = service
        .issue_approval_token(job.id, workshop, in_one_day(), actor)
        .await
        .unwrap();
    assert_ne!(first, second);

    assert!(matches!(
        service.get_job_by_token(&first).await,
        Err(ServiceError::NotFound)
    ));
    assert_eq!(
        service.get_job_by_token(&second).await.unwrap().id,
        job.id
    );
}

#[tokio::test]
async fn issuance_is_tenant_guarded() {
    let (service, _storage) = service();
    let workshop = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let job = service.create_job(workshop, intake(), actor).await.unwrap();

    assert!(matches!(
        service
            .issue_approval_token(job.id, Uuid::new_v4(), in_one_day(), actor)
            .await,
        Err(ServiceError::NotFound)
    ));
}
