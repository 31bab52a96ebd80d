//! Tenant guard.
//!
//! Staff operations carry an explicit workshop id from the caller's session;
//! the guard compares it to the loaded job's owner. Mismatch and absence are
//! indistinguishable to the caller — both read as [`ServiceError::NotFound`]
//! — so the existence of another workshop's records never leaks.
//!
//! Token-authenticated customer actions bypass this guard by design: the
//! token is the capability, and it names exactly one job.

use uuid::Uuid;

use camber_core::JobCard;

use crate::error::ServiceError;

/// Fail closed unless `workshop_id` owns the job.
pub(crate) fn ensure_owner(job: &JobCard, workshop_id: Uuid) -> Result<(), ServiceError> {
    if job.workshop_id != workshop_id {
        return Err(ServiceError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camber_core::NewJob;
    use time::macros::datetime;

    #[test]
    fn owner_passes_other_tenant_reads_as_not_found() {
        let owner = Uuid::new_v4();
        let job = JobCard::create(
            owner,
            NewJob {
                registration_number: "KA-01-HH-1234".to_string(),
                ..NewJob::default()
            },
            datetime!(2025-06-01 09:00 UTC),
        );

        assert!(ensure_owner(&job, owner).is_ok());
        assert!(matches!(
            ensure_owner(&job, Uuid::new_v4()),
            Err(ServiceError::NotFound)
        ));
    }
}
