//! Per-target requirement checks.
//!
//! A requirement is a precondition on the job's current field values that
//! must hold before a specific target state is entered, independent of the
//! transition table itself. Checks read the loaded snapshot only, so the
//! table check and the requirement check always see the same state.

use serde::{Deserialize, Serialize};

use crate::job::JobCard;
use crate::status::JobStatus;

/// A single unmet precondition for a requested transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmetRequirement {
    /// The job field the requirement reads.
    pub field: String,
    pub message: String,
}

impl UnmetRequirement {
    fn new(field: &str, message: impl Into<String>) -> Self {
        UnmetRequirement {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Evaluate the field-level prerequisites for entering `target`.
///
/// Every failing requirement is collected — callers report the full set,
/// never just the first. An empty result means the requirements are met;
/// it says nothing about the transition table.
pub fn unmet_requirements(job: &JobCard, target: JobStatus) -> Vec<UnmetRequirement> {
    let mut unmet = Vec::new();
    match target {
        JobStatus::ContextVerified => {
            if job.registration_number.trim().is_empty() {
                unmet.push(UnmetRequirement::new(
                    "registration_number",
                    "a vehicle registration number must be recorded before context verification",
                ));
            }
        }
        JobStatus::Diagnosed => {
            if job.symptoms.is_empty() {
                unmet.push(UnmetRequirement::new(
                    "symptoms",
                    "at least one symptom must be recorded before diagnosis",
                ));
            }
        }
        JobStatus::Estimated => {
            if job.diagnosis.is_none() {
                unmet.push(UnmetRequirement::new(
                    "diagnosis",
                    "a diagnosis must be attached before estimating",
                ));
            }
        }
        // The status checks below re-assert the source state against the
        // same snapshot the table check used, so a transition can never be
        // applied against a state that changed between validation steps.
        JobStatus::InProgress => {
            if job.status != JobStatus::CustomerApproval {
                unmet.push(UnmetRequirement::new(
                    "status",
                    format!(
                        "work can only start from CUSTOMER_APPROVAL, job is {}",
                        job.status
                    ),
                ));
            }
        }
        JobStatus::Pdi => {
            if job.status != JobStatus::InProgress {
                unmet.push(UnmetRequirement::new(
                    "status",
                    format!(
                        "pre-delivery inspection requires IN_PROGRESS, job is {}",
                        job.status
                    ),
                ));
            }
        }
        _ => {}
    }
    unmet
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::NewJob;
    use time::macros::datetime;
    use uuid::Uuid;

    fn job_with(registration: &str, symptoms: &[&str]) -> JobCard {
        JobCard::create(
            Uuid::new_v4(),
            NewJob {
                registration_number: registration.to_string(),
                symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
                ..NewJob::default()
            },
            datetime!(2025-06-01 09:00 UTC),
        )
    }

    #[test]
    fn context_verification_needs_registration() {
        let job = job_with("", &[]);
        let unmet = unmet_requirements(&job, JobStatus::ContextVerified);
        assert_eq!(unmet.len(), 1);
        assert_eq!(unmet[0].field, "registration_number");

        let job = job_with("KA-01-HH-1234", &[]);
        assert!(unmet_requirements(&job, JobStatus::ContextVerified).is_empty());
    }

    #[test]
    fn whitespace_registration_does_not_count() {
        let job = job_with("   ", &[]);
        assert_eq!(
            unmet_requirements(&job, JobStatus::ContextVerified).len(),
            1
        );
    }

    #[test]
    fn diagnosis_needs_a_symptom() {
        let job = job_with("KA-01-HH-1234", &[]);
        let unmet = unmet_requirements(&job, JobStatus::Diagnosed);
        assert_eq!(unmet.len(), 1);
        assert_eq!(unmet[0].field, "symptoms");

        let job = job_with("KA-01-HH-1234", &["rattle at idle"]);
        assert!(unmet_requirements(&job, JobStatus::Diagnosed).is_empty());
    }

    #[test]
    fn estimate_needs_a_diagnosis_payload() {
        let mut job = job_with("KA-01-HH-1234", &["rattle at idle"]);
        let unmet = unmet_requirements(&job, JobStatus::Estimated);
        assert_eq!(unmet.len(), 1);
        assert_eq!(unmet[0].field, "diagnosis");

        job.diagnosis = Some(serde_json::json!({"fault": "loose heat shield"}));
        assert!(unmet_requirements(&job, JobStatus::Estimated).is_empty());
    }

    #[test]
    fn work_start_reasserts_source_state() {
        let mut job = job_with("KA-01-HH-1234", &["rattle at idle"]);
        job.status = JobStatus::Estimated;
        let unmet = unmet_requirements(&job, JobStatus::InProgress);
        assert_eq!(unmet.len(), 1);
        assert_eq!(unmet[0].field, "status");
        assert!(unmet[0].message.contains("ESTIMATED"));

        job.status = JobStatus::CustomerApproval;
        assert!(unmet_requirements(&job, JobStatus::InProgress).is_empty());
    }

    #[test]
    fn pdi_reasserts_source_state() {
        let mut job = job_with("KA-01-HH-1234", &[]);
        job.status = JobStatus::InProgress;
        assert!(unmet_requirements(&job, JobStatus::Pdi).is_empty());

        job.status = JobStatus::CustomerApproval;
        assert_eq!(unmet_requirements(&job, JobStatus::Pdi).len(), 1);
    }

    #[test]
    fn unchecked_targets_have_no_requirements() {
        let job = job_with("", &[]);
        for target in [
            JobStatus::Created,
            JobStatus::CustomerApproval,
            JobStatus::Invoiced,
            JobStatus::Closed,
            JobStatus::ConcernRaised,
            JobStatus::Cancelled,
        ] {
            assert!(
                unmet_requirements(&job, target).is_empty(),
                "{target} should carry no field requirements"
            );
        }
    }
}
