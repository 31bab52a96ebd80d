//! Job card record, creation input, and the staff-mutable partial update.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::status::{JobStatus, Priority};

/// The central record tracking one vehicle's repair from intake to closure.
///
/// `status` and the stage timestamps are written only by the lifecycle
/// engine; every other mutable field changes only through [`JobPatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCard {
    pub id: Uuid,
    /// Owning workshop (tenant). All staff access is scoped by this id.
    pub workshop_id: Uuid,
    pub registration_number: String,
    pub vehicle_id: Option<Uuid>,

    pub status: JobStatus,
    pub priority: Priority,
    /// Customer-reported symptoms, in the order they were recorded.
    pub symptoms: Vec<String>,
    /// Opaque diagnosis payload attached by the diagnostic collaborator.
    /// The lifecycle engine inspects presence only.
    pub diagnosis: Option<serde_json::Value>,
    /// Opaque estimate payload attached by the estimating collaborator.
    pub estimate: Option<serde_json::Value>,

    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub assigned_technician_id: Option<Uuid>,
    /// Last staff actor to mutate the record. None when the most recent
    /// mutation was token-authenticated.
    pub updated_by: Option<Uuid>,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,

    // Stage timestamps. Set only by the lifecycle engine on stage entry;
    // once set they are never cleared, even if the job later re-enters an
    // earlier stage through the concern or reject branches.
    #[serde(with = "time::serde::rfc3339::option")]
    pub sent_for_approval_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub customer_approved_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub closed_at: Option<OffsetDateTime>,

    /// Opaque capability string for the customer approval link.
    /// At most one live token per job; consumed on use.
    pub approval_token: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub approval_expires_at: Option<OffsetDateTime>,

    /// Free text attached to the most recent transition.
    pub status_notes: Option<String>,
}

impl JobCard {
    /// Build a new job card in CREATED from intake input.
    pub fn create(workshop_id: Uuid, input: NewJob, now: OffsetDateTime) -> Self {
        JobCard {
            id: Uuid::new_v4(),
            workshop_id,
            registration_number: input.registration_number,
            vehicle_id: input.vehicle_id,
            status: JobStatus::Created,
            priority: input.priority.unwrap_or_default(),
            symptoms: input.symptoms,
            diagnosis: None,
            estimate: None,
            customer_phone: input.customer_phone,
            customer_email: input.customer_email,
            assigned_technician_id: input.assigned_technician_id,
            updated_by: None,
            created_at: now,
            updated_at: now,
            sent_for_approval_at: None,
            customer_approved_at: None,
            started_at: None,
            closed_at: None,
            approval_token: None,
            approval_expires_at: None,
            status_notes: None,
        }
    }

    /// Record the stage timestamp for entering `target`, if that stage
    /// carries one. Re-entry refreshes the stamp; nothing ever clears it.
    pub fn stamp_stage_entry(&mut self, target: JobStatus, now: OffsetDateTime) {
        match target {
            JobStatus::CustomerApproval => self.sent_for_approval_at = Some(now),
            JobStatus::InProgress => self.started_at = Some(now),
            JobStatus::Closed => self.closed_at = Some(now),
            _ => {}
        }
    }
}

/// Intake input for creating a job card.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewJob {
    pub registration_number: String,
    #[serde(default)]
    pub vehicle_id: Option<Uuid>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub assigned_technician_id: Option<Uuid>,
}

/// Partial update covering exactly the staff-mutable fields.
///
/// The field list is the allow-list: anything not present here cannot be
/// touched by the update path, so an illegal field is a compile error rather
/// than a silently dropped key. Status, stage timestamps, and token fields
/// deliberately have no counterpart in this struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobPatch {
    #[serde(default)]
    pub symptoms: Option<Vec<String>>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub assigned_technician_id: Option<Uuid>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status_notes: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<serde_json::Value>,
    #[serde(default)]
    pub estimate: Option<serde_json::Value>,
}

impl JobPatch {
    /// True when no field is populated.
    pub fn is_empty(&self) -> bool {
        self.symptoms.is_none()
            && self.customer_phone.is_none()
            && self.customer_email.is_none()
            && self.assigned_technician_id.is_none()
            && self.priority.is_none()
            && self.status_notes.is_none()
            && self.diagnosis.is_none()
            && self.estimate.is_none()
    }

    /// Apply the populated fields to `job`, returning the names of the
    /// fields that were written (for the audit snapshot).
    pub fn apply(&self, job: &mut JobCard) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if let Some(symptoms) = &self.symptoms {
            job.symptoms = symptoms.clone();
            changed.push("symptoms");
        }
        if let Some(phone) = &self.customer_phone {
            job.customer_phone = Some(phone.clone());
            changed.push("customer_phone");
        }
        if let Some(email) = &self.customer_email {
            job.customer_email = Some(email.clone());
            changed.push("customer_email");
        }
        if let Some(technician) = self.assigned_technician_id {
            job.assigned_technician_id = Some(technician);
            changed.push("assigned_technician_id");
        }
        if let Some(priority) = self.priority {
            job.priority = priority;
            changed.push("priority");
        }
        if let Some(notes) = &self.status_notes {
            job.status_notes = Some(notes.clone());
            changed.push("status_notes");
        }
        if let Some(diagnosis) = &self.diagnosis {
            job.diagnosis = Some(diagnosis.clone());
            changed.push("diagnosis");
        }
        if let Some(estimate) = &self.estimate {
            job.estimate = Some(estimate.clone());
            changed.push("estimate");
        }
        changed
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn make_job() -> JobCard {
        JobCard::create(
            Uuid::new_v4(),
            NewJob {
                registration_number: "KA-01-HH-1234".to_string(),
                ..NewJob::default()
            },
            datetime!(2025-06-01 09:00 UTC),
        )
    }

    #[test]
    fn create_starts_in_created_with_defaults() {
        let job = make_job();
        assert_eq!(job.status, JobStatus::Created);
        assert_eq!(job.priority, Priority::Normal);
        assert!(job.symptoms.is_empty());
        assert!(job.diagnosis.is_none());
        assert!(job.approval_token.is_none());
        assert_eq!(job.created_at, job.updated_at);
    }

    #[test]
    fn stage_stamps_only_for_stamped_stages() {
        let mut job = make_job();
        let now = datetime!(2025-06-02 10:00 UTC);

        job.stamp_stage_entry(JobStatus::Diagnosed, now);
        assert!(job.sent_for_approval_at.is_none());
        assert!(job.started_at.is_none());
        assert!(job.closed_at.is_none());

        job.stamp_stage_entry(JobStatus::CustomerApproval, now);
        assert_eq!(job.sent_for_approval_at, Some(now));

        job.stamp_stage_entry(JobStatus::InProgress, now);
        assert_eq!(job.started_at, Some(now));

        job.stamp_stage_entry(JobStatus::Closed, now);
        assert_eq!(job.closed_at, Some(now));
    }

    #[test]
    fn re_entry_refreshes_stamp_without_clearing_others() {
        let mut job = make_job();
        let first = datetime!(2025-06-02 10:00 UTC);
        let second = datetime!(2025-06-03 15:30 UTC);

        job.stamp_stage_entry(JobStatus::CustomerApproval, first);
        job.stamp_stage_entry(JobStatus::InProgress, first);
        // Concern branch sends the job back; a later re-entry refreshes the
        // approval stamp but started_at survives.
        job.stamp_stage_entry(JobStatus::CustomerApproval, second);

        assert_eq!(job.sent_for_approval_at, Some(second));
        assert_eq!(job.started_at, Some(first));
    }

    #[test]
    fn patch_applies_only_populated_fields() {
        let mut job = make_job();
        let patch = JobPatch {
            symptoms: Some(vec!["engine knock".to_string()]),
            priority: Some(Priority::High),
            ..JobPatch::default()
        };

        let changed = patch.apply(&mut job);
        assert_eq!(changed, vec!["symptoms", "priority"]);
        assert_eq!(job.symptoms, vec!["engine knock".to_string()]);
        assert_eq!(job.priority, Priority::High);
        assert!(job.customer_phone.is_none());
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(JobPatch::default().is_empty());
        let patch = JobPatch {
            diagnosis: Some(serde_json::json!({"fault": "worn pads"})),
            ..JobPatch::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn job_serialization_round_trips() {
        let mut job = make_job();
        job.diagnosis = Some(serde_json::json!({"fault": "worn pads"}));
        job.stamp_stage_entry(JobStatus::CustomerApproval, datetime!(2025-06-02 10:00 UTC));

        let json = serde_json::to_string(&job).unwrap();
        let parsed: JobCard = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, job);
    }
}
