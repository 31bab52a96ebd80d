//! Job lifecycle states and the legal transition table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The eleven states of the job card lifecycle.
///
/// The mainline flow is CREATED → CONTEXT_VERIFIED → DIAGNOSED → ESTIMATED →
/// CUSTOMER_APPROVAL → IN_PROGRESS → PDI → INVOICED → CLOSED. From
/// CUSTOMER_APPROVAL the customer can divert the job: raising a concern moves
/// it to CONCERN_RAISED (then back to ESTIMATED for a revised quote, or out to
/// CANCELLED), and rejecting the estimate sends it back to CREATED.
///
/// CLOSED and CANCELLED are terminal; jobs in those states are retained for
/// audit and never hard-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Created,
    ContextVerified,
    Diagnosed,
    Estimated,
    CustomerApproval,
    InProgress,
    Pdi,
    Invoiced,
    Closed,
    ConcernRaised,
    Cancelled,
}

impl JobStatus {
    /// Every lifecycle state, in mainline order with the branch states last.
    pub const ALL: [JobStatus; 11] = [
        JobStatus::Created,
        JobStatus::ContextVerified,
        JobStatus::Diagnosed,
        JobStatus::Estimated,
        JobStatus::CustomerApproval,
        JobStatus::InProgress,
        JobStatus::Pdi,
        JobStatus::Invoiced,
        JobStatus::Closed,
        JobStatus::ConcernRaised,
        JobStatus::Cancelled,
    ];

    /// Legal transition targets from this state.
    ///
    /// Terminal states return an empty slice. Every status write in the
    /// system is validated against this table; there is no other path.
    pub fn allowed_targets(self) -> &'static [JobStatus] {
        use JobStatus::*;
        match self {
            Created => &[ContextVerified],
            ContextVerified => &[Diagnosed],
            Diagnosed => &[Estimated],
            Estimated => &[CustomerApproval],
            CustomerApproval => &[InProgress, ConcernRaised, Created],
            ConcernRaised => &[Estimated, Cancelled],
            InProgress => &[Pdi],
            Pdi => &[Invoiced],
            Invoiced => &[Closed],
            Closed | Cancelled => &[],
        }
    }

    /// Whether `target` is reachable from this state in one transition.
    pub fn can_transition_to(self, target: JobStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// CLOSED and CANCELLED accept no further transitions.
    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Canonical wire string, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Created => "CREATED",
            JobStatus::ContextVerified => "CONTEXT_VERIFIED",
            JobStatus::Diagnosed => "DIAGNOSED",
            JobStatus::Estimated => "ESTIMATED",
            JobStatus::CustomerApproval => "CUSTOMER_APPROVAL",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Pdi => "PDI",
            JobStatus::Invoiced => "INVOICED",
            JobStatus::Closed => "CLOSED",
            JobStatus::ConcernRaised => "CONCERN_RAISED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a status string that names no known lifecycle state.
///
/// Raised at storage and transport boundaries so an unknown value is rejected
/// at deserialization, not at first use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError(pub String);

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown job status: '{}'", self.0)
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for JobStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// Scheduling priority of a job card.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Normal => "NORMAL",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_targets() {
        assert!(JobStatus::Closed.allowed_targets().is_empty());
        assert!(JobStatus::Cancelled.allowed_targets().is_empty());
        assert!(JobStatus::Closed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn non_terminal_states_have_targets() {
        for status in JobStatus::ALL {
            if status != JobStatus::Closed && status != JobStatus::Cancelled {
                assert!(
                    !status.allowed_targets().is_empty(),
                    "{status} should have at least one target"
                );
                assert!(!status.is_terminal());
            }
        }
    }

    #[test]
    fn mainline_flow_is_reachable() {
        let mainline = [
            JobStatus::Created,
            JobStatus::ContextVerified,
            JobStatus::Diagnosed,
            JobStatus::Estimated,
            JobStatus::CustomerApproval,
            JobStatus::InProgress,
            JobStatus::Pdi,
            JobStatus::Invoiced,
            JobStatus::Closed,
        ];
        for pair in mainline.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn approval_branch_targets() {
        assert_eq!(
            JobStatus::CustomerApproval.allowed_targets(),
            &[
                JobStatus::InProgress,
                JobStatus::ConcernRaised,
                JobStatus::Created
            ]
        );
        assert_eq!(
            JobStatus::ConcernRaised.allowed_targets(),
            &[JobStatus::Estimated, JobStatus::Cancelled]
        );
    }

    #[test]
    fn no_skipping_stages() {
        assert!(!JobStatus::Created.can_transition_to(JobStatus::Diagnosed));
        assert!(!JobStatus::Created.can_transition_to(JobStatus::Closed));
        assert!(!JobStatus::Diagnosed.can_transition_to(JobStatus::CustomerApproval));
        assert!(!JobStatus::InProgress.can_transition_to(JobStatus::Invoiced));
    }

    #[test]
    fn every_target_is_a_known_state() {
        for status in JobStatus::ALL {
            for target in status.allowed_targets() {
                assert!(JobStatus::ALL.contains(target));
            }
        }
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for status in JobStatus::ALL {
            let parsed: JobStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn unknown_status_string_is_rejected() {
        let err = "ARCHIVED".parse::<JobStatus>().unwrap_err();
        assert_eq!(err, ParseStatusError("ARCHIVED".to_string()));
    }

    #[test]
    fn serde_uses_wire_strings() {
        let json = serde_json::to_string(&JobStatus::CustomerApproval).unwrap();
        assert_eq!(json, "\"CUSTOMER_APPROVAL\"");
        let parsed: JobStatus = serde_json::from_str("\"PDI\"").unwrap();
        assert_eq!(parsed, JobStatus::Pdi);
        assert!(serde_json::from_str::<JobStatus>("\"ARCHIVED\"").is_err());
    }

    #[test]
    fn priority_defaults_to_normal() {
        assert_eq!(Priority::default(), Priority::Normal);
        assert_eq!(Priority::Critical.to_string(), "CRITICAL");
    }
}
