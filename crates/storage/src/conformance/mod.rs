//! Conformance test suite for [`JobStorage`] implementations.
//!
//! A backend-agnostic suite any `JobStorage` backend can run to verify the
//! contract the lifecycle engine depends on:
//!
//! - **Initialization**: job insertion, duplicate detection
//! - **Snapshot isolation**: uncommitted writes invisible, aborted writes
//!   discarded
//! - **Atomic commit**: all-or-nothing semantics for multi-record snapshots
//! - **Version validation / OCC**: stale-version conflict detection
//! - **Ledger coupling**: history and audit appends land with the job write
//!   they describe
//! - **Concurrency**: real `tokio::spawn` races with exactly one winner
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory that creates
//! a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use camber_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_storage().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod commit;
mod concurrent;
mod init;
mod ledger;
mod snapshot;
mod version;

use std::fmt;
use std::future::Future;

use time::macros::datetime;
use time::OffsetDateTime;
use uuid::Uuid;

use camber_core::{JobCard, JobStatus, NewJob};

use crate::record::{AuditEntry, HistoryEntry};
use crate::JobStorage;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "init", "snapshot", "commit").
    pub category: String,
    /// Test name (e.g. "insert_creates_job_at_version_0").
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` is called once per test to create a fresh, empty storage
/// instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: JobStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(init::run_init_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(commit::run_commit_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(ledger::run_ledger_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

fn fixed_instant() -> OffsetDateTime {
    datetime!(2025-06-01 09:00 UTC)
}

fn make_job(workshop_id: Uuid) -> JobCard {
    JobCard::create(
        workshop_id,
        NewJob {
            registration_number: "KA-01-HH-1234".to_string(),
            symptoms: vec!["rattle at idle".to_string()],
            ..NewJob::default()
        },
        fixed_instant(),
    )
}

fn make_history(job_id: Uuid, previous: JobStatus, new: JobStatus) -> HistoryEntry {
    HistoryEntry {
        id: Uuid::new_v4(),
        job_id,
        previous_status: previous,
        new_status: new,
        actor_id: Some(Uuid::new_v4()),
        recorded_at: fixed_instant(),
        notes: None,
    }
}

fn make_audit(workshop_id: Uuid, entity_id: Uuid, action: &str) -> AuditEntry {
    AuditEntry {
        id: Uuid::new_v4(),
        workshop_id,
        actor_id: Some(Uuid::new_v4()),
        action: action.to_string(),
        entity_type: "job".to_string(),
        entity_id,
        old_values: None,
        new_values: Some(serde_json::json!({"status": "CONTEXT_VERIFIED"})),
        recorded_at: fixed_instant(),
    }
}
