//! Per-mailbox outcomes and run-level aggregation.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::compliance::FieldDiff;
use crate::mailbox::MailboxRecord;

/// Why a mailbox could not be brought into compliance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "camelCase")]
pub enum FailureCause {
    /// The bulk fetch returned the mailbox without a primary address.
    MissingIdentity,
    /// The service rejected the write.
    ApplyError(String),
    /// Anything else that went wrong while processing the mailbox.
    Unexpected(String),
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCause::MissingIdentity => write!(f, "mailbox has no primary address"),
            FailureCause::ApplyError(message) => write!(f, "apply failed: {}", message),
            FailureCause::Unexpected(message) => write!(f, "unexpected error: {}", message),
        }
    }
}

/// Outcome of reconciling one mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ApplyOutcome {
    Skipped,
    Applied { verified: bool },
    Failed { cause: FailureCause },
}

impl ApplyOutcome {
    pub fn failed(cause: FailureCause) -> Self {
        ApplyOutcome::Failed { cause }
    }
}

/// Changes written to one mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub identity: String,
    pub display_name: String,
    pub diffs: Vec<FieldDiff>,
}

/// A mailbox that ended the run as failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub identity: Option<String>,
    pub display_name: String,
    pub cause: FailureCause,
}

/// Aggregated result of one reconciliation run.
///
/// Invariant once finished: `total == succeeded + skipped + failed`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub change_records: Vec<ChangeRecord>,
    /// Identities written but not yet showing the target state on re-read.
    pub unverified: Vec<String>,
    pub failures: Vec<FailureRecord>,
}

impl RunSummary {
    /// True when nothing failed and every write was verified.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.unverified.is_empty()
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Accumulates outcomes as the reconciler runs.
///
/// Exactly one of `succeeded`, `skipped` or `failed` is incremented per
/// recorded mailbox.
pub struct ResultAggregator {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    clock: Instant,
    total: usize,
    succeeded: usize,
    skipped: usize,
    failed: usize,
    change_records: Vec<ChangeRecord>,
    unverified: Vec<String>,
    failures: Vec<FailureRecord>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            clock: Instant::now(),
            total: 0,
            succeeded: 0,
            skipped: 0,
            failed: 0,
            change_records: Vec::new(),
            unverified: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Records one mailbox outcome. `diffs` are the differences found before
    /// any write; they become the change record when the mailbox was applied.
    pub fn record(&mut self, mailbox: &MailboxRecord, outcome: &ApplyOutcome, diffs: &[FieldDiff]) {
        self.total += 1;

        match outcome {
            ApplyOutcome::Skipped => self.skipped += 1,
            ApplyOutcome::Applied { verified } => {
                self.succeeded += 1;
                let identity = mailbox.identity.clone().unwrap_or_default();
                if !verified {
                    self.unverified.push(identity.clone());
                }
                self.change_records.push(ChangeRecord {
                    identity,
                    display_name: mailbox.display_name.clone(),
                    diffs: diffs.to_vec(),
                });
            }
            ApplyOutcome::Failed { cause } => {
                self.failed += 1;
                self.failures.push(FailureRecord {
                    identity: mailbox.identity.clone(),
                    display_name: mailbox.display_name.clone(),
                    cause: cause.clone(),
                });
            }
        }
    }

    pub fn finish(self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            duration: self.clock.elapsed(),
            total: self.total,
            succeeded: self.succeeded,
            skipped: self.skipped,
            failed: self.failed,
            change_records: self.change_records,
            unverified: self.unverified,
            failures: self.failures,
        }
    }
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}
