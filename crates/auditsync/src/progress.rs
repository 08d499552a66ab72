use tracing::{info, warn};

use crate::compliance::FieldDiff;
use crate::summary::{ApplyOutcome, FailureCause};

/// Events emitted by the reconciler while it works through the tenant.
/// Each per-mailbox outcome is reported as soon as it is known.
pub enum ProgressEvent {
    Started {
        total: usize,
    },
    Outcome {
        identity: Option<String>,
        display_name: String,
        outcome: ApplyOutcome,
        diffs: Vec<FieldDiff>,
    },
    /// The write was accepted but a re-read still shows differences.
    VerificationMismatch {
        identity: String,
        remaining: Vec<FieldDiff>,
    },
    Finished {
        succeeded: usize,
        skipped: usize,
        failed: usize,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Emits every event as a structured tracing event.
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { total } => {
                info!(total, "Reconciling mailboxes");
            }
            ProgressEvent::Outcome {
                identity,
                display_name,
                outcome,
                diffs,
            } => {
                let identity = identity.as_deref().unwrap_or("(no identity)");
                match outcome {
                    ApplyOutcome::Skipped => {
                        info!(identity, display_name = %display_name, "Already compliant");
                    }
                    ApplyOutcome::Applied { verified } => {
                        let changes = diffs
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join("; ");
                        info!(identity, display_name = %display_name, verified, changes = %changes, "Applied audit policy");
                    }
                    ApplyOutcome::Failed { cause } => match cause {
                        FailureCause::MissingIdentity => {
                            warn!(display_name = %display_name, "Skipping mailbox without primary address");
                        }
                        other => {
                            warn!(identity, display_name = %display_name, error = %other, "Mailbox failed");
                        }
                    },
                }
            }
            ProgressEvent::VerificationMismatch {
                identity,
                remaining,
            } => {
                let fields = remaining
                    .iter()
                    .map(|d| d.field.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                warn!(identity = %identity, fields = %fields, "Write accepted but not yet visible; review manually");
            }
            ProgressEvent::Finished {
                succeeded,
                skipped,
                failed,
            } => {
                info!(succeeded, skipped, failed, "Reconciliation finished");
            }
        }
    }
}
