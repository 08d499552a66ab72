//! The per-mailbox reconciliation loop.
//!
//! Mailboxes are processed strictly one after another: evaluate, write the
//! full target state when anything differs, wait out the throttle, then
//! re-read and re-evaluate. Every mailbox ends in exactly one outcome and
//! nothing a single mailbox does can stop the run.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::compliance::{evaluate, FieldDiff};
use crate::error::PreconditionError;
use crate::mailbox::{MailboxRecord, AUDIT_FIELDS, DEFAULT_RECIPIENT_TYPES};
use crate::policy::TargetPolicy;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::remote::AuditService;
use crate::summary::{ApplyOutcome, FailureCause, ResultAggregator, RunSummary};

/// Run-level settings that do not belong to the policy itself.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Pause after each accepted write.
    pub throttle: Duration,
    /// Recipient types requested from the bulk fetch.
    pub recipient_types: Vec<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            throttle: Duration::ZERO,
            recipient_types: DEFAULT_RECIPIENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

pub struct Reconciler<'a> {
    service: &'a dyn AuditService,
    target: Arc<TargetPolicy>,
    throttle: Duration,
}

impl<'a> Reconciler<'a> {
    pub fn new(service: &'a dyn AuditService, target: Arc<TargetPolicy>, throttle: Duration) -> Self {
        Self {
            service,
            target,
            throttle,
        }
    }

    pub fn target(&self) -> &TargetPolicy {
        &self.target
    }

    /// Reconciles every record in the order given and returns the summary.
    pub async fn run(&self, records: &[MailboxRecord], progress: &dyn ProgressReporter) -> RunSummary {
        let mut aggregator = ResultAggregator::new();
        let run_id = aggregator.run_id();

        progress.report(ProgressEvent::Started {
            total: records.len(),
        });

        for mailbox in records {
            let span = info_span!("mailbox",
                run_id = %run_id,
                identity = mailbox.identity.as_deref().unwrap_or("-"),
                label = mailbox.label(),
            );
            let (outcome, diffs) = self.process(mailbox, progress).instrument(span).await;

            aggregator.record(mailbox, &outcome, &diffs);
            progress.report(ProgressEvent::Outcome {
                identity: mailbox.identity.clone(),
                display_name: mailbox.display_name.clone(),
                outcome,
                diffs,
            });
        }

        let summary = aggregator.finish();
        progress.report(ProgressEvent::Finished {
            succeeded: summary.succeeded,
            skipped: summary.skipped,
            failed: summary.failed,
        });
        summary
    }

    async fn process(
        &self,
        mailbox: &MailboxRecord,
        progress: &dyn ProgressReporter,
    ) -> (ApplyOutcome, Vec<FieldDiff>) {
        let Some(identity) = mailbox.identity.as_deref() else {
            return (ApplyOutcome::failed(FailureCause::MissingIdentity), Vec::new());
        };
        if let Some(error) = &mailbox.decode_error {
            return (
                ApplyOutcome::failed(FailureCause::Unexpected(format!(
                    "undecodable mailbox record: {}",
                    error
                ))),
                Vec::new(),
            );
        }

        match AssertUnwindSafe(self.reconcile_mailbox(identity, mailbox, progress))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!("Processing panicked: {}", message);
                (
                    ApplyOutcome::failed(FailureCause::Unexpected(format!("panic: {}", message))),
                    Vec::new(),
                )
            }
        }
    }

    async fn reconcile_mailbox(
        &self,
        identity: &str,
        mailbox: &MailboxRecord,
        progress: &dyn ProgressReporter,
    ) -> (ApplyOutcome, Vec<FieldDiff>) {
        let compliance = evaluate(mailbox, &self.target);
        if compliance.is_compliant() {
            debug!("Already compliant");
            return (ApplyOutcome::Skipped, Vec::new());
        }
        let diffs = compliance.diffs;
        debug!("{} field(s) differ", diffs.len());

        if let Err(e) = self.service.update(identity, &self.target).await {
            debug!("Write rejected: {}", e);
            return (
                ApplyOutcome::failed(FailureCause::ApplyError(e.to_string())),
                diffs,
            );
        }

        if !self.throttle.is_zero() {
            tokio::time::sleep(self.throttle).await;
        }

        let refreshed = match self.service.fetch(identity, AUDIT_FIELDS).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                debug!("Write accepted but verification read failed: {}", e);
                return (
                    ApplyOutcome::failed(FailureCause::Unexpected(format!(
                        "write accepted, verification read failed: {}",
                        e
                    ))),
                    diffs,
                );
            }
        };

        let recheck = evaluate(&refreshed, &self.target);
        if recheck.is_compliant() {
            (ApplyOutcome::Applied { verified: true }, diffs)
        } else {
            progress.report(ProgressEvent::VerificationMismatch {
                identity: identity.to_string(),
                remaining: recheck.diffs,
            });
            (ApplyOutcome::Applied { verified: false }, diffs)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Checks the org-level precondition and bulk-fetches every mailbox.
pub async fn fetch_tenant_state(
    service: &dyn AuditService,
    recipient_types: &[String],
) -> Result<Vec<MailboxRecord>, PreconditionError> {
    match service.check_org_audit_enabled().await {
        Ok(true) => {}
        Ok(false) => return Err(PreconditionError::OrgAuditDisabled),
        Err(e) => return Err(PreconditionError::OrgCheckFailed(e)),
    }

    let records = service
        .bulk_fetch(recipient_types, AUDIT_FIELDS)
        .await
        .map_err(PreconditionError::BulkFetchFailed)?;

    info!("Retrieved {} mailboxes", records.len());
    Ok(records)
}

/// Full run: preconditions, bulk fetch, then the per-mailbox loop.
pub async fn reconcile_tenant(
    service: &dyn AuditService,
    target: Arc<TargetPolicy>,
    options: &RunOptions,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary, PreconditionError> {
    let unknown = target.unknown_actions();
    if !unknown.is_empty() {
        let names: Vec<&str> = unknown.iter().map(|action| action.as_str()).collect();
        warn!("Target policy names actions the service may reject: {}", names.join(", "));
    }

    let records = fetch_tenant_state(service, &options.recipient_types).await?;
    let reconciler = Reconciler::new(service, target, options.throttle);
    Ok(reconciler.run(&records, progress).await)
}
