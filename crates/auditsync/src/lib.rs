pub mod assessment;
pub mod compliance;
pub mod config;
pub mod error;
pub mod mailbox;
pub mod policy;
pub mod progress;
pub mod reconciler;
pub mod remote;
pub mod report;
pub mod secrets;
pub mod summary;
pub mod timespan;

pub use assessment::{assess, AssessmentReport, UndecodableMailbox};
pub use compliance::{evaluate, AuditField, ComplianceResult, FieldDiff};
pub use config::{load_config, Config};
pub use error::{AuditSyncError, ConfigError, PreconditionError, Result};
pub use mailbox::{MailboxRecord, AUDIT_FIELDS};
pub use policy::{AuditAction, AuditActionSet, TargetPolicy};
pub use progress::{NoopProgress, ProgressEvent, ProgressReporter, TracingProgress};
pub use reconciler::{fetch_tenant_state, reconcile_tenant, Reconciler, RunOptions};
pub use remote::{AuditService, ExchangeAdminClient, InMemoryTenant, RemoteError};
pub use report::{render_assessment, render_summary, ReportFormat};
pub use secrets::{SecretError, SecretSource};
pub use summary::{ApplyOutcome, ChangeRecord, FailureCause, ResultAggregator, RunSummary};
