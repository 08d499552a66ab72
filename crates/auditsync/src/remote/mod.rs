//! Remote collaborators consumed by the reconciliation core.
//!
//! The core talks to the tenant only through [`AuditService`]:
//! - [`exchange::ExchangeAdminClient`] calls the admin REST endpoint
//! - [`memory::InMemoryTenant`] serves a snapshot for tests and rehearsals

pub mod error;
pub mod exchange;
pub mod memory;

use async_trait::async_trait;

use crate::mailbox::MailboxRecord;
use crate::policy::TargetPolicy;

pub use error::{RemoteError, Result};
pub use exchange::ExchangeAdminClient;
pub use memory::{CallLog, InMemoryTenant, TenantSnapshot};

/// Narrow interface over the tenant's admin service.
#[async_trait]
pub trait AuditService: Send + Sync {
    /// Whether auditing is enabled at the organization level.
    async fn check_org_audit_enabled(&self) -> Result<bool>;

    /// Fetches the requested fields of every mailbox of the given recipient
    /// types, in the order the service returns them.
    async fn bulk_fetch(
        &self,
        recipient_types: &[String],
        fields: &[&str],
    ) -> Result<Vec<MailboxRecord>>;

    /// Fetches a single mailbox; used for post-write verification.
    async fn fetch(&self, identity: &str, fields: &[&str]) -> Result<MailboxRecord>;

    /// Writes the complete target state to one mailbox.
    async fn update(&self, identity: &str, policy: &TargetPolicy) -> Result<()>;
}
