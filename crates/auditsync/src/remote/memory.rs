//! In-memory tenant backed by a mailbox snapshot.
//!
//! Serves offline rehearsal runs (`--snapshot`) and tests. Writes mutate the
//! in-memory state, so a second run over the same tenant sees the result of
//! the first. Individual mailboxes can be scripted to reject writes or to
//! accept them without the change becoming visible.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::{RemoteError, Result};
use super::AuditService;
use crate::mailbox::MailboxRecord;
use crate::policy::TargetPolicy;

/// Serialized tenant state: the org-level flag plus every mailbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSnapshot {
    #[serde(default = "default_true")]
    pub org_audit_enabled: bool,
    #[serde(default)]
    pub mailboxes: Vec<MailboxRecord>,
}

fn default_true() -> bool {
    true
}

/// Remote calls observed by an [`InMemoryTenant`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallLog {
    pub org_checks: usize,
    pub bulk_fetches: usize,
    /// Identities passed to `fetch`, in call order.
    pub fetches: Vec<String>,
    /// Identities passed to `update`, in call order.
    pub updates: Vec<String>,
}

impl CallLog {
    /// Total per-mailbox calls (fetches and updates).
    pub fn mailbox_calls(&self) -> usize {
        self.fetches.len() + self.updates.len()
    }
}

pub struct InMemoryTenant {
    org_audit_enabled: bool,
    mailboxes: Mutex<Vec<MailboxRecord>>,
    rejected: HashSet<String>,
    ignored: HashSet<String>,
    org_check_error: Option<String>,
    bulk_fetch_error: Option<String>,
    calls: Mutex<CallLog>,
}

impl InMemoryTenant {
    pub fn new(mailboxes: Vec<MailboxRecord>) -> Self {
        Self {
            org_audit_enabled: true,
            mailboxes: Mutex::new(mailboxes),
            rejected: HashSet::new(),
            ignored: HashSet::new(),
            org_check_error: None,
            bulk_fetch_error: None,
            calls: Mutex::new(CallLog::default()),
        }
    }

    pub fn from_snapshot(snapshot: TenantSnapshot) -> Self {
        let mut tenant = Self::new(snapshot.mailboxes);
        tenant.org_audit_enabled = snapshot.org_audit_enabled;
        tenant
    }

    /// Loads a JSON snapshot file.
    pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RemoteError::Snapshot(format!("{}: {}", path.display(), e)))?;
        let snapshot: TenantSnapshot = serde_json::from_str(&content)
            .map_err(|e| RemoteError::Snapshot(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Reports organization-level auditing as disabled.
    pub fn with_org_audit_disabled(mut self) -> Self {
        self.org_audit_enabled = false;
        self
    }

    /// Makes every write to `identity` fail.
    pub fn reject_updates_for(mut self, identity: &str) -> Self {
        self.rejected.insert(identity.to_lowercase());
        self
    }

    /// Accepts writes to `identity` without changing its visible state.
    pub fn ignore_updates_for(mut self, identity: &str) -> Self {
        self.ignored.insert(identity.to_lowercase());
        self
    }

    /// Makes the org-level audit check fail with `message`.
    pub fn fail_org_check(mut self, message: &str) -> Self {
        self.org_check_error = Some(message.to_string());
        self
    }

    /// Makes the bulk fetch fail with `message`.
    pub fn fail_bulk_fetch(mut self, message: &str) -> Self {
        self.bulk_fetch_error = Some(message.to_string());
        self
    }

    /// Returns a copy of the calls observed so far.
    pub fn calls(&self) -> CallLog {
        lock(&self.calls).clone()
    }

    /// Returns the current state of one mailbox.
    pub fn mailbox(&self, identity: &str) -> Option<MailboxRecord> {
        lock(&self.mailboxes)
            .iter()
            .find(|m| matches_identity(m, identity))
            .cloned()
    }

    /// Returns the current tenant state.
    pub fn snapshot(&self) -> TenantSnapshot {
        TenantSnapshot {
            org_audit_enabled: self.org_audit_enabled,
            mailboxes: lock(&self.mailboxes).clone(),
        }
    }
}

#[async_trait]
impl AuditService for InMemoryTenant {
    async fn check_org_audit_enabled(&self) -> Result<bool> {
        lock(&self.calls).org_checks += 1;
        if let Some(message) = &self.org_check_error {
            return Err(RemoteError::Status {
                command: "Get-OrganizationConfig".to_string(),
                status: 504,
                body: message.clone(),
            });
        }
        Ok(self.org_audit_enabled)
    }

    async fn bulk_fetch(
        &self,
        _recipient_types: &[String],
        _fields: &[&str],
    ) -> Result<Vec<MailboxRecord>> {
        lock(&self.calls).bulk_fetches += 1;
        if let Some(message) = &self.bulk_fetch_error {
            return Err(RemoteError::Status {
                command: "Get-EXOMailbox".to_string(),
                status: 503,
                body: message.clone(),
            });
        }
        Ok(lock(&self.mailboxes).clone())
    }

    async fn fetch(&self, identity: &str, _fields: &[&str]) -> Result<MailboxRecord> {
        lock(&self.calls).fetches.push(identity.to_string());
        self.mailbox(identity)
            .ok_or_else(|| RemoteError::NotFound(identity.to_string()))
    }

    async fn update(&self, identity: &str, policy: &TargetPolicy) -> Result<()> {
        lock(&self.calls).updates.push(identity.to_string());

        let key = identity.to_lowercase();
        if self.rejected.contains(&key) {
            return Err(RemoteError::Rejected {
                identity: identity.to_string(),
                message: "write refused by tenant".to_string(),
            });
        }

        let mut mailboxes = lock(&self.mailboxes);
        let mailbox = mailboxes
            .iter_mut()
            .find(|m| matches_identity(m, identity))
            .ok_or_else(|| RemoteError::NotFound(identity.to_string()))?;

        if !self.ignored.contains(&key) {
            mailbox.audit_enabled = Some(policy.audit_enabled());
            mailbox.age_limit = Some(policy.age_limit());
            mailbox.owner_actions = Some(policy.owner_actions().clone());
            mailbox.admin_actions = Some(policy.admin_actions().clone());
            mailbox.delegate_actions = Some(policy.delegate_actions().clone());
        }
        Ok(())
    }
}

fn matches_identity(mailbox: &MailboxRecord, identity: &str) -> bool {
    mailbox
        .identity
        .as_deref()
        .is_some_and(|id| id.eq_ignore_ascii_case(identity))
}

/// A poisoned lock only means another caller panicked mid-call; the data is
/// still a consistent snapshot for this fake.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
