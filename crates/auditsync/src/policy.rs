//! Target audit policy and the audit action vocabulary.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::timespan;

/// A mailbox audit action as named by the admin service.
///
/// Parsing is case-insensitive and always yields the canonical spelling.
/// Names the crate does not know are kept verbatim in `Other` so that
/// remote data introducing new actions still loads; they still compare
/// ignoring ASCII case. Known actions order before `Other` names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuditAction {
    AddFolderPermissions,
    ApplyRecord,
    AttachmentAccess,
    Copy,
    Create,
    FolderBind,
    HardDelete,
    MailboxLogin,
    MailItemsAccessed,
    MessageBind,
    ModifyFolderPermissions,
    Move,
    MoveToDeletedItems,
    PreservedMailItemProactively,
    RecordDelete,
    RemoveFolderPermissions,
    SearchQueryInitiated,
    Send,
    SendAs,
    SendOnBehalf,
    SoftDelete,
    Update,
    UpdateCalendarDelegation,
    UpdateComplianceTag,
    UpdateFolderPermissions,
    UpdateInboxRules,
    Other(String),
}

impl AuditAction {
    /// Returns every action with a canonical name.
    pub fn known() -> &'static [AuditAction] {
        use AuditAction::*;
        const KNOWN: &[AuditAction] = &[
            AddFolderPermissions,
            ApplyRecord,
            AttachmentAccess,
            Copy,
            Create,
            FolderBind,
            HardDelete,
            MailboxLogin,
            MailItemsAccessed,
            MessageBind,
            ModifyFolderPermissions,
            Move,
            MoveToDeletedItems,
            PreservedMailItemProactively,
            RecordDelete,
            RemoveFolderPermissions,
            SearchQueryInitiated,
            Send,
            SendAs,
            SendOnBehalf,
            SoftDelete,
            Update,
            UpdateCalendarDelegation,
            UpdateComplianceTag,
            UpdateFolderPermissions,
            UpdateInboxRules,
        ];
        KNOWN
    }

    pub fn as_str(&self) -> &str {
        use AuditAction::*;
        match self {
            AddFolderPermissions => "AddFolderPermissions",
            ApplyRecord => "ApplyRecord",
            AttachmentAccess => "AttachmentAccess",
            Copy => "Copy",
            Create => "Create",
            FolderBind => "FolderBind",
            HardDelete => "HardDelete",
            MailboxLogin => "MailboxLogin",
            MailItemsAccessed => "MailItemsAccessed",
            MessageBind => "MessageBind",
            ModifyFolderPermissions => "ModifyFolderPermissions",
            Move => "Move",
            MoveToDeletedItems => "MoveToDeletedItems",
            PreservedMailItemProactively => "PreservedMailItemProactively",
            RecordDelete => "RecordDelete",
            RemoveFolderPermissions => "RemoveFolderPermissions",
            SearchQueryInitiated => "SearchQueryInitiated",
            Send => "Send",
            SendAs => "SendAs",
            SendOnBehalf => "SendOnBehalf",
            SoftDelete => "SoftDelete",
            Update => "Update",
            UpdateCalendarDelegation => "UpdateCalendarDelegation",
            UpdateComplianceTag => "UpdateComplianceTag",
            UpdateFolderPermissions => "UpdateFolderPermissions",
            UpdateInboxRules => "UpdateInboxRules",
            Other(name) => name,
        }
    }

    /// Returns true if the action has a canonical name.
    pub fn is_known(&self) -> bool {
        !matches!(self, AuditAction::Other(_))
    }
}

fn lowercase_bytes(name: &str) -> impl Iterator<Item = u8> + '_ {
    name.bytes().map(|b| b.to_ascii_lowercase())
}

impl Ord for AuditAction {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .is_known()
            .cmp(&self.is_known())
            .then_with(|| lowercase_bytes(self.as_str()).cmp(lowercase_bytes(other.as_str())))
    }
}

impl PartialOrd for AuditAction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for AuditAction {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AuditAction {}

impl Hash for AuditAction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.is_known().hash(state);
        for byte in lowercase_bytes(self.as_str()) {
            byte.hash(state);
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for AuditAction {
    fn from(value: &str) -> Self {
        let name = value.trim();
        AuditAction::known()
            .iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(name))
            .cloned()
            .unwrap_or_else(|| AuditAction::Other(name.to_string()))
    }
}

impl From<String> for AuditAction {
    fn from(value: String) -> Self {
        AuditAction::from(value.as_str())
    }
}

impl From<AuditAction> for String {
    fn from(action: AuditAction) -> Self {
        action.as_str().to_string()
    }
}

impl std::str::FromStr for AuditAction {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(AuditAction::from(s))
    }
}

/// An unordered, duplicate-free set of audit actions.
pub type AuditActionSet = BTreeSet<AuditAction>;

/// Builds an action set from names; duplicates and casing collapse.
pub fn action_set<I, S>(names: I) -> AuditActionSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| AuditAction::from(name.as_ref()))
        .collect()
}

/// Default audit log retention.
pub const DEFAULT_AGE_LIMIT_DAYS: u32 = 90;

/// Owner actions audited by the service baseline.
pub const DEFAULT_OWNER_ACTIONS: &[&str] = &[
    "ApplyRecord",
    "Create",
    "HardDelete",
    "MailboxLogin",
    "MailItemsAccessed",
    "Move",
    "MoveToDeletedItems",
    "Send",
    "SearchQueryInitiated",
    "SoftDelete",
    "Update",
    "UpdateCalendarDelegation",
    "UpdateFolderPermissions",
    "UpdateInboxRules",
];

/// Admin actions audited by the service baseline.
pub const DEFAULT_ADMIN_ACTIONS: &[&str] = &[
    "ApplyRecord",
    "Copy",
    "Create",
    "FolderBind",
    "HardDelete",
    "MailItemsAccessed",
    "Move",
    "MoveToDeletedItems",
    "SendAs",
    "SendOnBehalf",
    "SoftDelete",
    "Update",
    "UpdateCalendarDelegation",
    "UpdateFolderPermissions",
    "UpdateInboxRules",
];

/// Delegate actions audited by the service baseline.
pub const DEFAULT_DELEGATE_ACTIONS: &[&str] = &[
    "ApplyRecord",
    "Create",
    "FolderBind",
    "HardDelete",
    "MailItemsAccessed",
    "Move",
    "MoveToDeletedItems",
    "SendAs",
    "SendOnBehalf",
    "SoftDelete",
    "Update",
    "UpdateFolderPermissions",
    "UpdateInboxRules",
];

/// The desired audit configuration applied tenant-wide.
///
/// Fields are private: a policy is built once and shared read-only for the
/// whole run. Auditing is always required to be enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPolicy {
    audit_enabled: bool,
    age_limit: Duration,
    owner_actions: AuditActionSet,
    admin_actions: AuditActionSet,
    delegate_actions: AuditActionSet,
}

impl TargetPolicy {
    pub fn new(
        age_limit: Duration,
        owner_actions: AuditActionSet,
        admin_actions: AuditActionSet,
        delegate_actions: AuditActionSet,
    ) -> Self {
        Self {
            audit_enabled: true,
            age_limit,
            owner_actions,
            admin_actions,
            delegate_actions,
        }
    }

    pub fn audit_enabled(&self) -> bool {
        self.audit_enabled
    }

    pub fn age_limit(&self) -> Duration {
        self.age_limit
    }

    pub fn owner_actions(&self) -> &AuditActionSet {
        &self.owner_actions
    }

    pub fn admin_actions(&self) -> &AuditActionSet {
        &self.admin_actions
    }

    pub fn delegate_actions(&self) -> &AuditActionSet {
        &self.delegate_actions
    }

    /// Returns actions the service would not recognize, across all three sets.
    pub fn unknown_actions(&self) -> Vec<&AuditAction> {
        self.owner_actions
            .iter()
            .chain(&self.admin_actions)
            .chain(&self.delegate_actions)
            .filter(|action| !action.is_known())
            .collect()
    }
}

impl Default for TargetPolicy {
    fn default() -> Self {
        Self::new(
            timespan::from_days(DEFAULT_AGE_LIMIT_DAYS),
            action_set(DEFAULT_OWNER_ACTIONS),
            action_set(DEFAULT_ADMIN_ACTIONS),
            action_set(DEFAULT_DELEGATE_ACTIONS),
        )
    }
}
