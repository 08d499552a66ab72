//! Builders for mailbox records and target policies.

#![allow(dead_code)]

use auditsync::policy::{action_set, AuditActionSet, TargetPolicy};
use auditsync::timespan;
use auditsync::MailboxRecord;

/// Builder for `MailboxRecord` instances.
///
/// Starts with every audit property absent, which the service reports for
/// mailboxes it returned without audit data.
pub struct MailboxBuilder {
    record: MailboxRecord,
}

impl MailboxBuilder {
    pub fn new(identity: &str) -> Self {
        let display_name = identity.split('@').next().unwrap_or(identity).to_string();
        Self {
            record: MailboxRecord::new(identity, display_name),
        }
    }

    /// A record with no primary address.
    pub fn without_identity(display_name: &str) -> Self {
        Self {
            record: MailboxRecord {
                identity: None,
                display_name: display_name.to_string(),
                ..MailboxRecord::default()
            },
        }
    }

    /// Copies every audit property from `policy`.
    pub fn compliant_with(mut self, policy: &TargetPolicy) -> Self {
        self.record.audit_enabled = Some(policy.audit_enabled());
        self.record.age_limit = Some(policy.age_limit());
        self.record.owner_actions = Some(policy.owner_actions().clone());
        self.record.admin_actions = Some(policy.admin_actions().clone());
        self.record.delegate_actions = Some(policy.delegate_actions().clone());
        self
    }

    pub fn display_name(mut self, name: &str) -> Self {
        self.record.display_name = name.to_string();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.record.audit_enabled = Some(enabled);
        self
    }

    pub fn age_limit_days(mut self, days: u32) -> Self {
        self.record.age_limit = Some(timespan::from_days(days));
        self
    }

    pub fn owner(mut self, actions: &[&str]) -> Self {
        self.record.owner_actions = Some(action_set(actions));
        self
    }

    pub fn admin(mut self, actions: &[&str]) -> Self {
        self.record.admin_actions = Some(action_set(actions));
        self
    }

    pub fn delegate(mut self, actions: &[&str]) -> Self {
        self.record.delegate_actions = Some(action_set(actions));
        self
    }

    /// Marks all three action sets as present but empty.
    pub fn empty_action_sets(mut self) -> Self {
        self.record.owner_actions = Some(AuditActionSet::new());
        self.record.admin_actions = Some(AuditActionSet::new());
        self.record.delegate_actions = Some(AuditActionSet::new());
        self
    }

    pub fn build(self) -> MailboxRecord {
        self.record
    }
}

/// Builder for `TargetPolicy` instances, starting from a small fixed policy
/// so assertions can spell out the expected sets.
pub struct PolicyBuilder {
    age_limit_days: u32,
    owner: Vec<&'static str>,
    admin: Vec<&'static str>,
    delegate: Vec<&'static str>,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        Self {
            age_limit_days: 90,
            owner: vec!["MailboxLogin", "Update"],
            admin: vec!["Copy", "SendAs"],
            delegate: vec!["SendOnBehalf"],
        }
    }

    pub fn age_limit_days(mut self, days: u32) -> Self {
        self.age_limit_days = days;
        self
    }

    pub fn owner(mut self, actions: &[&'static str]) -> Self {
        self.owner = actions.to_vec();
        self
    }

    pub fn build(self) -> TargetPolicy {
        TargetPolicy::new(
            timespan::from_days(self.age_limit_days),
            action_set(&self.owner),
            action_set(&self.admin),
            action_set(&self.delegate),
        )
    }
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
