//! Compliance evaluation of one mailbox against the target policy.
//!
//! Pure and side-effect free: the reconciler and the read-only assessment
//! both call [`evaluate`], and tests exercise it without any remote endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mailbox::MailboxRecord;
use crate::policy::{AuditActionSet, TargetPolicy};
use crate::timespan;

/// The audit properties tracked for compliance, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditField {
    Enabled,
    AgeLimit,
    Owner,
    Admin,
    Delegate,
}

impl AuditField {
    pub fn all() -> &'static [AuditField] {
        &[
            AuditField::Enabled,
            AuditField::AgeLimit,
            AuditField::Owner,
            AuditField::Admin,
            AuditField::Delegate,
        ]
    }

    /// The service property backing this field.
    pub fn property(&self) -> &'static str {
        match self {
            AuditField::Enabled => "AuditEnabled",
            AuditField::AgeLimit => "AuditLogAgeLimit",
            AuditField::Owner => "AuditOwner",
            AuditField::Admin => "AuditAdmin",
            AuditField::Delegate => "AuditDelegate",
        }
    }
}

impl std::fmt::Display for AuditField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditField::Enabled => write!(f, "Enabled"),
            AuditField::AgeLimit => write!(f, "AgeLimit"),
            AuditField::Owner => write!(f, "Owner"),
            AuditField::Admin => write!(f, "Admin"),
            AuditField::Delegate => write!(f, "Delegate"),
        }
    }
}

/// One non-compliant field with its current and desired values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDiff {
    pub field: AuditField,
    pub current: String,
    pub target: String,
}

impl std::fmt::Display for FieldDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.current, self.target)
    }
}

/// Result of evaluating one mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComplianceResult {
    pub diffs: Vec<FieldDiff>,
}

impl ComplianceResult {
    /// Compliant iff no field differs.
    pub fn is_compliant(&self) -> bool {
        self.diffs.is_empty()
    }
}

/// Evaluates every tracked field; diffs accumulate without short-circuit.
///
/// Action sets are checked only when the mailbox reports them: an absent set
/// never counts as different, a present set (including an empty one) must
/// equal the target set.
pub fn evaluate(current: &MailboxRecord, target: &TargetPolicy) -> ComplianceResult {
    let mut diffs = Vec::new();

    if current.audit_enabled != Some(target.audit_enabled()) {
        diffs.push(FieldDiff {
            field: AuditField::Enabled,
            current: describe_flag(current.audit_enabled),
            target: describe_flag(Some(target.audit_enabled())),
        });
    }

    if current.age_limit != Some(target.age_limit()) {
        diffs.push(FieldDiff {
            field: AuditField::AgeLimit,
            current: describe_age_limit(current.age_limit),
            target: describe_age_limit(Some(target.age_limit())),
        });
    }

    check_actions(
        &mut diffs,
        AuditField::Owner,
        current.owner_actions.as_ref(),
        target.owner_actions(),
    );
    check_actions(
        &mut diffs,
        AuditField::Admin,
        current.admin_actions.as_ref(),
        target.admin_actions(),
    );
    check_actions(
        &mut diffs,
        AuditField::Delegate,
        current.delegate_actions.as_ref(),
        target.delegate_actions(),
    );

    ComplianceResult { diffs }
}

fn check_actions(
    diffs: &mut Vec<FieldDiff>,
    field: AuditField,
    current: Option<&AuditActionSet>,
    target: &AuditActionSet,
) {
    if let Some(actions) = current {
        if actions != target {
            diffs.push(FieldDiff {
                field,
                current: describe_actions(actions),
                target: describe_actions(target),
            });
        }
    }
}

const NOT_SET: &str = "(not set)";

fn describe_flag(value: Option<bool>) -> String {
    match value {
        Some(true) => "True".to_string(),
        Some(false) => "False".to_string(),
        None => NOT_SET.to_string(),
    }
}

fn describe_age_limit(value: Option<Duration>) -> String {
    value.map(timespan::format).unwrap_or_else(|| NOT_SET.to_string())
}

fn describe_actions(actions: &AuditActionSet) -> String {
    if actions.is_empty() {
        return "(none)".to_string();
    }
    actions
        .iter()
        .map(|action| action.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
