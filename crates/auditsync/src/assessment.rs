//! Read-only compliance assessment.

use serde::Serialize;

use crate::compliance::{evaluate, FieldDiff};
use crate::mailbox::MailboxRecord;
use crate::policy::TargetPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonCompliantMailbox {
    pub identity: String,
    pub display_name: String,
    pub diffs: Vec<FieldDiff>,
}

/// A mailbox whose record the service returned in an unreadable shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndecodableMailbox {
    pub identity: String,
    pub display_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentReport {
    pub total: usize,
    pub compliant: usize,
    pub non_compliant: usize,
    pub missing_identity: usize,
    pub mailboxes: Vec<NonCompliantMailbox>,
    pub undecodable: Vec<UndecodableMailbox>,
}

impl AssessmentReport {
    /// True when every mailbox has an identity, could be read, and matches
    /// the policy.
    pub fn is_compliant(&self) -> bool {
        self.non_compliant == 0 && self.missing_identity == 0 && self.undecodable.is_empty()
    }
}

/// Evaluates every record without touching the tenant.
pub fn assess(records: &[MailboxRecord], target: &TargetPolicy) -> AssessmentReport {
    let mut report = AssessmentReport {
        total: records.len(),
        ..AssessmentReport::default()
    };

    for mailbox in records {
        let Some(identity) = mailbox.identity.as_deref() else {
            report.missing_identity += 1;
            continue;
        };
        if let Some(error) = &mailbox.decode_error {
            report.undecodable.push(UndecodableMailbox {
                identity: identity.to_string(),
                display_name: mailbox.display_name.clone(),
                error: error.clone(),
            });
            continue;
        }

        let result = evaluate(mailbox, target);
        if result.is_compliant() {
            report.compliant += 1;
        } else {
            report.non_compliant += 1;
            report.mailboxes.push(NonCompliantMailbox {
                identity: identity.to_string(),
                display_name: mailbox.display_name.clone(),
                diffs: result.diffs,
            });
        }
    }

    report
}
