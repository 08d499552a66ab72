//! Mailbox audit state as returned by the admin service.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::policy::AuditActionSet;

/// Properties requested from the service for every mailbox.
pub const AUDIT_FIELDS: &[&str] = &[
    "PrimarySmtpAddress",
    "DisplayName",
    "AuditEnabled",
    "AuditLogAgeLimit",
    "AuditOwner",
    "AuditAdmin",
    "AuditDelegate",
];

/// Recipient types fetched when the configuration does not name any.
pub const DEFAULT_RECIPIENT_TYPES: &[&str] = &["UserMailbox", "SharedMailbox"];

/// Current audit state of one mailbox.
///
/// Field names on the wire follow the service's property names. Every audit
/// property is optional: the service omits or nulls properties it does not
/// return, and those gaps are meaningful to the compliance check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxRecord {
    /// Primary SMTP address. Blank values are treated as missing.
    #[serde(
        rename = "PrimarySmtpAddress",
        default,
        deserialize_with = "non_blank",
        skip_serializing_if = "Option::is_none"
    )]
    pub identity: Option<String>,

    #[serde(rename = "DisplayName", default, deserialize_with = "null_as_empty")]
    pub display_name: String,

    #[serde(rename = "AuditEnabled", default)]
    pub audit_enabled: Option<bool>,

    #[serde(rename = "AuditLogAgeLimit", default, with = "crate::timespan::option")]
    pub age_limit: Option<Duration>,

    #[serde(rename = "AuditOwner", default)]
    pub owner_actions: Option<AuditActionSet>,

    #[serde(rename = "AuditAdmin", default)]
    pub admin_actions: Option<AuditActionSet>,

    #[serde(rename = "AuditDelegate", default)]
    pub delegate_actions: Option<AuditActionSet>,

    /// Set when the service returned this record in a shape that could not
    /// be read. Such a record carries no audit state and is never written.
    #[serde(skip)]
    pub decode_error: Option<String>,
}

impl MailboxRecord {
    pub fn new(identity: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
            display_name: display_name.into(),
            ..Self::default()
        }
    }

    /// Decodes one record of a service response.
    ///
    /// A record that fails to decode is kept, with whatever address and
    /// display name can still be read, so that the failure is reported
    /// against that mailbox alone.
    pub fn from_value(value: Value) -> Self {
        match MailboxRecord::deserialize(&value) {
            Ok(record) => record,
            Err(e) => {
                let text = |key: &str| {
                    value
                        .get(key)
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                };
                Self {
                    identity: text("PrimarySmtpAddress"),
                    display_name: text("DisplayName").unwrap_or_default(),
                    decode_error: Some(e.to_string()),
                    ..Self::default()
                }
            }
        }
    }

    /// A human-readable label: the display name, falling back to the address.
    pub fn label(&self) -> &str {
        if !self.display_name.is_empty() {
            &self.display_name
        } else {
            self.identity.as_deref().unwrap_or("<unnamed mailbox>")
        }
    }
}

fn non_blank<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty()))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default())
}
