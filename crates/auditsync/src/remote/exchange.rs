//! Exchange admin REST client.
//!
//! Each operation is a cmdlet invocation POSTed to the tenant's
//! `InvokeCommand` endpoint. Authentication is out of scope: the client is
//! handed an already-issued bearer token.

use std::time::Duration;

use log::{debug, info, warn};
use reqwest::{Client, Response, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use async_trait::async_trait;

use super::error::{RemoteError, Result};
use super::AuditService;
use crate::config::RemoteConfig;
use crate::error::ConfigError;
use crate::mailbox::MailboxRecord;
use crate::policy::{AuditActionSet, TargetPolicy};
use crate::timespan;

/// Default admin endpoint host for the commercial cloud.
pub const DEFAULT_BASE_URL: &str = "https://outlook.office365.com";

/// Default connect timeout for HTTP requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout. Bulk fetches of large tenants are slow.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Maximum length for error bodies carried into errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Upper bound on followed pages, so a looping `nextLink` cannot spin forever.
const MAX_PAGES: usize = 10_000;

const GET_ORGANIZATION_CONFIG: &str = "Get-OrganizationConfig";
const GET_MAILBOX: &str = "Get-EXOMailbox";
const SET_MAILBOX: &str = "Set-Mailbox";

fn sanitize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_ERROR_BODY_LENGTH {
        let head: String = trimmed.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated)", head)
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CmdletRequest<'a> {
    cmdlet_input: CmdletInput<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CmdletInput<'a> {
    cmdlet_name: &'a str,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct CmdletResponse<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OrganizationConfig {
    #[serde(default)]
    audit_disabled: bool,
}

/// Builds the `Set-Mailbox` parameters carrying the complete target state.
fn full_state_parameters(identity: &str, policy: &TargetPolicy) -> Value {
    fn names(actions: &AuditActionSet) -> Vec<&str> {
        actions.iter().map(|action| action.as_str()).collect()
    }

    json!({
        "Identity": identity,
        "AuditEnabled": policy.audit_enabled(),
        "AuditLogAgeLimit": timespan::format(policy.age_limit()),
        "AuditOwner": names(policy.owner_actions()),
        "AuditAdmin": names(policy.admin_actions()),
        "AuditDelegate": names(policy.delegate_actions()),
    })
}

/// Client for the Exchange admin `InvokeCommand` endpoint.
pub struct ExchangeAdminClient {
    client: Client,
    endpoint: String,
    token: SecretString,
}

impl ExchangeAdminClient {
    /// Creates a client for `tenant` under `base_url`.
    pub fn new(base_url: &str, tenant: &str, token: SecretString) -> Result<Self> {
        let tenant = tenant.trim();
        if tenant.is_empty() {
            return Err(RemoteError::Config("tenant must not be empty".to_string()));
        }
        let endpoint = format!(
            "{}/adminapi/beta/{}/InvokeCommand",
            base_url.trim_end_matches('/'),
            tenant
        );
        Self::with_endpoint(endpoint, token)
    }

    /// Creates a client from the `remote` config section, resolving the
    /// admin token from its configured source.
    pub fn from_config(config: &RemoteConfig) -> crate::Result<Self> {
        let tenant = config.tenant.as_deref().ok_or_else(|| ConfigError::Validation {
            message: "remote.tenant is not configured".to_string(),
        })?;
        let token = config.token_source().resolve_or_default_env()?;
        Ok(Self::new(&config.base_url, tenant, token)?)
    }

    /// Creates a client posting to an explicit `InvokeCommand` URL.
    pub fn with_endpoint(endpoint: String, token: SecretString) -> Result<Self> {
        let parsed = Url::parse(&endpoint)
            .map_err(|e| RemoteError::Config(format!("invalid endpoint '{}': {}", endpoint, e)))?;
        if !matches!(parsed.scheme(), "https" | "http") {
            return Err(RemoteError::Config(format!(
                "endpoint must be an http(s) URL, got '{}'",
                endpoint
            )));
        }

        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Posts one cmdlet invocation and maps non-2xx statuses to errors.
    async fn send(&self, url: &str, cmdlet: &str, parameters: &Value) -> Result<Response> {
        debug!("Invoking {} at {}", cmdlet, url);

        let request = CmdletRequest {
            cmdlet_input: CmdletInput {
                cmdlet_name: cmdlet,
                parameters: parameters.clone(),
            },
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(self.token.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = sanitize_error_body(&body);
            warn!("{} failed with HTTP {}: {}", cmdlet, status.as_u16(), body);
            return Err(RemoteError::Status {
                command: cmdlet.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn invoke<T: DeserializeOwned>(
        &self,
        url: &str,
        cmdlet: &str,
        parameters: &Value,
    ) -> Result<CmdletResponse<T>> {
        self.send(url, cmdlet, parameters)
            .await?
            .json::<CmdletResponse<T>>()
            .await
            .map_err(|e| RemoteError::Decode {
                command: cmdlet.to_string(),
                message: e.to_string(),
            })
    }

    /// Invokes a cmdlet and follows `@odata.nextLink` until exhausted.
    ///
    /// The bearer token is only ever sent to the endpoint's own origin, so a
    /// next link pointing anywhere else ends the fetch with an error.
    async fn invoke_paged<T: DeserializeOwned>(
        &self,
        cmdlet: &str,
        parameters: &Value,
    ) -> Result<Vec<T>> {
        let decode_error = |message: String| RemoteError::Decode {
            command: cmdlet.to_string(),
            message,
        };

        let mut items = Vec::new();
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| RemoteError::Config(format!("invalid endpoint: {}", e)))?;
        let origin = url.origin();

        for page in 1..=MAX_PAGES {
            let response: CmdletResponse<T> = self.invoke(url.as_str(), cmdlet, parameters).await?;
            items.extend(response.value);

            match response.next_link {
                Some(next) if !next.is_empty() => {
                    let next_url = url
                        .join(&next)
                        .map_err(|e| decode_error(format!("invalid nextLink '{}': {}", next, e)))?;
                    if next_url.origin() != origin {
                        return Err(decode_error(format!(
                            "nextLink leaves the endpoint origin: {}",
                            next_url.origin().ascii_serialization()
                        )));
                    }
                    debug!("{} page {} done, {} items so far", cmdlet, page, items.len());
                    url = next_url;
                }
                _ => return Ok(items),
            }
        }

        Err(decode_error(format!("pagination exceeded {} pages", MAX_PAGES)))
    }
}

#[async_trait]
impl AuditService for ExchangeAdminClient {
    async fn check_org_audit_enabled(&self) -> Result<bool> {
        let response: CmdletResponse<OrganizationConfig> = self
            .invoke(&self.endpoint, GET_ORGANIZATION_CONFIG, &json!({}))
            .await?;

        let config = response
            .value
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::Decode {
                command: GET_ORGANIZATION_CONFIG.to_string(),
                message: "response contained no organization".to_string(),
            })?;

        Ok(!config.audit_disabled)
    }

    async fn bulk_fetch(
        &self,
        recipient_types: &[String],
        fields: &[&str],
    ) -> Result<Vec<MailboxRecord>> {
        info!(
            "Fetching mailboxes of types [{}] with {} properties",
            recipient_types.join(", "),
            fields.len()
        );

        let parameters = json!({
            "RecipientTypeDetails": recipient_types,
            "ResultSize": "Unlimited",
            "Properties": fields,
        });
        // Records are decoded one by one: a mailbox the crate cannot read
        // fails on its own instead of failing the whole fetch.
        let raw: Vec<Value> = self.invoke_paged(GET_MAILBOX, &parameters).await?;
        let mailboxes: Vec<MailboxRecord> = raw.into_iter().map(MailboxRecord::from_value).collect();

        let undecodable = mailboxes.iter().filter(|m| m.decode_error.is_some()).count();
        if undecodable > 0 {
            warn!("{} mailbox record(s) could not be decoded", undecodable);
        }
        info!("Fetched {} mailboxes", mailboxes.len());
        Ok(mailboxes)
    }

    async fn fetch(&self, identity: &str, fields: &[&str]) -> Result<MailboxRecord> {
        let parameters = json!({
            "Identity": identity,
            "Properties": fields,
        });
        let response: CmdletResponse<MailboxRecord> =
            self.invoke(&self.endpoint, GET_MAILBOX, &parameters).await?;

        response
            .value
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::NotFound(identity.to_string()))
    }

    async fn update(&self, identity: &str, policy: &TargetPolicy) -> Result<()> {
        let parameters = full_state_parameters(identity, policy);
        // The body is ignored: the service answers a successful write with
        // an empty value list or no content at all.
        self.send(&self.endpoint, SET_MAILBOX, &parameters).await?;
        debug!("Set-Mailbox accepted for {}", identity);
        Ok(())
    }
}
