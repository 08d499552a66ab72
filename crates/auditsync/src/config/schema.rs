use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mailbox::DEFAULT_RECIPIENT_TYPES;
use crate::policy::{
    action_set, TargetPolicy, DEFAULT_ADMIN_ACTIONS, DEFAULT_AGE_LIMIT_DAYS,
    DEFAULT_DELEGATE_ACTIONS, DEFAULT_OWNER_ACTIONS,
};
use crate::reconciler::RunOptions;
use crate::remote::exchange::DEFAULT_BASE_URL;
use crate::secrets::SecretSource;
use crate::timespan;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

impl Config {
    /// The immutable target for a run.
    pub fn target_policy(&self) -> TargetPolicy {
        TargetPolicy::new(
            timespan::from_days(self.policy.age_limit_days),
            action_set(&self.policy.owner_actions),
            action_set(&self.policy.admin_actions),
            action_set(&self.policy.delegate_actions),
        )
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.run.throttle_delay_milliseconds)
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            throttle: self.throttle(),
            recipient_types: self.run.recipient_types.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            policy: PolicyConfig::default(),
            run: RunConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    #[serde(default = "default_age_limit_days")]
    pub age_limit_days: u32,
    #[serde(default = "default_owner_actions")]
    pub owner_actions: Vec<String>,
    #[serde(default = "default_admin_actions")]
    pub admin_actions: Vec<String>,
    #[serde(default = "default_delegate_actions")]
    pub delegate_actions: Vec<String>,
}

fn default_age_limit_days() -> u32 {
    DEFAULT_AGE_LIMIT_DAYS
}

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn default_owner_actions() -> Vec<String> {
    to_strings(DEFAULT_OWNER_ACTIONS)
}

fn default_admin_actions() -> Vec<String> {
    to_strings(DEFAULT_ADMIN_ACTIONS)
}

fn default_delegate_actions() -> Vec<String> {
    to_strings(DEFAULT_DELEGATE_ACTIONS)
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            age_limit_days: default_age_limit_days(),
            owner_actions: default_owner_actions(),
            admin_actions: default_admin_actions(),
            delegate_actions: default_delegate_actions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    #[serde(default = "default_throttle_ms")]
    pub throttle_delay_milliseconds: u64,
    #[serde(default = "default_recipient_types")]
    pub recipient_types: Vec<String>,
}

fn default_throttle_ms() -> u64 {
    500
}

fn default_recipient_types() -> Vec<String> {
    to_strings(DEFAULT_RECIPIENT_TYPES)
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            throttle_delay_milliseconds: default_throttle_ms(),
            recipient_types: default_recipient_types(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_file: Option<String>,
    #[serde(default)]
    pub token_env_var: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl RemoteConfig {
    pub fn token_source(&self) -> SecretSource<'_> {
        SecretSource {
            value: self.token.as_deref(),
            file: self.token_file.as_deref(),
            env_var: self.token_env_var.as_deref(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            tenant: None,
            token: None,
            token_file: None,
            token_env_var: None,
        }
    }
}
