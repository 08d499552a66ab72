//! Bearer token resolution.
//!
//! The admin token is taken from the first configured source:
//!
//! 1. **Direct value** - `token: "..."`, for local rehearsals only
//! 2. **File** - `tokenFile: /run/secrets/exo-token`, as written by a token broker
//! 3. **Env var** - `tokenEnvVar: EXO_ADMIN_TOKEN`
//!
//! Issuing or refreshing the token is someone else's job; this module only
//! reads what was handed over.

use secrecy::SecretString;
use std::fs;
use std::path::PathBuf;

/// Environment variable consulted when the config names no token source.
pub const DEFAULT_TOKEN_ENV_VAR: &str = "AUDITSYNC_TOKEN";

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No token source configured (set token, tokenFile or tokenEnvVar, or export AUDITSYNC_TOKEN)")]
    NoSourceProvided,

    #[error("Failed to read token from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },

    #[error("Token from {origin} is empty")]
    Empty { origin: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Where to look for a secret. Empty strings count as unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretSource<'a> {
    pub value: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> SecretSource<'a> {
    pub fn is_configured(&self) -> bool {
        non_empty(self.value).is_some()
            || non_empty(self.file).is_some()
            || non_empty(self.env_var).is_some()
    }

    /// Resolves the secret from the highest-priority configured source.
    ///
    /// A configured source that fails is an error; lower-priority sources are
    /// not consulted as a fallback.
    pub fn resolve(&self) -> Result<SecretString> {
        if let Some(value) = non_empty(self.value) {
            return Ok(SecretString::from(value.to_string()));
        }

        if let Some(path) = non_empty(self.file) {
            let expanded = expand_home(path);
            let display = expanded.display().to_string();
            let content = fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
                path: display.clone(),
                source: e,
            })?;
            return checked(content.trim(), || format!("file '{}'", display));
        }

        if let Some(name) = non_empty(self.env_var) {
            return match std::env::var(name) {
                Ok(value) => checked(value.trim(), || format!("environment variable '{}'", name)),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Err(SecretError::NoSourceProvided)
    }

    /// Like [`resolve`](Self::resolve), falling back to
    /// [`DEFAULT_TOKEN_ENV_VAR`] when nothing is configured.
    pub fn resolve_or_default_env(&self) -> Result<SecretString> {
        if self.is_configured() {
            return self.resolve();
        }
        SecretSource {
            env_var: Some(DEFAULT_TOKEN_ENV_VAR),
            ..Default::default()
        }
        .resolve()
        .map_err(|e| match e {
            SecretError::EnvVarNotSet { .. } => SecretError::NoSourceProvided,
            other => other,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

fn checked(value: &str, origin: impl FnOnce() -> String) -> Result<SecretString> {
    if value.is_empty() {
        return Err(SecretError::Empty { origin: origin() });
    }
    Ok(SecretString::from(value.to_string()))
}

/// Expands a leading `~` or `~/` to the current user's home directory.
/// `~user/...` is left as is.
fn expand_home(path: &str) -> PathBuf {
    if let Some(home) = dirs::home_dir() {
        if path == "~" {
            return home;
        }
        if let Some(rest) = path.strip_prefix("~/") {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
