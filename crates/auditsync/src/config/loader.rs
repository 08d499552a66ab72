use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::policy::AuditAction;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// On-disk syntax of a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// `.yaml` and `.yml` are YAML; everything else is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ConfigFormat::Yaml
            }
            _ => ConfigFormat::Json,
        }
    }
}

/// `<config dir>/auditsync/config.yaml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("auditsync").join("config.yaml"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content, ConfigFormat::from_path(path))
}

pub fn load_config_from_str(content: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = match format {
        ConfigFormat::Json => serde_json::from_str(content)?,
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
    };

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.policy.age_limit_days == 0 {
        return Err(ConfigError::Validation {
            message: "policy.ageLimitDays must be at least 1".to_string(),
        });
    }

    // Unknown names would be written verbatim and rejected by the service
    // for every single mailbox.
    let lists = [
        ("policy.ownerActions", &config.policy.owner_actions),
        ("policy.adminActions", &config.policy.admin_actions),
        ("policy.delegateActions", &config.policy.delegate_actions),
    ];
    for (list, names) in lists {
        for name in names {
            if !AuditAction::from(name.as_str()).is_known() {
                return Err(ConfigError::UnknownAction {
                    list: list.to_string(),
                    action: name.clone(),
                });
            }
        }
    }

    if config.run.recipient_types.is_empty() {
        return Err(ConfigError::Validation {
            message: "run.recipientTypes must name at least one recipient type".to_string(),
        });
    }
    if config.run.recipient_types.iter().any(|t| t.trim().is_empty()) {
        return Err(ConfigError::Validation {
            message: "run.recipientTypes must not contain blank entries".to_string(),
        });
    }

    Ok(())
}
