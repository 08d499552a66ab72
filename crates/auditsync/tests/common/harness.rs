//! Test harness for runs driven by config and snapshot files.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use auditsync::config::{load_config, Config};
use auditsync::remote::{CallLog, InMemoryTenant, TenantSnapshot};
use auditsync::{reconcile_tenant, MailboxRecord, NoopProgress, PreconditionError, RunSummary};

/// Isolated temp directory holding a config file and a tenant snapshot.
pub struct TestHarness {
    temp_dir: TempDir,
    pub config_path: PathBuf,
    pub snapshot_path: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("auditsync.yaml");
        let snapshot_path = temp_dir.path().join("tenant.json");
        Self {
            temp_dir,
            config_path,
            snapshot_path,
        }
    }

    /// Writes a YAML config with zero throttle plus `extra` lines appended
    /// under the top level.
    pub fn write_config(&self, extra: &str) -> Config {
        let content = format!("version: \"1.0\"\nrun:\n  throttleDelayMilliseconds: 0\n{}", extra);
        std::fs::write(&self.config_path, content).expect("Failed to write config");
        load_config(&self.config_path).expect("Config should load")
    }

    pub fn write_snapshot(&self, mailboxes: Vec<MailboxRecord>) {
        let snapshot = TenantSnapshot {
            org_audit_enabled: true,
            mailboxes,
        };
        let json = serde_json::to_string_pretty(&snapshot).expect("Failed to serialize snapshot");
        std::fs::write(&self.snapshot_path, json).expect("Failed to write snapshot");
    }

    pub fn load_tenant(&self) -> InMemoryTenant {
        InMemoryTenant::load_snapshot(&self.snapshot_path).expect("Snapshot should load")
    }

    pub fn dir(&self) -> &std::path::Path {
        self.temp_dir.path()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a full reconciliation against `tenant` with `config`.
pub async fn reconcile(
    tenant: &InMemoryTenant,
    config: &Config,
) -> (Result<RunSummary, PreconditionError>, CallLog) {
    let result = reconcile_tenant(
        tenant,
        Arc::new(config.target_policy()),
        &config.run_options(),
        &NoopProgress,
    )
    .await;
    (result, tenant.calls())
}
