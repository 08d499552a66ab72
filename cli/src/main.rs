//! # auditsync CLI entry point
//!
//! Wires configuration, logging and the remote collaborator into the
//! reconciliation core. No reconciliation decisions are made here.

mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use auditsync::config::{default_config_path, load_config, Config};
use auditsync::remote::{AuditService, ExchangeAdminClient, InMemoryTenant, RemoteError};
use auditsync::{
    assess, fetch_tenant_state, reconcile_tenant, render_assessment, render_summary, ReportFormat,
    TracingProgress,
};

/// Exit code for a completed run that needs operator attention.
const EXIT_ATTENTION: u8 = 2;

/// Brings mailbox audit configuration across a tenant in line with one policy.
#[derive(Parser, Debug)]
#[command(name = "auditsync", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Path to the configuration file (JSON or YAML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate every mailbox and write the policy to those that differ.
    Reconcile(ReconcileArgs),

    /// Report compliance without writing anything.
    Check(SourceArgs),

    /// Validate the configuration file and exit.
    ValidateConfig,
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Read the tenant from a JSON snapshot instead of the admin endpoint.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Report format written to stdout.
    #[arg(long, default_value_t = ReportFormat::Text)]
    format: ReportFormat,
}

#[derive(Args, Debug)]
struct ReconcileArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Override the pause after each write, in milliseconds.
    #[arg(long)]
    throttle_ms: Option<u64>,

    /// With --snapshot, write the resulting tenant state to this file.
    #[arg(long, requires = "snapshot")]
    save_snapshot: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(cli.verbose, cli.json_logs) {
        eprintln!("{e:#}");
        return ExitCode::from(1);
    }

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            if let Some(hint) = remote_hint(&e) {
                tracing::error!("{hint}");
            }
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    match cli.command {
        Commands::ValidateConfig => {
            let path = cli
                .config
                .or_else(default_config_path)
                .context("No config path given and no platform config directory")?;
            load_config(&path).with_context(|| format!("Invalid config {}", path.display()))?;
            println!("{} is valid", path.display());
            Ok(0)
        }
        Commands::Check(args) => {
            let config = resolve_config(cli.config.as_deref())?;
            run_check(&config, &args).await
        }
        Commands::Reconcile(args) => {
            let mut config = resolve_config(cli.config.as_deref())?;
            if let Some(ms) = args.throttle_ms {
                config.run.throttle_delay_milliseconds = ms;
            }
            run_reconcile(&config, &args).await
        }
    }
}

/// Operator guidance for remote failures that abort a run.
fn remote_hint(error: &anyhow::Error) -> Option<&'static str> {
    let remote = error.chain().find_map(|cause| cause.downcast_ref::<RemoteError>())?;
    if remote.is_unauthorized() {
        Some("The admin token was refused; issue a fresh token with Exchange administrator rights")
    } else if remote.is_throttled() {
        Some("The service is throttling requests; retry later or raise run.throttleDelayMilliseconds")
    } else {
        None
    }
}

/// An explicit path must load; the default path is used only if it exists.
fn resolve_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = explicit {
        return load_config(path).with_context(|| format!("Failed to load {}", path.display()));
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            tracing::debug!(path = %path.display(), "Using default config");
            load_config(&path).with_context(|| format!("Failed to load {}", path.display()))
        }
        _ => {
            tracing::info!("No config file found; using the baseline policy");
            Ok(Config::default())
        }
    }
}

enum Tenant {
    Snapshot(InMemoryTenant),
    Remote(ExchangeAdminClient),
}

impl Tenant {
    fn service(&self) -> &dyn AuditService {
        match self {
            Tenant::Snapshot(tenant) => tenant,
            Tenant::Remote(client) => client,
        }
    }
}

fn connect(config: &Config, snapshot: Option<&Path>) -> anyhow::Result<Tenant> {
    if let Some(path) = snapshot {
        tracing::info!(snapshot = %path.display(), "Using tenant snapshot");
        return Ok(Tenant::Snapshot(InMemoryTenant::load_snapshot(path)?));
    }

    let client = ExchangeAdminClient::from_config(&config.remote)
        .context("Cannot reach the admin endpoint (or pass --snapshot)")?;
    tracing::info!(endpoint = client.endpoint(), "Using admin endpoint");
    Ok(Tenant::Remote(client))
}

async fn run_reconcile(config: &Config, args: &ReconcileArgs) -> anyhow::Result<u8> {
    let tenant = connect(config, args.source.snapshot.as_deref())?;
    let target = Arc::new(config.target_policy());
    let options = config.run_options();
    tracing::info!(
        throttle_ms = options.throttle.as_millis() as u64,
        recipient_types = %options.recipient_types.join(","),
        "Starting reconciliation"
    );

    let summary = reconcile_tenant(tenant.service(), target, &options, &TracingProgress).await?;
    println!("{}", render_summary(&summary, args.source.format)?);

    if let (Some(path), Tenant::Snapshot(snapshot)) = (&args.save_snapshot, &tenant) {
        let json = serde_json::to_string_pretty(&snapshot.snapshot())?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "Saved tenant snapshot");
    }

    Ok(if summary.is_clean() { 0 } else { EXIT_ATTENTION })
}

async fn run_check(config: &Config, args: &SourceArgs) -> anyhow::Result<u8> {
    let tenant = connect(config, args.snapshot.as_deref())?;
    let records = fetch_tenant_state(tenant.service(), &config.run.recipient_types).await?;
    let report = assess(&records, &config.target_policy());
    println!("{}", render_assessment(&report, args.format)?);

    Ok(if report.is_compliant() { 0 } else { EXIT_ATTENTION })
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditsync::PreconditionError;

    #[test]
    fn cli_parse_reconcile_with_overrides() {
        let cli = Cli::try_parse_from([
            "auditsync",
            "--config",
            "/etc/auditsync.yaml",
            "reconcile",
            "--snapshot",
            "tenant.json",
            "--throttle-ms",
            "0",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/etc/auditsync.yaml")));
        match cli.command {
            Commands::Reconcile(args) => {
                assert_eq!(args.source.snapshot, Some(PathBuf::from("tenant.json")));
                assert_eq!(args.throttle_ms, Some(0));
                assert_eq!(args.source.format, ReportFormat::Json);
                assert!(args.save_snapshot.is_none());
            }
            other => panic!("expected reconcile, got {:?}", other),
        }
    }

    #[test]
    fn cli_parse_check_defaults() {
        let cli = Cli::try_parse_from(["auditsync", "check"]).unwrap();
        match cli.command {
            Commands::Check(args) => {
                assert!(args.snapshot.is_none());
                assert_eq!(args.format, ReportFormat::Text);
            }
            other => panic!("expected check, got {:?}", other),
        }
    }

    #[test]
    fn cli_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["auditsync", "validate-config", "-vv", "--json-logs"]).unwrap();
        assert!(matches!(cli.command, Commands::ValidateConfig));
        assert_eq!(cli.verbose, 2);
        assert!(cli.json_logs);
    }

    #[test]
    fn cli_save_snapshot_requires_snapshot() {
        let result = Cli::try_parse_from(["auditsync", "reconcile", "--save-snapshot", "out.json"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_rejects_unknown_format() {
        let result = Cli::try_parse_from(["auditsync", "check", "--format", "xml"]);
        assert!(result.is_err());
    }

    #[test]
    fn remote_mode_requires_tenant() {
        let result = connect(&Config::default(), None);
        assert!(result.is_err());
    }

    fn status(code: u16) -> RemoteError {
        RemoteError::Status {
            command: "Get-OrganizationConfig".to_string(),
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn remote_hint_for_refused_token() {
        let error = anyhow::Error::from(PreconditionError::OrgCheckFailed(status(401)));
        let hint = remote_hint(&error).unwrap();
        assert!(hint.contains("token was refused"));
    }

    #[test]
    fn remote_hint_for_throttling() {
        let error = anyhow::Error::from(PreconditionError::BulkFetchFailed(status(429)))
            .context("Reconciliation aborted");
        assert!(remote_hint(&error).unwrap().contains("throttling"));
    }

    #[test]
    fn remote_hint_absent_for_other_errors() {
        let error = anyhow::Error::from(PreconditionError::OrgCheckFailed(status(500)));
        assert!(remote_hint(&error).is_none());
        assert!(remote_hint(&anyhow::anyhow!("config missing")).is_none());
    }
}
