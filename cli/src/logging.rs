//! Subscriber setup for the command-line entry point.

use anyhow::Context;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over the verbosity flag. `log` records from the HTTP
/// client are bridged into tracing.
pub fn init_logging(verbosity: u8, json: bool) -> anyhow::Result<()> {
    let default_directive = match verbosity {
        0 => "auditsync=info,warn",
        1 => "auditsync=debug,info",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .context("Failed to create log filter")?;

    tracing_log::LogTracer::init().context("Failed to bridge log records")?;

    // Logs go to stderr so stdout carries only the report.
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        let subscriber = registry.with(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .flatten_event(true),
        );
        tracing::subscriber::set_global_default(subscriber)
            .context("Failed to install tracing subscriber")?;
    } else {
        let subscriber = registry.with(fmt::layer().with_writer(std::io::stderr).with_target(false));
        tracing::subscriber::set_global_default(subscriber)
            .context("Failed to install tracing subscriber")?;
    }

    Ok(())
}
