//! Rendering of run summaries and assessments.
//!
//! Pure projections: nothing here touches the tenant or the aggregator.

use std::fmt::Write as _;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::assessment::AssessmentReport;
use crate::summary::RunSummary;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format '{}' (expected text or json)", other)),
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Text => write!(f, "text"),
            ReportFormat::Json => write!(f, "json"),
        }
    }
}

pub fn render_summary(summary: &RunSummary, format: ReportFormat) -> serde_json::Result<String> {
    match format {
        ReportFormat::Json => serde_json::to_string_pretty(summary),
        ReportFormat::Text => Ok(summary_text(summary)),
    }
}

pub fn render_assessment(report: &AssessmentReport, format: ReportFormat) -> serde_json::Result<String> {
    match format {
        ReportFormat::Json => serde_json::to_string_pretty(report),
        ReportFormat::Text => Ok(assessment_text(report)),
    }
}

// Writes into a String cannot fail; results of writeln! are ignored below.

fn summary_text(summary: &RunSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Mailbox audit reconciliation {}", summary.run_id);
    let _ = writeln!(
        out,
        "  Total: {}  Succeeded: {}  Skipped: {}  Failed: {}",
        summary.total, summary.succeeded, summary.skipped, summary.failed
    );
    let _ = writeln!(out, "  Duration: {}", format_duration(summary.duration));

    if !summary.change_records.is_empty() {
        let _ = writeln!(out, "\nChanges applied:");
        for record in &summary.change_records {
            let _ = writeln!(out, "  {} ({})", record.identity, record.display_name);
            for diff in &record.diffs {
                let _ = writeln!(out, "    {}", diff);
            }
        }
    }

    if !summary.unverified.is_empty() {
        let _ = writeln!(out, "\nUnverified (write accepted, re-read still differs):");
        for identity in &summary.unverified {
            let _ = writeln!(out, "  {}", identity);
        }
    }

    if !summary.failures.is_empty() {
        let _ = writeln!(out, "\nFailures:");
        for failure in &summary.failures {
            let who = failure.identity.as_deref().unwrap_or("(no identity)");
            let _ = writeln!(out, "  {} ({}): {}", who, failure.display_name, failure.cause);
        }
    }

    out
}

fn assessment_text(report: &AssessmentReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Mailbox audit assessment");
    let _ = writeln!(
        out,
        "  Total: {}  Compliant: {}  Non-compliant: {}  Missing identity: {}",
        report.total, report.compliant, report.non_compliant, report.missing_identity
    );

    for mailbox in &report.mailboxes {
        let _ = writeln!(out, "\n  {} ({})", mailbox.identity, mailbox.display_name);
        for diff in &mailbox.diffs {
            let _ = writeln!(out, "    {}", diff);
        }
    }

    if !report.undecodable.is_empty() {
        let _ = writeln!(out, "\nUnreadable records:");
        for mailbox in &report.undecodable {
            let _ = writeln!(out, "  {} ({}): {}", mailbox.identity, mailbox.display_name, mailbox.error);
        }
    }

    out
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}
