//! Terminal output for user-sync.
//!
//! Default mode prints exactly one line per completed request (the raw
//! status code) and three summary lines. `--pretty` adds the email, colors
//! and a styled summary. Uses only the `console` crate.

use console::style;
use std::path::{Path, PathBuf};
use user_sync_lib::{DispatchResult, RequestOutcome, SyncConfig, SyncReport};

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a styled header at the start of a pretty run.
pub fn print_header(csv_path: &Path, record_count: usize, config: &SyncConfig) {
    println!(
        "{} {} {}",
        style("user-sync").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "sending {} record{} from {}",
            record_count,
            if record_count == 1 { "" } else { "s" },
            csv_path.display()
        ))
        .dim(),
    );

    let mut meta_parts = vec![format!("Concurrency: {}", config.concurrency)];
    meta_parts.push(format!("Errors: {}", config.error_policy));
    if let Some(timeout) = config.timeout {
        meta_parts.push(format!("Timeout: {}s", timeout.as_secs()));
    }
    println!("{}", style(meta_parts.join(" · ")).dim());
    println!();
}

// ── Per-request lines ────────────────────────────────────────────────────────

/// Default mode: the raw status code, one per line.
pub fn print_result_default(result: &DispatchResult) {
    println!("{}", result.outcome);
}

/// Pretty mode: colored status, email and timing.
pub fn print_result(result: &DispatchResult) {
    let status = format_outcome(&result.outcome);
    println!(
        "  {}  {} {}",
        status,
        result.record.label(),
        style(format!("({}ms)", result.elapsed.as_millis())).dim()
    );
}

fn format_outcome(outcome: &RequestOutcome) -> String {
    match outcome {
        RequestOutcome::Success { status } => style(status).green().bold().to_string(),
        RequestOutcome::HttpFailure { status } => style(status).red().bold().to_string(),
        RequestOutcome::TransportFailure { error } => {
            format!("{} {}", style("ERR").red().bold(), style(error).dim())
        }
    }
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Plain summary lines.
pub fn summary_lines(report: &SyncReport) -> Vec<String> {
    vec![
        format!("{} successful requests", report.success_count()),
        format!("{} failed requests", report.failure_count()),
        format!("--- {:.3} seconds ---", report.duration.as_secs_f64()),
    ]
}

pub fn print_summary_default(report: &SyncReport) {
    for line in summary_lines(report) {
        println!("{}", line);
    }
}

/// Styled summary with optional transport error count and failure file.
pub fn print_summary(report: &SyncReport, failures_written: Option<&(PathBuf, usize)>) {
    println!();
    println!(
        "{} {} sent in {:.1}s",
        style("Summary:").bold(),
        report.total(),
        report.duration.as_secs_f64()
    );
    println!(
        "  {} {}",
        style(format!("{:>6}", report.success_count())).green().bold(),
        "successful"
    );
    println!(
        "  {} {}",
        style(format!("{:>6}", report.failure_count())).red().bold(),
        "failed"
    );
    if report.tally.transport_errors > 0 {
        println!(
            "  {} {}",
            style(format!("{:>6}", report.tally.transport_errors)).yellow(),
            "of which never got a response"
        );
    }
    if let Some((path, rows)) = failures_written {
        println!(
            "{}",
            style(format!("Failed rows ({}) written to {}", rows, path.display())).dim()
        );
    }
}
