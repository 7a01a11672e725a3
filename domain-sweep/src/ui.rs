//! Terminal output for domain-sweep.
//!
//! Progress and summaries go to stdout; logs go to stderr through
//! `tracing`. Uses only the `console` crate for styling, which drops colors
//! automatically when stdout is not a terminal.

use console::style;
use domain_sweep_lib::{
    Availability, DomainResult, LedgerPaths, SweepConfig, SweepPlan, SweepReport,
};
use std::time::Duration;

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a styled header before a sweep starts.
pub fn print_header(plan: &SweepPlan, config: &SweepConfig) {
    println!(
        "{} {} {}",
        style("domain-sweep").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "- Checking {} of {} domain{}",
            plan.to_check.len(),
            plan.total,
            plural(plan.total)
        ))
        .dim(),
    );

    if plan.skipped > 0 {
        println!(
            "{}",
            style(format!(
                "Skipping {} already-checked domain{}",
                plan.skipped,
                plural(plan.skipped)
            ))
            .dim()
        );
    }

    let meta_parts = [
        format!("API: {}", config.endpoint()),
        format!("Concurrency: {}", config.concurrency),
        format!("Delay: {}ms", config.request_delay.as_millis()),
    ];
    println!("{}", style(meta_parts.join(" | ")).dim());
    println!();
}

// ── Progress ─────────────────────────────────────────────────────────────────

/// Outcome part of a progress line: `available ($9.99)` or `ERROR (HTTP 502)`.
pub fn outcome_text(result: &DomainResult) -> String {
    if !result.ok {
        return format!(
            "ERROR ({})",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }

    let availability = result.availability().unwrap_or_default();
    match result.price() {
        Some(price) => format!("{} ({})", availability, price),
        None => availability.to_string(),
    }
}

/// Print one `[i/N] domain: outcome` line as a domain completes.
pub fn print_progress(result: &DomainResult, total: usize) {
    let text = outcome_text(result);
    let outcome = if !result.ok {
        style(text).red()
    } else {
        match result.availability() {
            Some(Availability::Available) => style(text).green().bold(),
            Some(Availability::Taken) => style(text).red(),
            _ => style(text).yellow(),
        }
    };

    println!(
        "{} {}: {}",
        style(format!("[{}/{}]", result.index, total)).dim(),
        result.domain,
        outcome,
    );
}

// ── Early exits ──────────────────────────────────────────────────────────────

/// List what a sweep would check without doing it.
pub fn print_dry_run(plan: &SweepPlan) {
    for domain in &plan.to_check {
        println!("{}", domain);
    }
    eprintln!(
        "{} domain{} would be checked ({} already checked)",
        plan.to_check.len(),
        plural(plan.to_check.len()),
        plan.skipped
    );
}

pub fn print_all_checked(plan: &SweepPlan) {
    println!(
        "All domains already checked ({} skipped)",
        style(plan.skipped).bold()
    );
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the final summary and where the results were written.
pub fn print_summary(report: &SweepReport, paths: &LedgerPaths, duration: Duration) {
    let Some(run) = &report.run else {
        return;
    };

    println!();
    println!(
        "{}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "{} domain{} in {:.1}s  {}  {}  {}  {}  {}  {}",
        style(run.count).bold(),
        plural(run.count),
        duration.as_secs_f64(),
        style("|").dim(),
        style(format!("{} succeeded", run.success_count)).green(),
        style("|").dim(),
        style(format!("{} failed", run.failure_count)).red(),
        style("|").dim(),
        style(format!("{} newly available", run.available_count())).green(),
    );

    println!();
    println!("- Run JSON: {}", paths.run_json(&run.run_id).display());
    println!("- Run CSV:  {}", paths.run_csv(&run.run_id).display());
    println!("- Running JSON: {}", paths.history_json.display());
    println!("- Running CSV:  {}", paths.history_csv.display());
    println!(
        "- Available: {} ({} domain{})",
        paths.available_txt.display(),
        report.available_domains.len(),
        plural(report.available_domains.len())
    );
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
