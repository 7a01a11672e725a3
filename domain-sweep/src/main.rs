//! Domain Sweep CLI Application
//!
//! Checks a list of domains through a scrape/extraction API and keeps an
//! incremental ledger of the results. This binary is a thin layer over
//! domain-sweep-lib: argument parsing, logging setup and terminal output.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use domain_sweep_lib::{
    load_layers, read_domain_list, DomainSweeper, RunLedger, SweepConfig, SweepError,
};
use std::path::Path;
use std::process;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

const DEFAULT_DOMAINS_FILE: &str = "domains.txt";
const DEFAULT_OUT_DIR: &str = "out";

/// CLI arguments for domain-sweep
#[derive(Parser, Debug)]
#[command(name = "domain-sweep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Sai Dutt G.V <gvs46@protonmail.com>")]
#[command(about = "Bulk domain availability checks through a scrape API")]
#[command(
    long_about = "Check a list of domains for availability by scraping a domain search page through a scrape/extraction API.\n\nResults are appended to a cross-run ledger; domains checked by an earlier run are skipped."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Input file with domains (one per line, # for comments)
    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        help_heading = "Input/Output"
    )]
    pub file: Option<String>,

    /// Directory for the ledger and per-run results (default: out)
    #[arg(
        short = 'o',
        long = "out-dir",
        value_name = "DIR",
        help_heading = "Input/Output"
    )]
    pub out_dir: Option<String>,

    /// List the domains that would be checked and exit
    #[arg(long = "dry-run", help_heading = "Input/Output")]
    pub dry_run: bool,

    /// Max concurrent domain checks (default: 3, max: 100)
    #[arg(short = 'c', long = "concurrency", help_heading = "Performance")]
    pub concurrency: Option<usize>,

    /// Pause after each domain in milliseconds (default: 250)
    #[arg(long = "delay-ms", value_name = "MS", help_heading = "Performance")]
    pub delay_ms: Option<u64>,

    /// How long the scraper waits for the page in milliseconds (default: 5000)
    #[arg(long = "wait-for-ms", value_name = "MS", help_heading = "Performance")]
    pub wait_for_ms: Option<u64>,

    /// Per-request scrape timeout in milliseconds (default: 60000)
    #[arg(long = "timeout-ms", value_name = "MS", help_heading = "Performance")]
    pub timeout_ms: Option<u64>,

    /// Retries after a failed scrape (default: 2)
    #[arg(long = "retries", value_name = "N", help_heading = "Performance")]
    pub retries: Option<u32>,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Show debug logs (retries, request timing)
    #[arg(short = 'd', long = "debug", help_heading = "Configuration")]
    pub debug: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args);

    // Validate arguments
    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    if let Err(e) = run_sweep(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Install the stderr log subscriber.
///
/// `--debug` and `--verbose` pick the level; otherwise `RUST_LOG` applies,
/// defaulting to warnings only.
fn init_logging(args: &Args) {
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else if args.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 || concurrency > 100 {
            return Err("Concurrency must be between 1 and 100".to_string());
        }
    }

    if args.timeout_ms == Some(0) {
        return Err("--timeout-ms must be greater than 0".to_string());
    }

    Ok(())
}

async fn run_sweep(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let (file_config, env_config) =
        load_layers(args.config.as_deref().map(Path::new), args.verbose)?;
    let config = apply_cli_args(SweepConfig::resolve(&file_config, &env_config)?, &args);

    let output = file_config.output.unwrap_or_default();
    let domains_file = args
        .file
        .clone()
        .or(output.domains_file)
        .unwrap_or_else(|| DEFAULT_DOMAINS_FILE.to_string());
    let out_dir = args
        .out_dir
        .clone()
        .or(output.dir)
        .unwrap_or_else(|| DEFAULT_OUT_DIR.to_string());

    let domains = read_domain_list(&domains_file)?;
    if domains.is_empty() {
        println!("No domains found in {}", domains_file);
        return Ok(());
    }

    let mut ledger = RunLedger::open(&out_dir);
    let plan = ledger.plan(&domains);

    if args.dry_run {
        ui::print_dry_run(&plan);
        return Ok(());
    }

    if plan.is_complete() {
        ui::print_all_checked(&plan);
        return Ok(());
    }

    ui::print_header(&plan, &config);

    let sweeper = DomainSweeper::with_config(config)?;
    let total = plan.to_check.len();
    let start_time = Instant::now();

    let report = sweeper
        .sweep(&mut ledger, &plan, |result| ui::print_progress(result, total))
        .await
        .map_err(describe_fatal)?;

    ui::print_summary(&report, ledger.paths(), start_time.elapsed());
    Ok(())
}

/// Apply CLI flags, the highest-precedence layer.
fn apply_cli_args(mut config: SweepConfig, args: &Args) -> SweepConfig {
    if let Some(concurrency) = args.concurrency {
        config = config.with_concurrency(concurrency);
    }
    if let Some(delay) = args.delay_ms {
        config = config.with_request_delay(Duration::from_millis(delay));
    }
    if let Some(wait_for) = args.wait_for_ms {
        config = config.with_wait_for(Duration::from_millis(wait_for));
    }
    if let Some(timeout) = args.timeout_ms {
        config = config.with_timeout(Duration::from_millis(timeout));
    }
    if let Some(retries) = args.retries {
        config = config.with_retries(retries);
    }
    config
}

/// Add a hint to ledger schema errors; other errors pass through.
fn describe_fatal(error: SweepError) -> Box<dyn std::error::Error> {
    if let SweepError::LedgerSchema { path, .. } = &error {
        return format!(
            "{} (move {} aside or restore its header before re-running)",
            error, path
        )
        .into();
    }
    Box::new(error)
}
