//! # Domain Sweep Library
//!
//! Bulk domain availability checks driven through a scrape/extraction API,
//! with a cross-run ledger that makes repeated runs incremental.
//!
//! Each domain's search page is scraped once (with bounded retries), the
//! API's structured extraction is reconciled against a markdown heuristic,
//! and the run is appended to a JSON + CSV ledger. Domains recorded by an
//! earlier run are skipped.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_sweep_lib::{load_config, parse_domain_list, DomainSweeper, RunLedger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config(None, false)?;
//!     let sweeper = DomainSweeper::with_config(config)?;
//!
//!     let domains = parse_domain_list("example.com\nexample.dev\n");
//!     let mut ledger = RunLedger::open("out");
//!     let plan = ledger.plan(&domains);
//!
//!     let report = sweeper.sweep(&mut ledger, &plan, |_| {}).await?;
//!     println!("{} domains available so far", report.available_domains.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Reconciliation**: structured extraction first, markdown cues to fill
//!   gaps and veto prices that can't be tied to the domain
//! - **Bounded concurrency**: results keep input order whatever the
//!   completion order
//! - **Incremental ledger**: self-healing CSV with schema migration

// Re-export main public API types and functions
pub use checker::{DomainSweeper, SweepReport};
pub use concurrent::ConcurrentProcessor;
pub use config::{
    load_config, load_layers, ApiConfig, ConfigManager, EnvConfig, FileConfig, OutputConfig,
    SweepConfig, TuningConfig,
};
pub use error::SweepError;
pub use ledger::{LedgerPaths, RunLedger, SweepPlan, LEDGER_CSV_HEADER, RUN_CSV_HEADER};
pub use reconcile::{infer_from_markdown, normalize_extract, reconcile, MarkdownInference};
pub use retry::RetryPolicy;
pub use scrape::ScrapeClient;
pub use types::{
    Availability, DomainResult, ExtractedResult, RunRecord, ScrapeData, ScrapeRequest,
    ScrapeResponse,
};
pub use utils::{parse_domain_list, read_domain_list, search_url_for};
pub use writer::{available_domains, write_available_domains};

// Public modules
pub mod ledger;
pub mod reconcile;

// Internal modules - these are not part of the public API
mod checker;
mod concurrent;
mod config;
mod error;
mod retry;
mod scrape;
mod types;
mod utils;
mod writer;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, SweepError>;
