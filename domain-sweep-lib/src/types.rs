//! Core data types for domain sweeps.
//!
//! This module defines the per-domain outcome, the run record persisted in
//! the ledger, and the typed request/response shapes of the scrape API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Availability verdict for a single domain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Taken,
    #[default]
    Unknown,
}

impl Availability {
    /// Parse one of the three canonical labels. Anything else is `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "available" => Some(Self::Available),
            "taken" => Some(Self::Taken),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Taken => "taken",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The reconciled, canonical outcome for one domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedResult {
    pub availability: Availability,

    /// Price as rendered on the page (e.g. "$12,345"), if attributable.
    pub price: Option<String>,

    #[serde(default)]
    pub notes: String,
}

impl Default for ExtractedResult {
    fn default() -> Self {
        Self {
            availability: Availability::Unknown,
            price: None,
            notes: String::new(),
        }
    }
}

/// Result of checking one domain in one run.
///
/// Created once by the worker pool and never mutated afterwards. Successful
/// checks carry the `ExtractedResult` fields inline; failed ones carry
/// `error` instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DomainResult {
    /// The domain as it appeared in the input list
    pub domain: String,

    /// Search page that was scraped for this domain
    pub search_url: String,

    /// 1-based position in the run's work list
    pub index: usize,

    /// When the check started (RFC 3339, UTC, millisecond precision)
    pub timestamp: String,

    pub ok: bool,

    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub extracted: Option<ExtractedResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Whether the response carried a structured extraction payload.
    /// Only recorded for successful checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_extract: Option<bool>,

    /// Whether the response carried rendered markdown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_markdown: Option<bool>,
}

impl DomainResult {
    /// Build a successful result.
    pub fn checked(
        domain: &str,
        search_url: String,
        index: usize,
        timestamp: String,
        extracted: ExtractedResult,
        has_extract: bool,
        has_markdown: bool,
    ) -> Self {
        Self {
            domain: domain.to_string(),
            search_url,
            index,
            timestamp,
            ok: true,
            extracted: Some(extracted),
            error: None,
            has_extract: Some(has_extract),
            has_markdown: Some(has_markdown),
        }
    }

    /// Build a failed result carrying the error message.
    pub fn failed(
        domain: &str,
        search_url: String,
        index: usize,
        timestamp: String,
        error: String,
    ) -> Self {
        Self {
            domain: domain.to_string(),
            search_url,
            index,
            timestamp,
            ok: false,
            extracted: None,
            error: Some(error),
            has_extract: None,
            has_markdown: None,
        }
    }

    /// Availability for successful checks, `None` for failures.
    pub fn availability(&self) -> Option<Availability> {
        self.extracted.as_ref().map(|e| e.availability)
    }

    pub fn price(&self) -> Option<&str> {
        self.extracted.as_ref().and_then(|e| e.price.as_deref())
    }

    pub fn is_available(&self) -> bool {
        self.ok && self.availability() == Some(Availability::Available)
    }
}

/// One invocation's worth of results, as appended to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub api_url: String,
    pub scrape_path: String,
    pub count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
    pub results: Vec<DomainResult>,
}

impl RunRecord {
    /// Finalize a run from its ordered results; counts are derived here.
    pub fn new(
        run_id: String,
        started_at: String,
        finished_at: String,
        api_url: &str,
        scrape_path: &str,
        skipped_count: usize,
        results: Vec<DomainResult>,
    ) -> Self {
        let success_count = results.iter().filter(|r| r.ok).count();
        Self {
            run_id,
            started_at,
            finished_at,
            api_url: api_url.to_string(),
            scrape_path: scrape_path.to_string(),
            count: results.len(),
            success_count,
            failure_count: results.len() - success_count,
            skipped_count,
            results,
        }
    }

    /// Domains from this run whose outcome is `available`.
    pub fn available_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_available()).count()
    }
}

/// Everything needed to issue one scrape call.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeRequest {
    pub domain: String,
    pub search_url: String,
    pub timeout: Duration,
    pub wait_for: Duration,
}

/// Response body of the scrape API.
///
/// `extract` stays a raw JSON value here: the API may return it as an
/// object or as a JSON-encoded string, and the reconciler normalizes both.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapeResponse {
    #[serde(default)]
    pub success: Option<bool>,

    #[serde(default)]
    pub data: Option<ScrapeData>,

    #[serde(default)]
    pub error: Option<serde_json::Value>,

    #[serde(default)]
    pub message: Option<serde_json::Value>,
}

/// The `data` member of a scrape response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapeData {
    #[serde(default)]
    pub extract: Option<serde_json::Value>,

    #[serde(default)]
    pub markdown: Option<String>,
}
