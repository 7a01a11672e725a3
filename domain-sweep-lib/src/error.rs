//! Error handling for domain sweeps.
//!
//! This module defines the error type shared by every stage of a sweep, from
//! scrape API failures to ledger schema mismatches.

use thiserror::Error;

/// Main error type for domain sweep operations.
///
/// Per-domain scrape failures are normally captured into a failed
/// `DomainResult` rather than bubbled up; the remaining variants are fatal
/// to the run that hits them.
#[derive(Debug, Clone, Error)]
pub enum SweepError {
    /// The scrape API answered with a non-2xx status or `success: false`.
    ///
    /// The display form is the bare message, which is what ends up in the
    /// ledger's `error` column.
    #[error("{message}")]
    ScrapeFailed {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    /// Transport-level errors (connection refused, timeout, TLS, ...)
    #[error(
        "Network error: {message}{}",
        detail.as_ref().map(|d| format!(" ({})", d)).unwrap_or_default()
    )]
    Network {
        message: String,
        detail: Option<String>,
    },

    /// JSON decoding errors
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        content: Option<String>,
    },

    /// Invalid settings in a config file, env var or flag
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Neither API key variable is set
    #[error("Missing FIRECRAWL_API_KEY (or TEST_API_KEY) environment variable")]
    MissingApiKey,

    /// File I/O errors on the domain list or ledger files
    #[error("File error at '{path}': {message}")]
    File { path: String, message: String },

    /// CSV serialization errors
    #[error("CSV error: {message}")]
    Csv { message: String },

    /// The running CSV carries a header we do not recognise
    #[error("Unexpected CSV header in {path}; refusing to append (found: '{found}')")]
    LedgerSchema { path: String, found: String },
}

impl SweepError {
    /// Create a scrape failure carrying the HTTP status and raw body.
    pub fn scrape<M: Into<String>>(message: M, status: Option<u16>, body: Option<String>) -> Self {
        Self::ScrapeFailed {
            message: message.into(),
            status,
            body,
        }
    }

    /// Create a new network error with the underlying cause.
    pub fn network_with_detail<M: Into<String>, S: Into<String>>(message: M, detail: S) -> Self {
        Self::Network {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::File {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a CSV serialization error.
    pub fn csv<M: Into<String>>(message: M) -> Self {
        Self::Csv {
            message: message.into(),
        }
    }

    /// Create a ledger schema mismatch error.
    pub fn ledger_schema<P: Into<String>, F: Into<String>>(path: P, found: F) -> Self {
        Self::LedgerSchema {
            path: path.into(),
            found: found.into(),
        }
    }

    /// HTTP status attached to a scrape failure, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ScrapeFailed { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SweepError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network_with_detail("Request timed out", err.to_string())
        } else if err.is_connect() {
            Self::network_with_detail("Connection failed", err.to_string())
        } else {
            Self::network_with_detail("HTTP request failed", err.to_string())
        }
    }
}

impl From<serde_json::Error> for SweepError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            message: format!("JSON parsing failed: {}", err),
            content: None,
        }
    }
}

impl From<csv::Error> for SweepError {
    fn from(err: csv::Error) -> Self {
        Self::csv(err.to_string())
    }
}
