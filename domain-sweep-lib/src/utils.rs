//! Utility functions for domain list handling and timestamps.

use crate::error::SweepError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Parse a domain list.
///
/// One domain per line. Lines are trimmed, blank lines and `#` comments are
/// skipped, and duplicates are dropped case-insensitively while keeping the
/// first occurrence (and its casing) in place.
pub fn parse_domain_list(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut domains = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            domains.push(trimmed.to_string());
        }
    }

    domains
}

/// Read and parse a domain list file.
pub fn read_domain_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>, SweepError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        SweepError::file_error(
            path.to_string_lossy(),
            format!("Failed to read domain list: {}", e),
        )
    })?;
    Ok(parse_domain_list(&content))
}

/// Build the search page URL for a domain.
///
/// The domain is percent-encoded as a query value and appended to `base`,
/// which is expected to end with the query key (e.g. `...?q=`).
pub fn search_url_for(base: &str, domain: &str) -> String {
    format!("{}{}", base, urlencoding::encode(domain))
}

/// Current time as an RFC 3339 UTC string with millisecond precision.
pub fn utc_now_iso() -> String {
    format_timestamp(Utc::now())
}

/// Format a timestamp the way the ledger stores it.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
