//! Available-domains snapshot derived from the run history.

use crate::error::SweepError;
use crate::ledger::{io_error, write_file};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Latest recorded outcome for one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LatestOutcome {
    ok: bool,
    available: bool,
}

/// Lower-cased domains whose most recent outcome is a successful
/// `available`, sorted.
///
/// Entries are visited oldest run first, so a later run's result for a
/// domain replaces any earlier one regardless of casing.
pub fn available_domains(history: &[Value]) -> Vec<String> {
    let mut latest: HashMap<String, LatestOutcome> = HashMap::new();

    let results = history
        .iter()
        .filter_map(|run| run.get("results").and_then(Value::as_array))
        .flatten();

    for result in results {
        let Some(domain) = result
            .get("domain")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|d| !d.is_empty())
        else {
            continue;
        };

        latest.insert(
            domain.to_lowercase(),
            LatestOutcome {
                ok: result.get("ok").and_then(Value::as_bool).unwrap_or(false),
                available: result.get("availability").and_then(Value::as_str)
                    == Some("available"),
            },
        );
    }

    let mut available: Vec<String> = latest
        .into_iter()
        .filter(|(_, outcome)| outcome.ok && outcome.available)
        .map(|(domain, _)| domain)
        .collect();
    available.sort();
    available
}

/// Write one domain per line; an empty list gives an empty file.
pub fn write_available_domains(path: &Path, domains: &[String]) -> Result<(), SweepError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, "create output directory", e))?;
    }

    let mut content = domains.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    write_file(path, &content)
}
