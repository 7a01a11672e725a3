//! Cross-run result ledger.
//!
//! The ledger lives in the output directory:
//!
//! - `results.json`: every run ever recorded, as a JSON array of run records
//! - `results.csv`: one row per (run, domain), append-only
//! - `runs/<runId>/results.{json,csv}`: a single run's results
//!
//! History is kept as raw JSON values so entries written by older versions
//! survive a rewrite untouched. The CSV carries a versioned header; files
//! with the legacy header are migrated once, and a known corruption where
//! one row is glued onto the previous one is split back apart. Rows are
//! never appended under a header the ledger does not recognise.

use crate::error::SweepError;
use crate::types::{DomainResult, RunRecord};
use chrono::DateTime;
use csv::Terminator;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Columns of the cross-run CSV.
pub const LEDGER_CSV_HEADER: [&str; 11] = [
    "runId",
    "runStartedAt",
    "runFinishedAt",
    "domain",
    "availability",
    "price",
    "notes",
    "ok",
    "error",
    "searchUrl",
    "timestamp",
];

/// Columns of a per-run CSV, and of the cross-run CSV before run columns
/// were introduced.
pub const RUN_CSV_HEADER: [&str; 8] = [
    "domain",
    "availability",
    "price",
    "notes",
    "ok",
    "error",
    "searchUrl",
    "timestamp",
];

lazy_static! {
    /// A run id followed by an ISO timestamp: the start of a ledger row.
    static ref GLUED_ROW_START: Regex =
        Regex::new(r"(\d{8}-\d{6},20\d{2}-\d{2}-\d{2}T)").unwrap();
}

/// File locations inside an output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerPaths {
    pub out_dir: PathBuf,
    pub history_json: PathBuf,
    pub history_csv: PathBuf,
    pub available_txt: PathBuf,
    pub runs_dir: PathBuf,
}

impl LedgerPaths {
    pub fn new<P: AsRef<Path>>(out_dir: P) -> Self {
        let out_dir = out_dir.as_ref().to_path_buf();
        Self {
            history_json: out_dir.join("results.json"),
            history_csv: out_dir.join("results.csv"),
            available_txt: out_dir.join("available-domains.txt"),
            runs_dir: out_dir.join("runs"),
            out_dir,
        }
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.runs_dir.join(run_id)
    }

    pub fn run_json(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("results.json")
    }

    pub fn run_csv(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("results.csv")
    }
}

/// The domains of one invocation split against the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPlan {
    /// Domains never checked before, in input order
    pub to_check: Vec<String>,
    /// Domains skipped because a prior run already recorded them
    pub skipped: usize,
    pub total: usize,
}

impl SweepPlan {
    pub fn is_complete(&self) -> bool {
        self.to_check.is_empty()
    }
}

/// Persistent record of every run.
#[derive(Debug)]
pub struct RunLedger {
    paths: LedgerPaths,
    history: Vec<Value>,
}

impl RunLedger {
    /// Open the ledger in `out_dir`, loading prior history.
    ///
    /// Nothing is created on disk until a run is recorded.
    pub fn open<P: AsRef<Path>>(out_dir: P) -> Self {
        let paths = LedgerPaths::new(out_dir);
        let history = load_history(&paths.history_json);
        tracing::info!(
            path = %paths.history_json.display(),
            runs = history.len(),
            "loaded run history"
        );
        Self { paths, history }
    }

    pub fn paths(&self) -> &LedgerPaths {
        &self.paths
    }

    /// Every recorded run, oldest first.
    pub fn history(&self) -> &[Value] {
        &self.history
    }

    /// Lower-cased domains that appear in any recorded run.
    pub fn checked_domains(&self) -> HashSet<String> {
        checked_domains(&self.history)
    }

    /// Drop domains that a prior run already checked.
    pub fn plan(&self, domains: &[String]) -> SweepPlan {
        let checked = self.checked_domains();
        let to_check: Vec<String> = domains
            .iter()
            .filter(|d| !checked.contains(&d.trim().to_lowercase()))
            .cloned()
            .collect();

        SweepPlan {
            skipped: domains.len() - to_check.len(),
            total: domains.len(),
            to_check,
        }
    }

    /// Bring the cross-run CSV to the current schema.
    ///
    /// Creates the file with the current header if it is missing or empty,
    /// migrates the legacy header, verifies the header and then repairs
    /// glued rows. A file with an unrecognised header is left untouched and
    /// reported as [`SweepError::LedgerSchema`].
    pub fn prepare_csv(&self) -> Result<(), SweepError> {
        fs::create_dir_all(&self.paths.out_dir)
            .map_err(|e| io_error(&self.paths.out_dir, "create output directory", e))?;
        prepare_ledger_csv(&self.paths.history_csv)
    }

    /// Persist a finished run.
    ///
    /// Writes the per-run JSON and CSV, rewrites the cross-run JSON with the
    /// run appended, then appends the run's rows to the cross-run CSV.
    pub fn record_run(&mut self, run: &RunRecord) -> Result<(), SweepError> {
        let run_dir = self.paths.run_dir(&run.run_id);
        fs::create_dir_all(&run_dir).map_err(|e| io_error(&run_dir, "create run directory", e))?;

        write_json(&self.paths.run_json(&run.run_id), &serde_json::to_value(run)?)?;
        write_file(&self.paths.run_csv(&run.run_id), &run_csv(&run.results)?)?;

        let mut history = self.history.clone();
        history.push(serde_json::to_value(run)?);
        write_json(&self.paths.history_json, &Value::Array(history.clone()))?;
        self.history = history;

        append_ledger_rows(&self.paths.history_csv, run)?;

        tracing::info!(
            run_id = %run.run_id,
            results = run.results.len(),
            "recorded run"
        );
        Ok(())
    }
}

/// Load the cross-run history.
///
/// A legacy file holding a single run object is wrapped into a one-element
/// history. Missing or unreadable files give an empty history.
pub fn load_history(path: &Path) -> Vec<Value> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read run history, starting empty");
            return Vec::new();
        }
    };

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Array(runs)) => runs,
        Ok(run @ Value::Object(_)) if run.get("results").map_or(false, Value::is_array) => {
            tracing::warn!(path = %path.display(), "wrapping legacy single-run history");
            vec![run]
        }
        Ok(_) => {
            tracing::warn!(path = %path.display(), "unexpected run history shape, starting empty");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unparsable run history, starting empty");
            Vec::new()
        }
    }
}

/// Lower-cased, trimmed domains found in any run's results.
pub fn checked_domains(history: &[Value]) -> HashSet<String> {
    history
        .iter()
        .filter_map(|run| run.get("results").and_then(Value::as_array))
        .flatten()
        .filter_map(|result| result.get("domain").and_then(Value::as_str))
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Derive a filesystem-safe run id (`YYYYMMDD-HHMMSS`) from an RFC 3339
/// timestamp. Sub-second precision and the offset are dropped.
pub fn run_id_from_timestamp(timestamp: &str) -> Result<String, SweepError> {
    let parsed = DateTime::parse_from_rfc3339(timestamp).map_err(|e| SweepError::Parse {
        message: format!("Invalid run timestamp '{}': {}", timestamp, e),
        content: None,
    })?;
    Ok(parsed.naive_local().format("%Y%m%d-%H%M%S").to_string())
}

/// Serialize records with standard CSV quoting, one `\n`-terminated line
/// per record.
fn csv_text<I, R>(records: I) -> Result<String, SweepError>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for record in records {
        writer.write_record(record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| SweepError::csv(e.to_string()))
}

/// The eight per-result columns. Outcome columns are blank for failures.
pub fn result_fields(result: &DomainResult) -> Vec<String> {
    let outcome = result.extracted.as_ref().filter(|_| result.ok);
    vec![
        result.domain.clone(),
        outcome
            .map(|e| e.availability.to_string())
            .unwrap_or_default(),
        outcome.and_then(|e| e.price.clone()).unwrap_or_default(),
        outcome.map(|e| e.notes.clone()).unwrap_or_default(),
        result.ok.to_string(),
        if result.ok {
            String::new()
        } else {
            result.error.clone().unwrap_or_default()
        },
        result.search_url.clone(),
        result.timestamp.clone(),
    ]
}

/// Fields of a cross-run CSV row: the run columns, then the result columns.
pub fn ledger_record(run: &RunRecord, result: &DomainResult) -> Vec<String> {
    let mut fields = vec![
        run.run_id.clone(),
        run.started_at.clone(),
        run.finished_at.clone(),
    ];
    fields.extend(result_fields(result));
    fields
}

/// Cross-run CSV rows for every result of a run.
pub fn ledger_rows(run: &RunRecord) -> Result<String, SweepError> {
    csv_text(run.results.iter().map(|result| ledger_record(run, result)))
}

/// Contents of a per-run CSV file.
pub fn run_csv(results: &[DomainResult]) -> Result<String, SweepError> {
    let header: Vec<String> = RUN_CSV_HEADER.iter().map(|c| c.to_string()).collect();
    csv_text(std::iter::once(header).chain(results.iter().map(result_fields)))
}

fn first_line(content: &str) -> &str {
    content.lines().next().unwrap_or("").trim()
}

/// Rewrite a legacy-header CSV to the current schema.
///
/// Returns `None` unless the first line is exactly the legacy header. Blank
/// lines are dropped and each data row is prefixed with empty run columns.
pub fn migrate_legacy_header(content: &str) -> Option<String> {
    if first_line(content) != RUN_CSV_HEADER.join(",") {
        return None;
    }

    let mut out = LEDGER_CSV_HEADER.join(",");
    out.push('\n');
    for line in content.lines().skip(1).filter(|l| !l.is_empty()) {
        out.push_str(",,,");
        out.push_str(line);
        out.push('\n');
    }
    Some(out)
}

/// Split rows that had the next row glued onto their end.
///
/// Best-effort repair of one known corruption: a run id and ISO timestamp
/// appearing mid-line mark where a missing line break belongs. Returns
/// `None` when nothing needed splitting. Applying it twice gives the same
/// result as applying it once.
pub fn repair_glued_rows(content: &str) -> Option<String> {
    let mut changed = false;
    let mut lines = Vec::new();

    for line in content.lines() {
        let mut start = 0;
        for m in GLUED_ROW_START.find_iter(line) {
            if m.start() > start {
                lines.push(&line[start..m.start()]);
                start = m.start();
                changed = true;
            }
        }
        lines.push(&line[start..]);
    }

    if !changed {
        return None;
    }

    let mut repaired = lines.join("\n");
    repaired.push('\n');
    Some(repaired)
}

/// Fail unless the file's first line is the current ledger header.
pub fn verify_ledger_header(path: &Path) -> Result<String, SweepError> {
    let content = read_file(path)?;
    let found = first_line(&content);
    if found != LEDGER_CSV_HEADER.join(",") {
        return Err(SweepError::ledger_schema(
            path.to_string_lossy(),
            found.to_string(),
        ));
    }
    Ok(content)
}

/// Create, migrate, verify and repair the cross-run CSV at `path`.
pub fn prepare_ledger_csv(path: &Path) -> Result<(), SweepError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(io_error(path, "read ledger CSV", e)),
    };

    if content.trim().is_empty() {
        let mut header = LEDGER_CSV_HEADER.join(",");
        header.push('\n');
        return write_file(path, &header);
    }

    if let Some(migrated) = migrate_legacy_header(&content) {
        tracing::info!(path = %path.display(), "migrating legacy CSV header");
        write_file(path, &migrated)?;
    }

    let content = verify_ledger_header(path)?;

    if let Some(repaired) = repair_glued_rows(&content) {
        tracing::warn!(path = %path.display(), "split glued rows in ledger CSV");
        write_file(path, &repaired)?;
    }

    Ok(())
}

/// Append a run's rows to the cross-run CSV after re-checking its header.
pub fn append_ledger_rows(path: &Path, run: &RunRecord) -> Result<(), SweepError> {
    prepare_ledger_csv(path)?;
    let existing = verify_ledger_header(path)?;

    if run.results.is_empty() {
        return Ok(());
    }

    let mut data = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        data.push('\n');
    }
    data.push_str(&ledger_rows(run)?);

    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| io_error(path, "open ledger CSV", e))?;
    file.write_all(data.as_bytes())
        .map_err(|e| io_error(path, "append to ledger CSV", e))
}

fn read_file(path: &Path) -> Result<String, SweepError> {
    fs::read_to_string(path).map_err(|e| io_error(path, "read", e))
}

pub(crate) fn write_file(path: &Path, content: &str) -> Result<(), SweepError> {
    fs::write(path, content).map_err(|e| io_error(path, "write", e))
}

fn write_json(path: &Path, value: &Value) -> Result<(), SweepError> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    write_file(path, &text)
}

pub(crate) fn io_error(path: &Path, action: &str, e: std::io::Error) -> SweepError {
    SweepError::file_error(path.to_string_lossy(), format!("Failed to {}: {}", action, e))
}
