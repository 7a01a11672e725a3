//! Reconciliation of structured extraction and markdown cues.
//!
//! The scrape API returns two views of the same search page: a structured
//! extraction produced from a schema, and the rendered markdown. The
//! extraction is the primary signal. The markdown heuristic only fills in an
//! `unknown` availability and vetoes prices it cannot place next to the
//! domain being checked. It never overrides a known structured availability,
//! even when the two disagree.

use crate::types::{Availability, ExtractedResult};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

/// Lines before the domain line included in the cue window.
const WINDOW_BEFORE: usize = 10;
/// Lines from the domain line onward included in the cue window.
const WINDOW_AFTER: usize = 40;
/// Lines from the domain line scanned for its price.
const PRICE_SCAN_LINES: usize = 12;

const NOTE_DROPPED_PRICE: &str = "Dropped unverified price";
const NOTE_REPLACED_PRICE: &str = "Replaced price with domain-local price";

lazy_static! {
    static ref PRICE_TOKEN: Regex = Regex::new(r"\$[\d,]+(?:\.\d{2})?").unwrap();
    static ref LEADING_LINK: Regex = Regex::new(r"^\[[^\]]+\]\([^)]*\)").unwrap();
}

/// The structured extraction after normalization, before reconciliation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedExtract {
    pub availability: Option<Value>,
    pub status: Option<Value>,
    pub price: Option<Value>,
    pub notes: Option<Value>,
}

impl NormalizedExtract {
    fn from_object(value: &Value) -> Self {
        let field = |key: &str| value.get(key).filter(|v| !v.is_null()).cloned();
        Self {
            availability: field("availability"),
            status: field("status"),
            price: field("price"),
            notes: field("notes"),
        }
    }

    /// Seed `(availability, price, notes)` from the extraction alone.
    pub fn seed(&self) -> ExtractedResult {
        // `availability` wins over the legacy `status` key unless it is empty
        let label = [&self.availability, &self.status]
            .into_iter()
            .flatten()
            .find(|v| is_truthy(v));

        let availability = label
            .and_then(Value::as_str)
            .and_then(Availability::from_label)
            .unwrap_or(Availability::Unknown);

        let price = self.price.as_ref().map(|p| match p {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });

        let notes = match &self.notes {
            None => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        ExtractedResult {
            availability,
            price,
            notes,
        }
    }
}

/// Normalize the raw `extract` member of a scrape response.
///
/// Strings are parsed as JSON; a string that isn't JSON becomes freeform
/// notes with an `unknown` status. Objects are used as-is. Absent or empty
/// payloads yield `None`.
pub fn normalize_extract(raw: Option<&Value>) -> Option<NormalizedExtract> {
    let raw = raw.filter(|v| is_truthy(v))?;

    match raw {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(parsed) => Some(NormalizedExtract::from_object(&parsed)),
            Err(_) => Some(NormalizedExtract {
                status: Some(Value::String("unknown".to_string())),
                notes: Some(Value::String(text.clone())),
                ..Default::default()
            }),
        },
        Value::Object(_) => Some(NormalizedExtract::from_object(raw)),
        _ => None,
    }
}

/// What the markdown alone says about one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownInference {
    pub availability: Availability,
    pub price: Option<String>,
    pub notes: String,
}

/// Infer availability and a domain-local price from page markdown.
///
/// Only text near the first line mentioning `domain` is considered, so
/// marketing copy and other listings on the page don't leak in.
pub fn infer_from_markdown(markdown: &str, domain: &str) -> MarkdownInference {
    let lines: Vec<&str> = markdown.lines().collect();
    let needle = format!("[{}](", domain);

    let Some(domain_line) = lines
        .iter()
        .position(|l| l.contains(&needle) || l.contains(domain))
    else {
        return MarkdownInference {
            availability: Availability::Unknown,
            price: None,
            notes: "Domain not found in markdown".to_string(),
        };
    };

    let window_start = domain_line.saturating_sub(WINDOW_BEFORE);
    let window_end = (domain_line + WINDOW_AFTER).min(lines.len());
    let window = lines[window_start..window_end].join("\n").to_lowercase();

    let mut availability = Availability::Unknown;
    if window.contains("make offer") || window.contains("whois") {
        availability = Availability::Taken;
    }
    // Checked last so it wins over the taken cues in the same window
    if window.contains("continue") {
        availability = Availability::Available;
    }

    let price = domain_local_price(&lines, domain_line, domain);

    let mut notes = Vec::new();
    match availability {
        Availability::Available => notes.push("Found 'Continue' near domain"),
        Availability::Taken => notes.push("Found 'Make offer/WHOIS' near domain"),
        Availability::Unknown => {}
    }
    notes.push(if price.is_some() {
        "Found price near domain"
    } else {
        "No domain-specific price found"
    });

    MarkdownInference {
        availability,
        price,
        notes: notes.join("; "),
    }
}

/// First `$` amount at or after the domain line, unless another domain's
/// link shows up first.
fn domain_local_price(lines: &[&str], domain_line: usize, domain: &str) -> Option<String> {
    let scan_end = (domain_line + PRICE_SCAN_LINES).min(lines.len());

    for (i, raw) in lines.iter().enumerate().take(scan_end).skip(domain_line) {
        let line = raw.trim();

        if i != domain_line
            && LEADING_LINK.is_match(line)
            && line.contains('.')
            && !line.contains(domain)
        {
            return None;
        }

        if let Some(m) = PRICE_TOKEN.find(line) {
            return Some(m.as_str().to_string());
        }
    }

    None
}

/// Combine the structured extraction and the markdown into one outcome.
pub fn reconcile(domain: &str, extract: Option<&Value>, markdown: Option<&str>) -> ExtractedResult {
    let mut result = normalize_extract(extract)
        .map(|e| e.seed())
        .unwrap_or_default();

    let Some(markdown) = markdown.filter(|m| !m.is_empty()) else {
        return result;
    };

    let fallback = infer_from_markdown(markdown, domain);

    if result.availability == Availability::Unknown {
        result.availability = fallback.availability;
    }

    match (&result.price, &fallback.price) {
        (None, _) => result.price = fallback.price.clone(),
        (Some(_), None) => {
            result.price = None;
            append_note(&mut result.notes, NOTE_DROPPED_PRICE);
        }
        (Some(structured), Some(local)) if structured != local => {
            result.price = Some(local.clone());
            append_note(&mut result.notes, NOTE_REPLACED_PRICE);
        }
        _ => {}
    }

    if result.notes.is_empty() {
        result.notes = fallback.notes;
    }

    result
}

fn append_note(notes: &mut String, note: &str) {
    if !notes.is_empty() {
        notes.push_str("; ");
    }
    notes.push_str(note);
}

/// JSON truthiness: null, false, 0 and "" are false.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
