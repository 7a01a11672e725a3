//! Client for the scrape/extraction API.
//!
//! One POST per domain: the API renders the search page and returns a
//! structured extraction alongside the page markdown. HTTP errors and
//! `success: false` bodies are both turned into [`SweepError::ScrapeFailed`].

use crate::config::SweepConfig;
use crate::error::SweepError;
use crate::types::{ScrapeRequest, ScrapeResponse};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

/// Instruction sent with every extraction request.
pub const EXTRACT_PROMPT: &str = "You are checking domain availability on a domain search results page. Return ONLY a JSON object with keys: availability (one of available/taken/unknown), price (string or null), and notes (string).";

/// Slack on top of the API-side timeout before the HTTP client gives up.
const HTTP_TIMEOUT_BUFFER: Duration = Duration::from_secs(10);

/// HTTP client for the scrape API.
#[derive(Clone)]
pub struct ScrapeClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl ScrapeClient {
    /// Create a client for the endpoint described by `config`.
    pub fn with_config(config: &SweepConfig) -> Result<Self, SweepError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout + config.wait_for + HTTP_TIMEOUT_BUFFER)
            .build()
            .map_err(|e| {
                SweepError::network_with_detail("Failed to create scrape HTTP client", e.to_string())
            })?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint(),
            api_key: config.api_key.clone(),
        })
    }

    /// Issue one scrape request.
    ///
    /// # Errors
    ///
    /// - `ScrapeFailed` with the HTTP status and raw body for non-2xx answers;
    ///   the message comes from the body's `error` or `message` field, or
    ///   falls back to `HTTP <status>`
    /// - `ScrapeFailed` without status when a 2xx body says `success: false`
    /// - `Network` for transport failures
    /// - `Parse` when a 2xx body is not a valid response document
    pub async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeResponse, SweepError> {
        let start_time = Instant::now();

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request_body(request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(
            domain = %request.domain,
            status = status.as_u16(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "scrape response"
        );

        let json: Option<Value> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = json
                .as_ref()
                .and_then(|j| message_field(j, "error").or_else(|| message_field(j, "message")))
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(SweepError::scrape(message, Some(status.as_u16()), Some(body)));
        }

        let json = json.ok_or_else(|| SweepError::Parse {
            message: "Scrape API returned a non-JSON body".to_string(),
            content: Some(body.clone()),
        })?;

        if json.get("success").and_then(Value::as_bool) == Some(false) {
            let message = message_field(&json, "error")
                .unwrap_or_else(|| "Unknown scrape API error".to_string());
            return Err(SweepError::scrape(message, None, Some(body)));
        }

        serde_json::from_value(json).map_err(|e| SweepError::Parse {
            message: format!("Unexpected scrape response shape: {}", e),
            content: Some(body),
        })
    }
}

/// Build the JSON body for one request.
pub fn request_body(request: &ScrapeRequest) -> Value {
    json!({
        "url": request.search_url,
        "formats": ["extract", "markdown"],
        "extract": {
            "prompt": EXTRACT_PROMPT,
            "schema": {
                "type": "object",
                "properties": {
                    "availability": {
                        "type": "string",
                        "enum": ["available", "taken", "unknown"]
                    },
                    "price": { "type": ["string", "null"] },
                    "notes": { "type": "string" }
                },
                "required": ["availability", "price", "notes"],
                "additionalProperties": false
            }
        },
        "waitFor": request.wait_for.as_millis() as u64,
        "timeout": request.timeout.as_millis() as u64,
    })
}

/// Non-empty string value of `key`, or its JSON text if it isn't a string.
fn message_field(json: &Value, key: &str) -> Option<String> {
    match json.get(key)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
