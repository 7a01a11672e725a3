//! Configuration loading and resolution.
//!
//! Settings come from, in increasing precedence: built-in defaults, an
//! optional TOML file, a `.env` file found up the directory tree, and the
//! process environment. CLI flags are applied on top by the binary through
//! the `with_*` builders. The result is an immutable [`SweepConfig`] that is
//! passed by reference to every component; nothing else reads the
//! environment.

use crate::error::SweepError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: &str = "3002";
pub const DEFAULT_SCRAPE_PATH: &str = "/v1/scrape";
pub const DEFAULT_SEARCH_URL: &str = "https://instantdomainsearch.com/?q=";
pub const DEFAULT_CONCURRENCY: usize = 3;
pub const DEFAULT_DELAY_MS: u64 = 250;
pub const DEFAULT_WAIT_FOR_MS: u64 = 5000;
pub const DEFAULT_TIMEOUT_MS: u64 = 60000;
pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;
pub const MAX_CONCURRENCY: usize = 100;

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    /// Scrape API location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiConfig>,

    /// Concurrency, pacing and retry settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tuning: Option<TuningConfig>,

    /// Input and output locations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ApiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrape_path: Option<String>,

    /// Search page prefix; the encoded domain is appended to it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TuningConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_base_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OutputConfig {
    /// Directory holding the ledger and per-run outputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    /// Domain list to read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domains_file: Option<String>,
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to log which files were picked up
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, SweepError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(SweepError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            SweepError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content)
            .map_err(|e| SweepError::config(format!("Failed to parse TOML configuration: {}", e)))?;

        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// The XDG file is loaded first and local files override it.
    pub fn discover_and_load(&self) -> Result<FileConfig, SweepError> {
        let mut merged = FileConfig::default();

        for path in [self.get_xdg_config_path(), self.get_local_config_path()]
            .into_iter()
            .flatten()
        {
            let config = self.load_file(&path)?;
            if self.verbose {
                tracing::info!(path = %path.display(), "loaded config file");
            }
            merged = merge_configs(merged, config);
        }

        Ok(merged)
    }

    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./domain-sweep.toml", "./.domain-sweep.toml"]
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
            .map(Path::to_path_buf)
    }

    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("domain-sweep").join("config.toml");
        path.exists().then_some(path)
    }

    fn validate_config(&self, config: &FileConfig) -> Result<(), SweepError> {
        if let Some(concurrency) = config.tuning.as_ref().and_then(|t| t.concurrency) {
            if concurrency == 0 || concurrency > MAX_CONCURRENCY {
                return Err(SweepError::config(format!(
                    "Concurrency must be between 1 and {}",
                    MAX_CONCURRENCY
                )));
            }
        }

        if let Some(timeout) = config.tuning.as_ref().and_then(|t| t.timeout_ms) {
            if timeout == 0 {
                return Err(SweepError::config("timeout_ms must be greater than 0"));
            }
        }

        Ok(())
    }
}

/// Merge two configurations; values from `higher` win.
fn merge_configs(lower: FileConfig, higher: FileConfig) -> FileConfig {
    let api = match (lower.api, higher.api) {
        (Some(l), Some(h)) => Some(ApiConfig {
            url: h.url.or(l.url),
            scrape_path: h.scrape_path.or(l.scrape_path),
            search_url: h.search_url.or(l.search_url),
        }),
        (l, h) => h.or(l),
    };

    let tuning = match (lower.tuning, higher.tuning) {
        (Some(l), Some(h)) => Some(TuningConfig {
            concurrency: h.concurrency.or(l.concurrency),
            delay_ms: h.delay_ms.or(l.delay_ms),
            wait_for_ms: h.wait_for_ms.or(l.wait_for_ms),
            timeout_ms: h.timeout_ms.or(l.timeout_ms),
            retries: h.retries.or(l.retries),
            retry_base_delay_ms: h.retry_base_delay_ms.or(l.retry_base_delay_ms),
        }),
        (l, h) => h.or(l),
    };

    let output = match (lower.output, higher.output) {
        (Some(l), Some(h)) => Some(OutputConfig {
            dir: h.dir.or(l.dir),
            domains_file: h.domains_file.or(l.domains_file),
        }),
        (l, h) => h.or(l),
    };

    FileConfig {
        api,
        tuning,
        output,
    }
}

/// Walk up from `start` looking for a `.env` file.
pub fn find_dotenv(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(".env"))
        .find(|candidate| candidate.is_file())
}

/// Snapshot the variables relevant to a sweep.
///
/// Process values win; `.env` values only fill names that are unset or
/// empty in the process environment. The process environment is not
/// modified.
pub fn capture_env_vars(dotenv_path: Option<&Path>) -> HashMap<String, String> {
    let mut vars: HashMap<String, String> = env::vars_os()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (key, _) => {
                tracing::debug!(variable = ?key, "skipping non-UTF-8 environment entry");
                None
            }
        })
        .filter(|(_, value)| !value.is_empty())
        .collect();

    if let Some(path) = dotenv_path {
        match dotenvy::from_path_iter(path) {
            Ok(iter) => {
                for item in iter {
                    match item {
                        Ok((key, value)) => {
                            let key = key.trim_start_matches('\u{feff}').to_string();
                            if !value.is_empty() {
                                vars.entry(key).or_insert(value);
                            }
                        }
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "skipping malformed .env line");
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read .env file");
            }
        }
    }

    vars
}

/// Environment-derived settings, still unresolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub port: Option<String>,
    pub scrape_path: Option<String>,
    pub concurrency: Option<usize>,
    pub delay_ms: Option<u64>,
    pub wait_for_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub retries: Option<u32>,
}

impl EnvConfig {
    /// Interpret a variable snapshot.
    ///
    /// Empty values count as unset. Values that fail to parse are logged and
    /// ignored so the lower layers apply.
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            api_key: get("FIRECRAWL_API_KEY").or_else(|| get("TEST_API_KEY")),
            api_url: get("FIRECRAWL_API_URL"),
            port: get("PORT"),
            scrape_path: get("FIRECRAWL_SCRAPE_PATH"),
            concurrency: parse_var("DOMAIN_CHECK_CONCURRENCY", get("DOMAIN_CHECK_CONCURRENCY")),
            delay_ms: parse_var("DOMAIN_CHECK_DELAY_MS", get("DOMAIN_CHECK_DELAY_MS")),
            wait_for_ms: parse_var("DOMAIN_CHECK_WAITFOR_MS", get("DOMAIN_CHECK_WAITFOR_MS")),
            timeout_ms: parse_var("DOMAIN_CHECK_TIMEOUT_MS", get("DOMAIN_CHECK_TIMEOUT_MS")),
            retries: parse_var("DOMAIN_CHECK_RETRIES", get("DOMAIN_CHECK_RETRIES")),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring unparsable value");
            None
        }
    }
}

/// Fully resolved sweep settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub api_key: String,

    /// Base URL of the scrape API, without trailing slash
    pub api_url: String,

    pub scrape_path: String,

    /// Search page prefix; the encoded domain is appended to it
    pub search_url: String,

    /// Maximum number of domains in flight (1-100)
    pub concurrency: usize,

    /// Pause after each domain, success or failure
    pub request_delay: Duration,

    /// How long the scrape API waits for the page to settle
    pub wait_for: Duration,

    /// Per-request timeout handed to the scrape API
    pub timeout: Duration,

    /// Extra attempts after the first failure
    pub retries: u32,

    /// Backoff base; attempt n waits `base * 2^n`
    pub retry_base_delay: Duration,
}

impl SweepConfig {
    /// Resolve file and environment layers into a final configuration.
    ///
    /// Fails with [`SweepError::MissingApiKey`] when no key is available.
    pub fn resolve(file: &FileConfig, env: &EnvConfig) -> Result<Self, SweepError> {
        let api_key = env.api_key.clone().ok_or(SweepError::MissingApiKey)?;

        let file_api = file.api.clone().unwrap_or_default();
        let tuning = file.tuning.clone().unwrap_or_default();

        let default_api_url = format!(
            "http://localhost:{}",
            env.port.as_deref().unwrap_or(DEFAULT_PORT)
        );
        let api_url = env
            .api_url
            .clone()
            .or(file_api.url)
            .unwrap_or(default_api_url)
            .trim_end_matches('/')
            .to_string();

        let config = Self {
            api_key,
            api_url,
            scrape_path: env
                .scrape_path
                .clone()
                .or(file_api.scrape_path)
                .unwrap_or_else(|| DEFAULT_SCRAPE_PATH.to_string()),
            search_url: file_api
                .search_url
                .unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string()),
            concurrency: DEFAULT_CONCURRENCY,
            request_delay: Duration::from_millis(
                env.delay_ms.or(tuning.delay_ms).unwrap_or(DEFAULT_DELAY_MS),
            ),
            wait_for: Duration::from_millis(
                env.wait_for_ms
                    .or(tuning.wait_for_ms)
                    .unwrap_or(DEFAULT_WAIT_FOR_MS),
            ),
            timeout: Duration::from_millis(
                env.timeout_ms
                    .or(tuning.timeout_ms)
                    .unwrap_or(DEFAULT_TIMEOUT_MS)
                    .max(1),
            ),
            retries: env.retries.or(tuning.retries).unwrap_or(DEFAULT_RETRIES),
            retry_base_delay: Duration::from_millis(
                tuning
                    .retry_base_delay_ms
                    .unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS),
            ),
        };

        Ok(config.with_concurrency(
            env.concurrency
                .or(tuning.concurrency)
                .unwrap_or(DEFAULT_CONCURRENCY),
        ))
    }

    /// Full scrape endpoint URL.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.api_url, self.scrape_path)
    }

    /// Set concurrency, clamped to 1-100.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_wait_for(mut self, wait_for: Duration) -> Self {
        self.wait_for = wait_for;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

}

/// Read the file and environment layers.
///
/// An explicit config file replaces discovery. The `.env` file is searched
/// from the current directory upward.
pub fn load_layers(
    config_file: Option<&Path>,
    verbose: bool,
) -> Result<(FileConfig, EnvConfig), SweepError> {
    let manager = ConfigManager::new(verbose);
    let file = match config_file {
        Some(path) => manager.load_file(path)?,
        None => manager.discover_and_load()?,
    };

    let dotenv = env::current_dir()
        .ok()
        .and_then(|cwd| find_dotenv(&cwd));
    if let Some(path) = &dotenv {
        tracing::debug!(path = %path.display(), "using .env file");
    }

    let env = EnvConfig::from_vars(&capture_env_vars(dotenv.as_deref()));
    Ok((file, env))
}

/// Load and resolve every configuration layer below CLI flags.
pub fn load_config(config_file: Option<&Path>, verbose: bool) -> Result<SweepConfig, SweepError> {
    let (file, env) = load_layers(config_file, verbose)?;
    SweepConfig::resolve(&file, &env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_only_key_set() {
        let env = EnvConfig::from_vars(&vars(&[("FIRECRAWL_API_KEY", "fc-123")]));
        let config = SweepConfig::resolve(&FileConfig::default(), &env).unwrap();

        assert_eq!(config.api_key, "fc-123");
        assert_eq!(config.api_url, "http://localhost:3002");
        assert_eq!(config.scrape_path, "/v1/scrape");
        assert_eq!(config.endpoint(), "http://localhost:3002/v1/scrape");
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.request_delay, Duration::from_millis(250));
        assert_eq!(config.wait_for, Duration::from_millis(5000));
        assert_eq!(config.timeout, Duration::from_millis(60000));
        assert_eq!(config.retries, 2);
        assert_eq!(config.retry_base_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_missing_api_key() {
        let env = EnvConfig::from_vars(&vars(&[("FIRECRAWL_API_KEY", "")]));
        let err = SweepConfig::resolve(&FileConfig::default(), &env).unwrap_err();
        assert!(matches!(err, SweepError::MissingApiKey));
    }

    #[test]
    fn test_second_key_name_used_when_first_empty() {
        let env = EnvConfig::from_vars(&vars(&[
            ("FIRECRAWL_API_KEY", ""),
            ("TEST_API_KEY", "test-key"),
        ]));
        assert_eq!(env.api_key.as_deref(), Some("test-key"));
    }

    #[test]
    fn test_port_and_url_overrides() {
        let env = EnvConfig::from_vars(&vars(&[("TEST_API_KEY", "k"), ("PORT", "4000")]));
        let config = SweepConfig::resolve(&FileConfig::default(), &env).unwrap();
        assert_eq!(config.api_url, "http://localhost:4000");

        let env = EnvConfig::from_vars(&vars(&[
            ("TEST_API_KEY", "k"),
            ("PORT", "4000"),
            ("FIRECRAWL_API_URL", "https://api.example.dev/"),
        ]));
        let config = SweepConfig::resolve(&FileConfig::default(), &env).unwrap();
        assert_eq!(config.api_url, "https://api.example.dev");
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let env = EnvConfig::from_vars(&vars(&[
            ("TEST_API_KEY", "k"),
            ("DOMAIN_CHECK_CONCURRENCY", "lots"),
            ("DOMAIN_CHECK_RETRIES", "5"),
        ]));
        assert_eq!(env.concurrency, None);

        let file = FileConfig {
            tuning: Some(TuningConfig {
                concurrency: Some(7),
                retries: Some(1),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = SweepConfig::resolve(&file, &env).unwrap();
        assert_eq!(config.concurrency, 7); // file value survives bad env value
        assert_eq!(config.retries, 5); // env beats file
    }

    #[test]
    fn test_concurrency_clamped() {
        let env = EnvConfig::from_vars(&vars(&[
            ("TEST_API_KEY", "k"),
            ("DOMAIN_CHECK_CONCURRENCY", "0"),
        ]));
        let config = SweepConfig::resolve(&FileConfig::default(), &env).unwrap();
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.with_concurrency(500).concurrency, 100);
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[api]
url = "http://scraper.internal:3002"
search_url = "https://search.example/?q="

[tuning]
concurrency = 8
delay_ms = 100
retries = 4

[output]
dir = "ledger"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(config_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let manager = ConfigManager::new(false);
        let file = manager.load_file(temp_file.path()).unwrap();
        assert_eq!(file.output.as_ref().unwrap().dir.as_deref(), Some("ledger"));

        let env = EnvConfig::from_vars(&vars(&[("TEST_API_KEY", "k")]));
        let config = SweepConfig::resolve(&file, &env).unwrap();
        assert_eq!(config.api_url, "http://scraper.internal:3002");
        assert_eq!(config.search_url, "https://search.example/?q=");
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.request_delay, Duration::from_millis(100));
        assert_eq!(config.retries, 4);
    }

    #[test]
    fn test_invalid_concurrency_in_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[tuning]\nconcurrency = 0\n").unwrap();
        temp_file.flush().unwrap();

        let manager = ConfigManager::new(false);
        assert!(matches!(
            manager.load_file(temp_file.path()),
            Err(SweepError::Config { .. })
        ));
    }

    #[test]
    fn test_merge_configs() {
        let lower = FileConfig {
            tuning: Some(TuningConfig {
                concurrency: Some(10),
                delay_ms: Some(50),
                ..Default::default()
            }),
            ..Default::default()
        };
        let higher = FileConfig {
            tuning: Some(TuningConfig {
                concurrency: Some(25),
                ..Default::default()
            }),
            ..Default::default()
        };

        let merged = merge_configs(lower, higher);
        let tuning = merged.tuning.unwrap();
        assert_eq!(tuning.concurrency, Some(25)); // Higher wins
        assert_eq!(tuning.delay_ms, Some(50)); // Lower preserved
    }

    #[test]
    fn test_dotenv_fills_only_unset_values() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            dir.path().join(".env"),
            "DOMAIN_SWEEP_TEST_ONLY_VAR=\"from-dotenv\"\nPATH=should-not-win\n",
        )
        .unwrap();

        let found = find_dotenv(&nested).unwrap();
        assert_eq!(found, dir.path().join(".env"));

        let vars = capture_env_vars(Some(&found));
        assert_eq!(
            vars.get("DOMAIN_SWEEP_TEST_ONLY_VAR").map(String::as_str),
            Some("from-dotenv")
        );
        assert_ne!(vars.get("PATH").map(String::as_str), Some("should-not-win"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_environment_entry_is_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        env::set_var(
            "DOMAIN_SWEEP_TEST_LATIN1_VAR",
            OsStr::from_bytes(b"caf\xe9"),
        );
        env::set_var("DOMAIN_SWEEP_TEST_PLAIN_VAR", "plain");

        let vars = capture_env_vars(None);
        assert!(!vars.contains_key("DOMAIN_SWEEP_TEST_LATIN1_VAR"));
        assert_eq!(
            vars.get("DOMAIN_SWEEP_TEST_PLAIN_VAR").map(String::as_str),
            Some("plain")
        );

        env::remove_var("DOMAIN_SWEEP_TEST_LATIN1_VAR");
        env::remove_var("DOMAIN_SWEEP_TEST_PLAIN_VAR");
    }
}
