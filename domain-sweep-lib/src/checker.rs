//! Main sweep implementation.
//!
//! This module provides [`DomainSweeper`], which runs the per-domain pipeline
//! (scrape with retries, then reconcile) over a work list and records the
//! run in the ledger.

use crate::concurrent::ConcurrentProcessor;
use crate::config::SweepConfig;
use crate::error::SweepError;
use crate::ledger::{run_id_from_timestamp, RunLedger, SweepPlan};
use crate::reconcile::{is_truthy, reconcile};
use crate::retry::RetryPolicy;
use crate::scrape::ScrapeClient;
use crate::types::{DomainResult, RunRecord, ScrapeRequest};
use crate::utils::{search_url_for, utc_now_iso};
use crate::writer::{available_domains, write_available_domains};

/// Outcome of one sweep.
#[derive(Debug, Clone)]
pub struct SweepReport {
    /// The recorded run; `None` when every domain had already been checked
    pub run: Option<RunRecord>,
    pub total: usize,
    pub skipped: usize,
    /// Snapshot of available domains across all runs
    pub available_domains: Vec<String>,
}

/// Checks domains through the scrape API and records the results.
///
/// # Example
///
/// ```rust,no_run
/// use domain_sweep_lib::{DomainSweeper, RunLedger, SweepConfig};
///
/// # async fn run(config: SweepConfig, domains: Vec<String>) -> domain_sweep_lib::Result<()> {
/// let sweeper = DomainSweeper::with_config(config)?;
/// let mut ledger = RunLedger::open("out");
/// let plan = ledger.plan(&domains);
///
/// let report = sweeper
///     .sweep(&mut ledger, &plan, |r| println!("[{}] {}", r.index, r.domain))
///     .await?;
/// println!("{} available", report.available_domains.len());
/// # Ok(())
/// # }
/// ```
pub struct DomainSweeper {
    config: SweepConfig,
    client: ScrapeClient,
    retry: RetryPolicy,
}

impl DomainSweeper {
    pub fn with_config(config: SweepConfig) -> Result<Self, SweepError> {
        let client = ScrapeClient::with_config(&config)?;
        let retry = RetryPolicy::new(config.retries, config.retry_base_delay);
        Ok(Self {
            config,
            client,
            retry,
        })
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Check a single domain.
    ///
    /// Never fails: scrape errors that outlast the retry policy become a
    /// result with `ok == false`. The configured request delay is observed
    /// after the check either way.
    pub async fn check_domain(&self, domain: &str, index: usize) -> DomainResult {
        let search_url = search_url_for(&self.config.search_url, domain);
        let timestamp = utc_now_iso();
        let request = ScrapeRequest {
            domain: domain.to_string(),
            search_url: search_url.clone(),
            timeout: self.config.timeout,
            wait_for: self.config.wait_for,
        };

        let client = &self.client;
        let request = &request;
        let result = match self.retry.run(move || client.scrape(request)).await {
            Ok(response) => {
                let data = response.data.unwrap_or_default();
                let extract = data.extract.as_ref();
                let markdown = data.markdown.as_deref();

                DomainResult::checked(
                    domain,
                    search_url,
                    index,
                    timestamp,
                    reconcile(domain, extract, markdown),
                    extract.map_or(false, is_truthy),
                    markdown.map_or(false, |m| !m.is_empty()),
                )
            }
            Err(e) => {
                tracing::warn!(
                    domain,
                    status = ?e.status_code(),
                    error = %e,
                    "domain check failed"
                );
                DomainResult::failed(domain, search_url, index, timestamp, e.to_string())
            }
        };

        if !self.config.request_delay.is_zero() {
            tokio::time::sleep(self.config.request_delay).await;
        }

        result
    }

    /// Check many domains with bounded concurrency.
    ///
    /// Results come back in input order with 1-based indexes. `on_result` is
    /// called as each domain completes.
    pub async fn check_domains<C>(&self, domains: &[String], on_result: C) -> Vec<DomainResult>
    where
        C: Fn(&DomainResult),
    {
        ConcurrentProcessor::new(self.config.concurrency)
            .run(
                domains,
                move |domain, index| self.check_domain(domain, index + 1),
                on_result,
            )
            .await
    }

    /// Check the planned domains and record the run.
    ///
    /// The ledger CSV is prepared before the first request so that a schema
    /// problem stops the run before any network traffic. When the plan has
    /// nothing left to check, no request is made and nothing is written.
    pub async fn sweep<C>(
        &self,
        ledger: &mut RunLedger,
        plan: &SweepPlan,
        on_result: C,
    ) -> Result<SweepReport, SweepError>
    where
        C: Fn(&DomainResult),
    {
        if plan.is_complete() {
            tracing::info!(skipped = plan.skipped, "all domains already checked");
            return Ok(SweepReport {
                run: None,
                total: plan.total,
                skipped: plan.skipped,
                available_domains: available_domains(ledger.history()),
            });
        }

        ledger.prepare_csv()?;

        let started_at = utc_now_iso();
        let run_id = run_id_from_timestamp(&started_at)?;
        tracing::info!(
            run_id = %run_id,
            domains = plan.to_check.len(),
            skipped = plan.skipped,
            concurrency = self.config.concurrency,
            "starting sweep"
        );

        let results = self.check_domains(&plan.to_check, on_result).await;
        let finished_at = utc_now_iso();

        let run = RunRecord::new(
            run_id,
            started_at,
            finished_at,
            &self.config.api_url,
            &self.config.scrape_path,
            plan.skipped,
            results,
        );

        ledger.record_run(&run)?;

        let available = available_domains(ledger.history());
        write_available_domains(&ledger.paths().available_txt, &available)?;

        tracing::info!(
            run_id = %run.run_id,
            succeeded = run.success_count,
            failed = run.failure_count,
            available = available.len(),
            "sweep finished"
        );

        Ok(SweepReport {
            run: Some(run),
            total: plan.total,
            skipped: plan.skipped,
            available_domains: available,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvConfig, FileConfig};
    use crate::types::Availability;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sweeper_for(server: &MockServer, retries: u32) -> DomainSweeper {
        let env = EnvConfig {
            api_key: Some("fc-test".to_string()),
            api_url: Some(server.uri()),
            ..Default::default()
        };
        let config = SweepConfig::resolve(&FileConfig::default(), &env)
            .unwrap()
            .with_request_delay(Duration::ZERO)
            .with_retries(retries)
            .with_retry_base_delay(Duration::from_millis(1));
        DomainSweeper::with_config(config).unwrap()
    }

    fn found(domain: &str, extract: serde_json::Value, markdown: &str) -> Mock {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "url": format!("https://instantdomainsearch.com/?q={}", domain)
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "extract": extract, "markdown": markdown }
            })))
    }

    #[tokio::test]
    async fn test_check_domain_reconciles() {
        let server = MockServer::start().await;
        found(
            "foo.com",
            json!({ "availability": "unknown", "price": null, "notes": "" }),
            "[foo.com](https://x)\nContinue to checkout",
        )
        .mount(&server)
        .await;

        let sweeper = sweeper_for(&server, 0);
        let result = sweeper.check_domain("foo.com", 1).await;

        assert!(result.ok);
        assert_eq!(result.index, 1);
        assert_eq!(result.availability(), Some(Availability::Available));
        assert_eq!(result.has_extract, Some(true));
        assert_eq!(result.has_markdown, Some(true));
    }

    #[tokio::test]
    async fn test_check_domain_retries_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "upstream down" })))
            .expect(3)
            .mount(&server)
            .await;

        let sweeper = sweeper_for(&server, 2);
        let result = sweeper.check_domain("bar.io", 4).await;

        assert!(!result.ok);
        assert_eq!(result.error.as_deref(), Some("upstream down"));
        assert_eq!(result.extracted, None);
        assert_eq!(result.search_url, "https://instantdomainsearch.com/?q=bar.io");
    }

    #[tokio::test]
    async fn test_check_domains_keeps_order() {
        let server = MockServer::start().await;
        for (domain, label) in [("a.com", "taken"), ("b.com", "available"), ("c.com", "taken")] {
            found(
                domain,
                json!({ "availability": label, "price": null, "notes": "x" }),
                "",
            )
            .mount(&server)
            .await;
        }

        let sweeper = sweeper_for(&server, 0);
        let domains = vec!["a.com".to_string(), "b.com".to_string(), "c.com".to_string()];
        let results = sweeper.check_domains(&domains, |_| {}).await;

        let summary: Vec<(usize, &str, Option<Availability>)> = results
            .iter()
            .map(|r| (r.index, r.domain.as_str(), r.availability()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, "a.com", Some(Availability::Taken)),
                (2, "b.com", Some(Availability::Available)),
                (3, "c.com", Some(Availability::Taken)),
            ]
        );
        assert!(results.iter().all(|r| r.has_markdown == Some(false)));
    }
}
