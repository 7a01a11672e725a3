// domain-sweep/tests/cli_integration.rs

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a workspace with a domains file
fn workspace_with_domains(domains: &[&str]) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(dir.path().join("domains.txt"), domains.join("\n"))
        .expect("Failed to write domains file");
    dir
}

/// A command isolated from the caller's environment and config files
fn sweep_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("domain-sweep").unwrap();
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", dir)
        .env_remove("FIRECRAWL_API_KEY")
        .env_remove("TEST_API_KEY")
        .env_remove("FIRECRAWL_API_URL")
        .env_remove("RUST_LOG");
    cmd
}

fn sweep_cmd_with_key(dir: &Path, api_url: &str) -> Command {
    let mut cmd = sweep_cmd(dir);
    cmd.env("FIRECRAWL_API_KEY", "fc-test")
        .env("FIRECRAWL_API_URL", api_url)
        .args(["--delay-ms", "0", "--retries", "0"]);
    cmd
}

fn write_history(dir: &Path, domains: &[&str]) {
    let out = dir.join("out");
    fs::create_dir_all(&out).unwrap();
    let results: Vec<_> = domains
        .iter()
        .map(|d| json!({ "domain": d, "ok": true, "availability": "taken" }))
        .collect();
    fs::write(
        out.join("results.json"),
        json!([{ "runId": "20260101-000000", "results": results }]).to_string(),
    )
    .unwrap();
}

#[test]
fn test_help_lists_flags() {
    let mut cmd = Command::cargo_bin("domain-sweep").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--file"))
        .stdout(predicate::str::contains("--out-dir"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--concurrency"))
        .stdout(predicate::str::contains("--retries"));
}

#[test]
fn test_version_flag() {
    let mut cmd = Command::cargo_bin("domain-sweep").unwrap();
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_api_key_fails_before_any_work() {
    let dir = workspace_with_domains(&["foo.com"]);

    sweep_cmd(dir.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("FIRECRAWL_API_KEY"));

    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_invalid_concurrency_rejected() {
    let dir = workspace_with_domains(&["foo.com"]);

    sweep_cmd(dir.path())
        .args(["--concurrency", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Concurrency must be between 1 and 100"));
}

#[test]
fn test_empty_domain_list() {
    let dir = workspace_with_domains(&["# nothing yet", "", "   "]);

    sweep_cmd_with_key(dir.path(), "http://127.0.0.1:9")
        .assert()
        .success()
        .stdout(predicate::str::contains("No domains found in domains.txt"));
}

#[test]
fn test_missing_domain_file() {
    let dir = TempDir::new().unwrap();

    sweep_cmd_with_key(dir.path(), "http://127.0.0.1:9")
        .args(["--file", "nope.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.txt"));
}

#[test]
fn test_dry_run_applies_skip_set_without_writing() {
    let dir = workspace_with_domains(&["foo.com", "bar.io"]);
    write_history(dir.path(), &["FOO.com"]);

    sweep_cmd_with_key(dir.path(), "http://127.0.0.1:9")
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("bar.io"))
        .stdout(predicate::str::contains("foo.com").not())
        .stderr(predicate::str::contains("1 domain would be checked"));

    assert!(!dir.path().join("out").join("results.csv").exists());
}

#[test]
fn test_all_domains_already_checked() {
    let dir = workspace_with_domains(&["foo.com", "bar.io"]);
    write_history(dir.path(), &["foo.com", "bar.io"]);

    sweep_cmd_with_key(dir.path(), "http://127.0.0.1:9")
        .assert()
        .success()
        .stdout(predicate::str::contains("All domains already checked"));

    assert!(!dir.path().join("out").join("runs").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_end_to_end_sweep() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(body_partial_json(json!({ "url": "https://instantdomainsearch.com/?q=foo.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "extract": { "availability": "available", "price": "$9.99", "notes": "" },
                "markdown": "[foo.com](https://instantdomainsearch.com/go/foo.com)\n$9.99\nContinue"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(body_partial_json(json!({ "url": "https://instantdomainsearch.com/?q=bar.io" })))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "boom" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = workspace_with_domains(&["foo.com", "#comment", "", "bar.io"]);

    sweep_cmd_with_key(dir.path(), &server.uri())
        .args(["--concurrency", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[1/2] foo.com: available ($9.99)"))
        .stdout(predicate::str::contains("[2/2] bar.io: ERROR (boom)"))
        .stdout(predicate::str::contains("1 succeeded"))
        .stdout(predicate::str::contains("1 failed"));

    let out = dir.path().join("out");
    assert_eq!(
        fs::read_to_string(out.join("available-domains.txt")).unwrap(),
        "foo.com\n"
    );
    let csv = fs::read_to_string(out.join("results.csv")).unwrap();
    assert!(csv.starts_with("runId,runStartedAt,runFinishedAt,domain,"));
    assert_eq!(csv.lines().count(), 3);
    assert_eq!(fs::read_dir(out.join("runs")).unwrap().count(), 1);

    // Both domains are in the ledger now, failed ones included
    sweep_cmd_with_key(dir.path(), &server.uri())
        .assert()
        .success()
        .stdout(predicate::str::contains("All domains already checked (2 skipped)"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_ledger_header_aborts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(0)
        .mount(&server)
        .await;

    let dir = workspace_with_domains(&["foo.com"]);
    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("results.csv"), "name,status\n").unwrap();

    sweep_cmd_with_key(dir.path(), &server.uri())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unexpected CSV header"));

    assert_eq!(
        fs::read_to_string(out.join("results.csv")).unwrap(),
        "name,status\n"
    );
    assert!(!out.join("results.json").exists());
}
