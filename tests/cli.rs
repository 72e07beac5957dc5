use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;

fn depcrawl_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("depcrawl");
    path
}

fn setup_test_env(api_url: &str, raw_url: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[github]
api_url = "{}"
raw_url = "{}"
timeout_secs = 5

[crawl]
max_depth = 2

[output]
dir = "{}/results"
"#,
        api_url,
        raw_url,
        root.display()
    );

    let config_path = config_dir.join("depcrawl.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_depcrawl(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = depcrawl_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--progress")
        .arg("off")
        .args(args)
        .env_remove("GITHUB_TOKEN")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run depcrawl binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_extract_prints_records() {
    let (tmp, config) = setup_test_env("http://127.0.0.1:9", "http://127.0.0.1:9");
    let manifest = tmp.path().join("Package.swift");
    fs::write(
        &manifest,
        ".package(url: \"https://github.com/apple/swift-log.git\", from: \"1.4.0\"),\n",
    )
    .unwrap();

    let (stdout, stderr, success) = run_depcrawl(
        &config,
        &["extract", manifest.to_str().unwrap(), "--repo", "acme/app"],
    );
    assert!(success, "extract failed: {}", stderr);

    let records: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(records.as_array().unwrap().len(), 1);
    assert_eq!(
        records[0]["package_location"],
        "https://github.com/apple/swift-log.git"
    );
    assert_eq!(records[0]["version_constraint"], "1.4.0");
    assert_eq!(records[0]["declaring_repo"], "acme/app");
}

#[test]
fn test_extract_rejects_bad_repo() {
    let (tmp, config) = setup_test_env("http://127.0.0.1:9", "http://127.0.0.1:9");
    let manifest = tmp.path().join("Package.swift");
    fs::write(&manifest, "").unwrap();

    let (_, stderr, success) = run_depcrawl(
        &config,
        &["extract", manifest.to_str().unwrap(), "--repo", "no-slash"],
    );
    assert!(!success);
    assert!(stderr.contains("owner/name"), "stderr: {}", stderr);
}

#[test]
fn test_status_without_state() {
    let (_tmp, config) = setup_test_env("http://127.0.0.1:9", "http://127.0.0.1:9");
    let (stdout, stderr, success) = run_depcrawl(&config, &["status"]);
    assert!(success, "status failed: {}", stderr);
    assert!(stdout.contains("Processed:     0"));
    assert!(stdout.contains("(missing)"));
}

#[test]
fn test_invalid_config_fails() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("depcrawl.toml");
    fs::write(&config, "[crawl]\nper_page = 500\n").unwrap();

    let (_, stderr, success) = run_depcrawl(&config, &["status"]);
    assert!(!success);
    assert!(stderr.contains("per_page"), "stderr: {}", stderr);
}

#[test]
fn test_crawl_resume_and_export() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/rate_limit");
        then.status(200).json_body(json!({
            "resources": { "core": { "remaining": 4000, "reset": 4102444800i64 } }
        }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/search/repositories")
            .query_param("page", "1");
        then.status(200).json_body(json!({
            "total_count": 2,
            "items": [
                {
                    "name": "app",
                    "owner": { "login": "acme" },
                    "html_url": "https://github.com/acme/app",
                    "stargazers_count": 12,
                    "updated_at": "2024-02-01T00:00:00Z"
                },
                {
                    "name": "tool",
                    "owner": { "login": "acme" },
                    "html_url": "https://github.com/acme/tool",
                    "stargazers_count": 3,
                    "updated_at": "2024-02-02T00:00:00Z"
                }
            ]
        }));
    });
    for name in ["app", "tool"] {
        server.mock(|when, then| {
            when.method(GET).path(format!("/repos/acme/{}", name));
            then.status(200).json_body(json!({ "default_branch": "main" }));
        });
    }
    server.mock(|when, then| {
        when.method(GET).path("/raw/acme/app/main/Package.swift");
        then.status(200).body(
            ".package(url: \"https://github.com/acme/tool.git\", from: \"0.3.0\"),\n",
        );
    });
    server.mock(|when, then| {
        when.method(GET).path("/raw/acme/tool/main/Package.swift");
        then.status(404);
    });

    let (tmp, config) = setup_test_env(&server.base_url(), &server.url("/raw"));

    let (stdout, stderr, success) = run_depcrawl(&config, &["crawl", "--limit", "1"]);
    assert!(success, "first crawl failed: {}", stderr);
    assert!(stdout.contains("repositories processed: 1"), "{}", stdout);

    let (stdout, stderr, success) = run_depcrawl(&config, &["crawl"]);
    assert!(success, "second crawl failed: {}", stderr);
    assert!(stdout.contains("skipped (already processed): 1"), "{}", stdout);
    assert!(stdout.contains("repositories processed: 1"), "{}", stdout);
    assert!(
        stderr.contains("Skipping acme/app, already processed."),
        "stderr: {}",
        stderr
    );

    let results = tmp.path().join("results");
    let checkpoint = fs::read_to_string(results.join("checkpoint.json")).unwrap();
    assert_eq!(
        checkpoint,
        r#"{"processed_repos":["acme/app","acme/tool"]}"#
    );

    let repos = fs::read_to_string(results.join("repositories.csv")).unwrap();
    assert_eq!(repos.lines().count(), 3);
    assert!(repos.contains("acme,app,https://github.com/acme/app,12,"));

    let deps = fs::read_to_string(results.join("dependencies.csv")).unwrap();
    assert!(deps.contains("acme/app,https://github.com/acme/tool.git,0.3.0,0,"));

    // Export alone rewrites the same tables from the journal.
    fs::remove_file(results.join("dependencies.csv")).unwrap();
    let (stdout, stderr, success) = run_depcrawl(&config, &["export"]);
    assert!(success, "export failed: {}", stderr);
    assert!(stdout.contains("dependencies.csv: 1 rows"), "{}", stdout);
    assert!(results.join("dependencies.csv").exists());

    let (stdout, _, success) = run_depcrawl(&config, &["status"]);
    assert!(success);
    assert!(stdout.contains("Processed:     2"));
    assert!(stdout.contains("Records:       2"));
}

#[test]
fn test_crawl_aborts_on_search_failure() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/rate_limit");
        then.status(200)
            .json_body(json!({ "rate": { "remaining": 4000, "reset": 4102444800i64 } }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/search/repositories");
        then.status(500);
    });

    let (tmp, config) = setup_test_env(&server.base_url(), &server.url("/raw"));
    let (_, stderr, success) = run_depcrawl(&config, &["crawl"]);
    assert!(!success);
    assert!(stderr.contains("search page 1 failed"), "stderr: {}", stderr);
    assert!(!tmp.path().join("results/checkpoint.json").exists());
}
