//! GitHub client against a local mock server.

use std::sync::Arc;

use depcrawl::checkpoint::JsonCheckpointStore;
use depcrawl::config::{Config, GithubConfig, OutputConfig};
use depcrawl::crawl::{build_engine, CrawlDriver, CrawlOptions};
use depcrawl::error::HostError;
use depcrawl::export::export_csv;
use depcrawl::host::{GitHubClient, RepositoryHost};
use depcrawl::journal::JsonlSink;
use depcrawl_core::models::RepositoryRef;
use depcrawl_core::store::{CheckpointStore, ResultSink};
use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;

fn github_config(server: &MockServer) -> GithubConfig {
    GithubConfig {
        api_url: server.base_url(),
        raw_url: server.url("/raw"),
        ..GithubConfig::default()
    }
}

fn client(server: &MockServer, token: Option<&str>) -> GitHubClient {
    GitHubClient::with_token(&github_config(server), 30, token.map(str::to_string)).unwrap()
}

#[tokio::test]
async fn rate_limit_nested_shape() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/rate_limit");
            then.status(200).json_body(json!({
                "resources": {
                    "core": { "limit": 5000, "remaining": 4990, "used": 10, "reset": 1700000000 },
                    "search": { "limit": 30, "remaining": 30, "used": 0, "reset": 1700000060 }
                },
                "rate": { "limit": 5000, "remaining": 4990, "used": 10, "reset": 1700000000 }
            }));
        })
        .await;

    let state = client(&server, None).rate_limit().await.unwrap();
    mock.assert_async().await;
    assert_eq!(state.remaining, 4990);
    assert_eq!(state.reset_at.timestamp(), 1_700_000_000);
}

#[tokio::test]
async fn rate_limit_flat_shape() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rate_limit");
            then.status(200)
                .json_body(json!({ "rate": { "limit": 60, "remaining": 2, "reset": 1700000500 } }));
        })
        .await;

    let state = client(&server, None).rate_limit().await.unwrap();
    assert_eq!(state.remaining, 2);
    assert_eq!(state.reset_at.timestamp(), 1_700_000_500);
}

#[tokio::test]
async fn rate_limit_unknown_shape_is_malformed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rate_limit");
            then.status(200).json_body(json!({ "message": "API rate limit exceeded" }));
        })
        .await;

    let err = client(&server, None).rate_limit().await.unwrap_err();
    assert!(matches!(err, HostError::Malformed { .. }), "{:?}", err);
}

#[tokio::test]
async fn search_sends_query_and_token() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/search/repositories")
                .query_param("q", "Package.swift language:swift")
                .query_param("page", "2")
                .query_param("per_page", "30")
                .header("authorization", "Bearer s3cret")
                .header("accept", "application/vnd.github+json");
            then.status(200).json_body(json!({
                "total_count": 31,
                "incomplete_results": false,
                "items": [{
                    "name": "vapor",
                    "owner": { "login": "vapor" },
                    "html_url": "https://github.com/vapor/vapor",
                    "stargazers_count": 24000,
                    "updated_at": "2024-03-02T10:30:00Z"
                }]
            }));
        })
        .await;

    let page = client(&server, Some("s3cret"))
        .search_repositories("Package.swift language:swift", 2)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].repo, RepositoryRef::new("vapor", "vapor"));
    assert_eq!(page.items[0].star_count, 24000);
    assert!(page.is_last);
}

#[tokio::test]
async fn search_failure_reports_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/search/repositories");
            then.status(422).json_body(json!({ "message": "Validation Failed" }));
        })
        .await;

    let err = client(&server, None)
        .search_repositories("x", 1)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(422));
}

#[tokio::test]
async fn default_branch_and_raw_file() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/apple/swift-nio");
            then.status(200)
                .json_body(json!({ "full_name": "apple/swift-nio", "default_branch": "trunk" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/raw/apple/swift-nio/trunk/Package.swift");
            then.status(200).body("// swift-tools-version:5.7\n");
        })
        .await;

    let client = client(&server, None);
    let repo = RepositoryRef::new("apple", "swift-nio");
    let branch = client.default_branch(&repo).await.unwrap();
    assert_eq!(branch, "trunk");
    let text = client.raw_file(&repo, &branch, "Package.swift").await.unwrap();
    assert_eq!(text, "// swift-tools-version:5.7\n");
}

#[tokio::test]
async fn missing_raw_file_is_404() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/raw/a/b/main/Package.swift");
            then.status(404).body("404: Not Found");
        })
        .await;

    let err = client(&server, None)
        .raw_file(&RepositoryRef::new("a", "b"), "main", "Package.swift")
        .await
        .unwrap_err();
    assert!(matches!(err, HostError::Status { status: 404, .. }));
}

#[tokio::test]
async fn crawl_continues_past_incomplete_short_page() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rate_limit");
            then.status(200)
                .json_body(json!({ "rate": { "remaining": 5000, "reset": 4102444800i64 } }));
        })
        .await;
    for (page, name, incomplete) in [("1", "first", true), ("2", "second", false)] {
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/search/repositories")
                    .query_param("page", page);
                then.status(200).json_body(json!({
                    "total_count": 100,
                    "incomplete_results": incomplete,
                    "items": [{
                        "name": name,
                        "owner": { "login": "acme" },
                        "html_url": format!("https://github.com/acme/{}", name),
                        "stargazers_count": 1,
                        "updated_at": "2024-01-15T08:00:00Z"
                    }]
                }));
            })
            .await;
    }

    let tmp = TempDir::new().unwrap();
    let config = Config {
        github: github_config(&server),
        output: OutputConfig {
            dir: tmp.path().join("results"),
            ..OutputConfig::default()
        },
        ..Config::default()
    };
    let host: Arc<dyn RepositoryHost> =
        Arc::new(GitHubClient::with_token(&config.github, config.crawl.per_page, None).unwrap());
    let checkpoints = Arc::new(JsonCheckpointStore::new(config.output.checkpoint_path()));
    let sink = Arc::new(JsonlSink::new(config.output.journal_path()));
    let (quota, resolver) = build_engine(&config, host.clone());
    let driver = CrawlDriver::new(host, quota, resolver, checkpoints.clone(), sink);

    let summary = driver
        .run(&CrawlOptions::new(config.crawl.search_query()))
        .await
        .unwrap();
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.processed, 2);
    assert!(checkpoints
        .load()
        .await
        .unwrap()
        .contains(&RepositoryRef::new("acme", "second")));
}

#[tokio::test]
async fn crawl_over_http_end_to_end() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rate_limit");
            then.status(200)
                .json_body(json!({ "rate": { "remaining": 5000, "reset": 4102444800i64 } }));
        })
        .await;
    let search = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/search/repositories")
                .query_param("page", "1");
            then.status(200).json_body(json!({
                "total_count": 1,
                "items": [{
                    "name": "app",
                    "owner": { "login": "acme" },
                    "html_url": "https://github.com/acme/app",
                    "stargazers_count": 7,
                    "updated_at": "2024-01-15T08:00:00Z"
                }]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/acme/app");
            then.status(200).json_body(json!({ "default_branch": "main" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/raw/acme/app/main/Package.swift");
            then.status(200).body(
                "let package = Package(\n  dependencies: [\n    \
                 .package(url: \"https://github.com/dep/lib.git\", from: \"1.2.0\"),\n  ]\n)\n",
            );
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/dep/lib");
            then.status(404).json_body(json!({ "message": "Not Found" }));
        })
        .await;

    let tmp = TempDir::new().unwrap();
    let config = Config {
        github: github_config(&server),
        output: OutputConfig {
            dir: tmp.path().join("results"),
            ..OutputConfig::default()
        },
        ..Config::default()
    };

    let host: Arc<dyn RepositoryHost> =
        Arc::new(GitHubClient::with_token(&config.github, config.crawl.per_page, None).unwrap());
    let checkpoints = Arc::new(JsonCheckpointStore::new(config.output.checkpoint_path()));
    let sink = Arc::new(JsonlSink::new(config.output.journal_path()));
    let (quota, resolver) = build_engine(&config, host.clone());
    let driver = CrawlDriver::new(host, quota, resolver, checkpoints.clone(), sink.clone());

    let summary = driver
        .run(&CrawlOptions::new(config.crawl.search_query()))
        .await
        .unwrap();
    search.assert_async().await;
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.dependencies, 1);

    let checkpoint = checkpoints.load().await.unwrap();
    assert!(checkpoint.contains(&RepositoryRef::new("acme", "app")));

    let records = sink.records().await.unwrap();
    assert_eq!(records.len(), 1);
    let dep = &records[0].dependencies[0];
    assert_eq!(dep.package_location, "https://github.com/dep/lib.git");
    assert_eq!(dep.version_constraint, "1.2.0");
    assert!(dep.sub_dependencies.is_empty());

    let counts = export_csv(sink.as_ref(), &config.output).await.unwrap();
    assert_eq!(counts.repositories, 1);
    assert_eq!(counts.dependencies, 1);
    let csv = std::fs::read_to_string(config.output.dependencies_csv_path()).unwrap();
    assert!(csv.contains("acme/app,https://github.com/dep/lib.git,1.2.0,0,"));
}
