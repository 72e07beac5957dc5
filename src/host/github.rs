//! GitHub REST API client.
//!
//! Talks to `api.github.com` for search, rate limit, and repository
//! metadata, and to `raw.githubusercontent.com` for manifest contents.
//! Both base URLs come from configuration so the client can point at
//! GitHub Enterprise or a local mock server.
//!
//! # Authentication
//!
//! The token is read from the environment variable named by
//! `github.token_env` (default `GITHUB_TOKEN`) and sent as a bearer token.
//! Without one, requests go out unauthenticated with GitHub's much smaller
//! anonymous quota.
//!
//! # Rate limit response shapes
//!
//! `GET /rate_limit` has answered in two shapes over the API's lifetime:
//!
//! ```text
//! { "resources": { "core": { "remaining": 4999, "reset": 1700000000 }, ... } }
//! { "rate": { "remaining": 4999, "reset": 1700000000 } }
//! ```
//!
//! Current GitHub sends both keys; the per-category `resources.core`
//! window wins when present.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use depcrawl_core::models::{QuotaState, RepositoryRef, SearchItem, SearchPage};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use tracing::debug;

use super::RepositoryHost;
use crate::config::GithubConfig;
use crate::error::HostError;

/// GitHub serves at most this many results for any search query.
const SEARCH_RESULT_CAP: u64 = 1000;

/// A [`RepositoryHost`] backed by the GitHub REST API.
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    raw_url: String,
    per_page: u32,
}

impl GitHubClient {
    /// Build a client from configuration, reading the token from the environment.
    pub fn new(config: &GithubConfig, per_page: u32) -> Result<Self> {
        Self::with_token(config, per_page, config.token())
    }

    pub fn with_token(config: &GithubConfig, per_page: u32, token: Option<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .context("GitHub token contains characters not allowed in a header")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            raw_url: config.raw_url.trim_end_matches('/').to_string(),
            per_page,
        })
    }

    /// GET `url` and return the body, mapping non-success to [`HostError::Status`].
    async fn get_text(&self, url: String, query: &[(&str, String)]) -> Result<String, HostError> {
        debug!(url = %url, "GET");
        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|source| HostError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(HostError::Status {
                url,
                status: status.as_u16(),
            });
        }

        resp.text()
            .await
            .map_err(|source| HostError::Transport { url, source })
    }
}

#[async_trait]
impl RepositoryHost for GitHubClient {
    async fn search_repositories(&self, query: &str, page: u32) -> Result<SearchPage, HostError> {
        let url = format!("{}/search/repositories", self.api_url);
        let body = self
            .get_text(
                url.clone(),
                &[
                    ("q", query.to_string()),
                    ("page", page.to_string()),
                    ("per_page", self.per_page.to_string()),
                ],
            )
            .await?;
        parse_search_page(&body, page, self.per_page)
            .map_err(|reason| HostError::Malformed { url, reason })
    }

    async fn rate_limit(&self) -> Result<QuotaState, HostError> {
        let url = format!("{}/rate_limit", self.api_url);
        let body = self.get_text(url.clone(), &[]).await?;
        parse_rate_limit(&body).map_err(|reason| HostError::Malformed { url, reason })
    }

    async fn default_branch(&self, repo: &RepositoryRef) -> Result<String, HostError> {
        let url = format!("{}/repos/{}/{}", self.api_url, repo.owner, repo.name);
        let body = self.get_text(url.clone(), &[]).await?;
        let meta: RepoMetadata = serde_json::from_str(&body).map_err(|e| HostError::Malformed {
            url,
            reason: e.to_string(),
        })?;
        Ok(meta.default_branch)
    }

    async fn raw_file(
        &self,
        repo: &RepositoryRef,
        branch: &str,
        path: &str,
    ) -> Result<String, HostError> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.raw_url,
            repo.owner,
            repo.name,
            branch,
            path.trim_start_matches('/')
        );
        self.get_text(url, &[]).await
    }
}

// ============ Response parsing ============

#[derive(Deserialize)]
struct RepoMetadata {
    default_branch: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    total_count: u64,
    #[serde(default)]
    incomplete_results: bool,
    items: Vec<SearchResponseItem>,
}

#[derive(Deserialize)]
struct SearchResponseItem {
    name: String,
    owner: SearchResponseOwner,
    html_url: String,
    #[serde(default)]
    stargazers_count: u64,
    updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct SearchResponseOwner {
    login: String,
}

/// Parse a search response, deciding whether more pages can follow.
///
/// A short page ends the index only when GitHub reports complete results.
/// A search that timed out (`incomplete_results`) can return short pages
/// mid-index; then only an empty page or the result cap ends it.
pub fn parse_search_page(body: &str, page: u32, per_page: u32) -> Result<SearchPage, String> {
    let resp: SearchResponse = serde_json::from_str(body).map_err(|e| e.to_string())?;

    let items: Vec<SearchItem> = resp
        .items
        .into_iter()
        .map(|item| SearchItem {
            repo: RepositoryRef::new(item.owner.login, item.name),
            url: item.html_url,
            star_count: item.stargazers_count,
            last_updated: item.updated_at,
        })
        .collect();

    let reachable = resp.total_count.min(SEARCH_RESULT_CAP);
    let seen = u64::from(page) * u64::from(per_page);
    let short = !resp.incomplete_results && items.len() < per_page as usize;
    let is_last = items.is_empty() || short || seen >= reachable;

    Ok(SearchPage {
        items,
        is_last,
        total_count: resp.total_count,
    })
}

#[derive(Deserialize)]
struct RateWindow {
    remaining: u64,
    reset: i64,
}

#[derive(Deserialize)]
struct RateCategories {
    core: RateWindow,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RateLimitBody {
    Nested { resources: RateCategories },
    Flat { rate: RateWindow },
}

/// Normalize either rate-limit response shape into a [`QuotaState`].
pub fn parse_rate_limit(body: &str) -> Result<QuotaState, String> {
    let parsed: RateLimitBody = serde_json::from_str(body)
        .map_err(|_| "expected `resources.core` or `rate` with remaining/reset".to_string())?;

    let window = match parsed {
        RateLimitBody::Nested { resources } => resources.core,
        RateLimitBody::Flat { rate } => rate,
    };

    let reset_at = DateTime::from_timestamp(window.reset, 0)
        .ok_or_else(|| format!("reset timestamp {} out of range", window.reset))?;

    Ok(QuotaState {
        remaining: window.remaining,
        reset_at,
    })
}
