//! In-memory [`RepositoryHost`] for tests and offline runs.
//!
//! Holds search pages, quota answers, default branches, and raw files in
//! plain maps behind `std::sync::Mutex`, and counts every call so tests can
//! assert how much upstream traffic an operation caused. Pages that were
//! never configured come back empty and marked last.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use depcrawl_core::models::{QuotaState, RepositoryRef, SearchItem, SearchPage};

use super::RepositoryHost;
use crate::error::HostError;

/// Scripted answer for one quota request.
#[derive(Debug, Clone)]
pub enum QuotaAnswer {
    Ok(QuotaState),
    Malformed,
}

#[derive(Default)]
struct HostState {
    pages: HashMap<u32, Result<SearchPage, u16>>,
    quota: VecDeque<QuotaAnswer>,
    fallback_quota: Option<QuotaAnswer>,
    branches: HashMap<RepositoryRef, String>,
    files: HashMap<(RepositoryRef, String, String), String>,
    raw_requests: Vec<RepositoryRef>,
}

/// Counters for upstream calls made through an [`InMemoryHost`].
#[derive(Default)]
pub struct CallCounts {
    search: AtomicUsize,
    quota: AtomicUsize,
    metadata: AtomicUsize,
    raw: AtomicUsize,
}

impl CallCounts {
    pub fn search(&self) -> usize {
        self.search.load(Ordering::SeqCst)
    }
    pub fn quota(&self) -> usize {
        self.quota.load(Ordering::SeqCst)
    }
    pub fn metadata(&self) -> usize {
        self.metadata.load(Ordering::SeqCst)
    }
    pub fn raw(&self) -> usize {
        self.raw.load(Ordering::SeqCst)
    }
}

/// A deterministic repository host.
#[derive(Default)]
pub struct InMemoryHost {
    state: Mutex<HostState>,
    calls: CallCounts,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }

    /// Serve `items` as search page `page`.
    pub fn set_page(&self, page: u32, items: Vec<SearchItem>, is_last: bool) {
        let total_count = items.len() as u64;
        self.state.lock().unwrap().pages.insert(
            page,
            Ok(SearchPage {
                items,
                is_last,
                total_count,
            }),
        );
    }

    /// Answer search page `page` with HTTP `status`.
    pub fn fail_page(&self, page: u32, status: u16) {
        self.state.lock().unwrap().pages.insert(page, Err(status));
    }

    /// Answer every quota request with `state` (after any queued answers).
    pub fn set_quota(&self, state: QuotaState) {
        self.state.lock().unwrap().fallback_quota = Some(QuotaAnswer::Ok(state));
    }

    /// Answer the next quota request with `answer`, then fall back.
    pub fn push_quota(&self, answer: QuotaAnswer) {
        self.state.lock().unwrap().quota.push_back(answer);
    }

    /// Make every quota request fail as malformed.
    pub fn fail_quota(&self) {
        let mut state = self.state.lock().unwrap();
        state.quota.clear();
        state.fallback_quota = Some(QuotaAnswer::Malformed);
    }

    /// Register a repository with its default branch.
    pub fn add_repository(&self, repo: RepositoryRef, default_branch: &str) {
        self.state
            .lock()
            .unwrap()
            .branches
            .insert(repo, default_branch.to_string());
    }

    /// Store a raw file on a branch.
    pub fn add_file(&self, repo: RepositoryRef, branch: &str, path: &str, contents: &str) {
        self.state.lock().unwrap().files.insert(
            (repo, branch.to_string(), path.to_string()),
            contents.to_string(),
        );
    }

    /// Register `repo` on branch `main` with `contents` at `path`.
    pub fn add_manifest(&self, repo: RepositoryRef, path: &str, contents: &str) {
        self.add_repository(repo.clone(), "main");
        self.add_file(repo, "main", path, contents);
    }

    /// Repositories whose raw files were requested, in request order.
    pub fn raw_requests(&self) -> Vec<RepositoryRef> {
        self.state.lock().unwrap().raw_requests.clone()
    }
}

fn plenty_of_quota() -> QuotaState {
    QuotaState {
        remaining: 5000,
        reset_at: Utc::now() + Duration::hours(1),
    }
}

fn not_found(url: String) -> HostError {
    HostError::Status { url, status: 404 }
}

#[async_trait]
impl RepositoryHost for InMemoryHost {
    async fn search_repositories(&self, _query: &str, page: u32) -> Result<SearchPage, HostError> {
        self.calls.search.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        match state.pages.get(&page) {
            Some(Ok(result)) => Ok(result.clone()),
            Some(Err(status)) => Err(HostError::Status {
                url: format!("memory://search?page={}", page),
                status: *status,
            }),
            None => Ok(SearchPage {
                items: Vec::new(),
                is_last: true,
                total_count: 0,
            }),
        }
    }

    async fn rate_limit(&self) -> Result<QuotaState, HostError> {
        self.calls.quota.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let answer = match state.quota.pop_front() {
            Some(answer) => answer,
            None => state
                .fallback_quota
                .clone()
                .unwrap_or_else(|| QuotaAnswer::Ok(plenty_of_quota())),
        };
        match answer {
            QuotaAnswer::Ok(quota) => Ok(quota),
            QuotaAnswer::Malformed => Err(HostError::Malformed {
                url: "memory://rate_limit".to_string(),
                reason: "scripted failure".to_string(),
            }),
        }
    }

    async fn default_branch(&self, repo: &RepositoryRef) -> Result<String, HostError> {
        self.calls.metadata.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .unwrap()
            .branches
            .get(repo)
            .cloned()
            .ok_or_else(|| not_found(format!("memory://repos/{}", repo)))
    }

    async fn raw_file(
        &self,
        repo: &RepositoryRef,
        branch: &str,
        path: &str,
    ) -> Result<String, HostError> {
        self.calls.raw.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.raw_requests.push(repo.clone());
        state
            .files
            .get(&(repo.clone(), branch.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| not_found(format!("memory://raw/{}/{}/{}", repo, branch, path)))
    }
}
