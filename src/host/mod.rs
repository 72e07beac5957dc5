//! The repository hosting service, seen from the crawl engine.
//!
//! [`RepositoryHost`] is the only way the engine reaches the network. It
//! covers the four upstream endpoints the crawl needs:
//!
//! | Method | Upstream |
//! |--------|----------|
//! | [`search_repositories`](RepositoryHost::search_repositories) | paginated repository search |
//! | [`rate_limit`](RepositoryHost::rate_limit) | remaining request budget |
//! | [`default_branch`](RepositoryHost::default_branch) | repository metadata |
//! | [`raw_file`](RepositoryHost::raw_file) | raw file contents on a branch |
//!
//! Implementations normalize upstream quirks (such as the two rate-limit
//! response shapes) before returning, so the engine only ever sees the
//! types from [`depcrawl_core::models`].

pub mod github;
pub mod memory;

use async_trait::async_trait;
use depcrawl_core::models::{QuotaState, RepositoryRef, SearchPage};

use crate::error::HostError;

pub use github::GitHubClient;
pub use memory::InMemoryHost;

#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Fetch one page (1-based) of repositories matching `query`.
    async fn search_repositories(&self, query: &str, page: u32) -> Result<SearchPage, HostError>;

    /// Current request budget.
    async fn rate_limit(&self) -> Result<QuotaState, HostError>;

    /// Name of the repository's default branch.
    async fn default_branch(&self, repo: &RepositoryRef) -> Result<String, HostError>;

    /// Raw contents of `path` on `branch`. A missing file is a
    /// [`HostError::Status`] with status 404.
    async fn raw_file(
        &self,
        repo: &RepositoryRef,
        branch: &str,
        path: &str,
    ) -> Result<String, HostError>;
}
