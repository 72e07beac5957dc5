//! Manifest retrieval.
//!
//! Reading a manifest takes two upstream calls: a metadata lookup for the
//! repository's default branch, then the raw file at the manifest path on
//! that branch. Any failure along the way is a [`ManifestOutcome::NotFound`]
//! for that repository: plenty of search hits simply have no manifest at
//! the expected path, and one bad repository must not stop the crawl.
//!
//! The fetcher does not consult the quota guard; callers gate with
//! [`QuotaGuard::spend`](crate::quota::QuotaGuard::spend) using
//! [`CALLS_PER_FETCH`] first.

use std::sync::Arc;

use depcrawl_core::models::RepositoryRef;
use tracing::{debug, warn};

use crate::error::HostError;
use crate::host::RepositoryHost;

/// Metered API requests consumed by one [`ManifestFetcher::fetch`].
///
/// Only the metadata lookup counts against the API budget; raw file
/// reads are served outside it.
pub const CALLS_PER_FETCH: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestOutcome {
    Found(String),
    NotFound,
}

pub struct ManifestFetcher {
    host: Arc<dyn RepositoryHost>,
    manifest_path: String,
}

impl ManifestFetcher {
    pub fn new(host: Arc<dyn RepositoryHost>, manifest_path: impl Into<String>) -> Self {
        Self {
            host,
            manifest_path: manifest_path.into(),
        }
    }

    pub fn manifest_path(&self) -> &str {
        &self.manifest_path
    }

    pub async fn fetch(&self, repo: &RepositoryRef) -> ManifestOutcome {
        let branch = match self.host.default_branch(repo).await {
            Ok(branch) => branch,
            Err(e) => {
                log_miss(repo, "metadata lookup", &e);
                return ManifestOutcome::NotFound;
            }
        };

        match self.host.raw_file(repo, &branch, &self.manifest_path).await {
            Ok(text) => {
                debug!(repo = %repo, branch = %branch, bytes = text.len(), "manifest fetched");
                ManifestOutcome::Found(text)
            }
            Err(e) => {
                log_miss(repo, "manifest fetch", &e);
                ManifestOutcome::NotFound
            }
        }
    }
}

/// A 404 is routine; anything else deserves a warning.
fn log_miss(repo: &RepositoryRef, step: &str, err: &HostError) {
    if err.status() == Some(404) {
        debug!(repo = %repo, "{} found nothing: {}", step, err);
    } else {
        warn!(repo = %repo, "{} failed, recording no dependencies: {}", step, err);
    }
}
