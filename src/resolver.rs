//! Transitive dependency resolution.
//!
//! [`Resolver::resolve`] turns a package location into the dependencies
//! its own manifest declares, recursing into each of those until the
//! depth bound. There is no cycle detection: a manifest graph `A → B → A`
//! recurses until the bound stops it, and the bound is checked before any
//! upstream request at that level, so the walk always terminates.
//!
//! Records returned by `resolve(location, d)` carry `depth = d`. With the
//! default bound of 3, a crawled repository's own dependencies are depth 0
//! and their subtrees are resolved at depths 1 through 3; records at
//! depth 3 have no sub-dependencies even when more exist upstream.
//!
//! # Memoization
//!
//! When enabled, resolved subtrees are cached per `(location, depth)`.
//! Within one resolver the bound is fixed, so this is the same as keying on
//! the remaining depth, and a cached subtree is identical to a freshly
//! resolved one.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use depcrawl_core::extract::ManifestExtractor;
use depcrawl_core::models::{DependencyRecord, RepositoryRef};
use tracing::debug;

use crate::error::CrawlError;
use crate::fetcher::{ManifestFetcher, ManifestOutcome, CALLS_PER_FETCH};
use crate::quota::QuotaGuard;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Dependencies declared directly by a crawled repository.
#[derive(Debug, Clone, PartialEq)]
pub struct TopLevel {
    /// Whether a manifest was found at all.
    pub manifest_found: bool,
    pub dependencies: Vec<DependencyRecord>,
}

pub struct Resolver {
    quota: Arc<QuotaGuard>,
    fetcher: ManifestFetcher,
    extractor: Arc<dyn ManifestExtractor>,
    max_depth: u32,
    host_prefix: String,
    cache: Option<Mutex<HashMap<(String, u32), Vec<DependencyRecord>>>>,
}

impl Resolver {
    pub fn new(
        quota: Arc<QuotaGuard>,
        fetcher: ManifestFetcher,
        extractor: Arc<dyn ManifestExtractor>,
        max_depth: u32,
        host_prefix: impl Into<String>,
    ) -> Self {
        Self {
            quota,
            fetcher,
            extractor,
            max_depth,
            host_prefix: host_prefix.into(),
            cache: None,
        }
    }

    /// Cache resolved subtrees for the lifetime of this resolver.
    pub fn with_memoization(mut self, enabled: bool) -> Self {
        self.cache = enabled.then(|| Mutex::new(HashMap::new()));
        self
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Fetch and extract the manifest of a crawled repository (depth 0).
    pub async fn top_level(&self, repo: &RepositoryRef) -> Result<TopLevel, CrawlError> {
        self.manifest_dependencies(repo, 0).await
    }

    /// Resolve the dependencies declared at `location`, recursively.
    ///
    /// Returns an empty list without any upstream request when `depth`
    /// exceeds the bound or `location` does not name a repository on the
    /// configured host.
    pub fn resolve<'a>(
        &'a self,
        location: &'a str,
        depth: u32,
    ) -> BoxFuture<'a, Result<Vec<DependencyRecord>, CrawlError>> {
        Box::pin(async move {
            if depth > self.max_depth {
                return Ok(Vec::new());
            }

            let Some(repo) = repository_for_location(location, &self.host_prefix) else {
                debug!(location, "not a repository on the package host; not resolving");
                return Ok(Vec::new());
            };

            if let Some(cached) = self.cached(location, depth) {
                debug!(location, depth, "subtree cache hit");
                return Ok(cached);
            }

            let mut deps = self.manifest_dependencies(&repo, depth).await?.dependencies;
            for dep in deps.iter_mut() {
                let child = dep.package_location.clone();
                dep.sub_dependencies = self.resolve(&child, depth + 1).await?;
            }

            self.remember(location, depth, &deps);
            Ok(deps)
        })
    }

    async fn manifest_dependencies(
        &self,
        repo: &RepositoryRef,
        depth: u32,
    ) -> Result<TopLevel, CrawlError> {
        self.quota.spend(CALLS_PER_FETCH).await?;

        match self.fetcher.fetch(repo).await {
            ManifestOutcome::Found(text) => {
                let mut dependencies = self.extractor.extract(&text, repo);
                for dep in dependencies.iter_mut() {
                    dep.depth = depth;
                }
                Ok(TopLevel {
                    manifest_found: true,
                    dependencies,
                })
            }
            ManifestOutcome::NotFound => Ok(TopLevel {
                manifest_found: false,
                dependencies: Vec::new(),
            }),
        }
    }

    fn cached(&self, location: &str, depth: u32) -> Option<Vec<DependencyRecord>> {
        let cache = self.cache.as_ref()?;
        cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(location.to_string(), depth))
            .cloned()
    }

    fn remember(&self, location: &str, depth: u32, deps: &[DependencyRecord]) {
        if let Some(cache) = &self.cache {
            cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert((location.to_string(), depth), deps.to_vec());
        }
    }
}

/// Derive `owner/name` from a package location on the configured host.
///
/// `https://github.com/apple/swift-nio.git` with prefix
/// `https://github.com/` gives `apple/swift-nio`.
pub fn repository_for_location(location: &str, host_prefix: &str) -> Option<RepositoryRef> {
    let rest = location.trim().strip_prefix(host_prefix)?;
    let rest = rest.trim_end_matches('/');
    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    rest.parse().ok()
}
