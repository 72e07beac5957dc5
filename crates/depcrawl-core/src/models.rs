//! Core data models used throughout depcrawl.
//!
//! These types describe the repositories discovered by the crawl, the
//! dependency trees extracted from their manifests, and the small amount of
//! state (checkpoint, quota) the engine carries between units of work.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies a repository on the hosting service as `owner/name`.
///
/// Serialized as the `owner/name` string so checkpoint files and result
/// journals stay human-readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// `owner/name`, the form used by the hosting API and persisted state.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepositoryRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(format!("invalid repository '{}': expected owner/name", s)),
        }
    }
}

impl TryFrom<String> for RepositoryRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepositoryRef> for String {
    fn from(value: RepositoryRef) -> Self {
        value.full_name()
    }
}

/// One dependency declared in a manifest, with its resolved subtree.
///
/// `depth` is 0 for dependencies declared by a crawled repository and grows
/// by one per level of transitive resolution. A record at the configured
/// depth bound always has empty `sub_dependencies`, whether or not the
/// upstream manifest declares more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub package_location: String,
    pub version_constraint: String,
    pub declaring_repo: RepositoryRef,
    #[serde(default)]
    pub sub_dependencies: Vec<DependencyRecord>,
    pub depth: u32,
}

impl DependencyRecord {
    /// A record with no subtree, as produced by manifest extraction.
    pub fn new(
        package_location: impl Into<String>,
        version_constraint: impl Into<String>,
        declaring_repo: RepositoryRef,
        depth: u32,
    ) -> Self {
        Self {
            package_location: package_location.into(),
            version_constraint: version_constraint.into(),
            declaring_repo,
            sub_dependencies: Vec::new(),
            depth,
        }
    }
}

/// The completed result for one crawled repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub repo: RepositoryRef,
    pub url: String,
    pub star_count: u64,
    pub last_updated: DateTime<Utc>,
    pub dependencies: Vec<DependencyRecord>,
}

impl RepositoryRecord {
    pub fn from_search_item(item: &SearchItem, dependencies: Vec<DependencyRecord>) -> Self {
        Self {
            repo: item.repo.clone(),
            url: item.url.clone(),
            star_count: item.star_count,
            last_updated: item.last_updated,
            dependencies,
        }
    }
}

/// A repository as listed by the search index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchItem {
    pub repo: RepositoryRef,
    pub url: String,
    pub star_count: u64,
    pub last_updated: DateTime<Utc>,
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub items: Vec<SearchItem>,
    /// No further page holds results.
    pub is_last: bool,
    pub total_count: u64,
}

/// Remaining request budget reported by the upstream quota endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaState {
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl QuotaState {
    pub fn is_below(&self, low_water: u64) -> bool {
        self.remaining < low_water
    }

    /// Time left until the quota window resets, or zero if it already has.
    pub fn until_reset(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.reset_at - now).to_std().unwrap_or_default()
    }
}

/// Set of repositories whose full pipeline has completed.
///
/// Keeps first-completion order for the persisted form and a hash index
/// for [`contains`](CrawlCheckpoint::contains).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "CheckpointFile", into = "CheckpointFile")]
pub struct CrawlCheckpoint {
    order: Vec<RepositoryRef>,
    index: HashSet<RepositoryRef>,
}

impl CrawlCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, repo: &RepositoryRef) -> bool {
        self.index.contains(repo)
    }

    /// Record a completed repository. Returns `false` if it was already present.
    pub fn insert(&mut self, repo: RepositoryRef) -> bool {
        if self.index.insert(repo.clone()) {
            self.order.push(repo);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn processed(&self) -> &[RepositoryRef] {
        &self.order
    }
}

/// On-disk shape of [`CrawlCheckpoint`].
#[derive(Serialize, Deserialize)]
struct CheckpointFile {
    #[serde(default)]
    processed_repos: Vec<RepositoryRef>,
}

impl From<CheckpointFile> for CrawlCheckpoint {
    fn from(file: CheckpointFile) -> Self {
        let mut checkpoint = CrawlCheckpoint::new();
        for repo in file.processed_repos {
            checkpoint.insert(repo);
        }
        checkpoint
    }
}

impl From<CrawlCheckpoint> for CheckpointFile {
    fn from(checkpoint: CrawlCheckpoint) -> Self {
        Self {
            processed_repos: checkpoint.order,
        }
    }
}
