//! Crawl driver.
//!
//! Walks the repository search index page by page. For every repository
//! not yet in the checkpoint it resolves the full dependency tree, appends
//! the record to the result sink, and saves the checkpoint, in that order.
//!
//! ```text
//!   Paging{page} ──► ProcessingRepo{items} ──► Paging{page + 1}
//!        │                   │
//!        ▼                   ▼
//!      Done                Done
//! ```
//!
//! A page with no items, or one reported as the last page, ends the crawl.
//! Quota endpoint failures, search failures, and failures to persist a
//! record or checkpoint abort the run with a [`CrawlError`]; everything
//! written before that point is left intact, and the next run skips the
//! repositories already in the checkpoint.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{Context, Result};
use depcrawl_core::extract::MarkerExtractor;
use depcrawl_core::graph::count_records;
use depcrawl_core::models::{CrawlCheckpoint, RepositoryRecord, SearchItem};
use depcrawl_core::store::{CheckpointStore, ResultSink};
use tracing::{info, warn};

use crate::checkpoint::JsonCheckpointStore;
use crate::config::Config;
use crate::error::CrawlError;
use crate::export;
use crate::fetcher::ManifestFetcher;
use crate::host::{GitHubClient, RepositoryHost};
use crate::journal::JsonlSink;
use crate::progress::{CrawlProgressEvent, CrawlProgressReporter, NoProgress, ProgressMode};
use crate::quota::QuotaGuard;
use crate::resolver::Resolver;

/// Per-run knobs that do not belong in the config file.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub query: String,
    /// First search page to request (1-based).
    pub start_page: u32,
    /// Stop after processing this many new repositories.
    pub limit: Option<u64>,
}

impl CrawlOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            start_page: 1,
            limit: None,
        }
    }
}

/// Counters for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub pages: u32,
    /// Repositories resolved and checkpointed by this run.
    pub processed: u64,
    /// Repositories skipped because an earlier run checkpointed them.
    pub skipped: u64,
    /// Processed repositories without a readable manifest.
    pub without_manifest: u64,
    /// Dependency records at every depth across processed repositories.
    pub dependencies: u64,
}

enum CrawlState {
    Paging {
        page: u32,
    },
    ProcessingRepo {
        page: u32,
        items: VecDeque<SearchItem>,
        is_last: bool,
    },
    Done,
}

pub struct CrawlDriver {
    host: Arc<dyn RepositoryHost>,
    quota: Arc<QuotaGuard>,
    resolver: Resolver,
    checkpoints: Arc<dyn CheckpointStore>,
    sink: Arc<dyn ResultSink>,
    progress: Box<dyn CrawlProgressReporter>,
}

impl CrawlDriver {
    pub fn new(
        host: Arc<dyn RepositoryHost>,
        quota: Arc<QuotaGuard>,
        resolver: Resolver,
        checkpoints: Arc<dyn CheckpointStore>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            host,
            quota,
            resolver,
            checkpoints,
            sink,
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn CrawlProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Run until the index is exhausted, the limit is hit, or a fatal error.
    pub async fn run(&self, options: &CrawlOptions) -> Result<CrawlSummary, CrawlError> {
        let mut checkpoint = self.checkpoints.load().await.map_err(CrawlError::Checkpoint)?;
        if !checkpoint.is_empty() {
            info!("Resuming with {} processed repositories", checkpoint.len());
        }

        let mut summary = CrawlSummary::default();
        let mut state = CrawlState::Paging {
            page: options.start_page.max(1),
        };

        loop {
            state = match state {
                CrawlState::Paging { page } => {
                    self.progress.report(CrawlProgressEvent::Paging { page });
                    self.quota.await_budget().await?;
                    let result = self
                        .host
                        .search_repositories(&options.query, page)
                        .await
                        .map_err(|source| CrawlError::Page { page, source })?;
                    summary.pages += 1;

                    if result.items.is_empty() {
                        info!("Search index exhausted at page {}", page);
                        CrawlState::Done
                    } else {
                        CrawlState::ProcessingRepo {
                            page,
                            items: result.items.into(),
                            is_last: result.is_last,
                        }
                    }
                }
                CrawlState::ProcessingRepo {
                    page,
                    mut items,
                    is_last,
                } => {
                    if limit_reached(options.limit, summary.processed) {
                        info!("Stopping after {} repositories", summary.processed);
                        CrawlState::Done
                    } else {
                        match items.pop_front() {
                            Some(item) => {
                                self.process(&item, &mut checkpoint, &mut summary).await?;
                                CrawlState::ProcessingRepo {
                                    page,
                                    items,
                                    is_last,
                                }
                            }
                            None if is_last => CrawlState::Done,
                            None => CrawlState::Paging { page: page + 1 },
                        }
                    }
                }
                CrawlState::Done => break,
            };
        }

        Ok(summary)
    }

    async fn process(
        &self,
        item: &SearchItem,
        checkpoint: &mut CrawlCheckpoint,
        summary: &mut CrawlSummary,
    ) -> Result<(), CrawlError> {
        if checkpoint.contains(&item.repo) {
            info!("Skipping {}, already processed.", item.repo);
            self.progress.report(CrawlProgressEvent::Skipped {
                repo: item.repo.clone(),
            });
            summary.skipped += 1;
            return Ok(());
        }

        info!("Processing {}...", item.repo);
        self.progress.report(CrawlProgressEvent::Processing {
            repo: item.repo.clone(),
            n: summary.processed + 1,
        });

        let top = self.resolver.top_level(&item.repo).await?;
        if !top.manifest_found {
            summary.without_manifest += 1;
        }
        let mut dependencies = top.dependencies;
        for dep in dependencies.iter_mut() {
            let location = dep.package_location.clone();
            dep.sub_dependencies = self.resolver.resolve(&location, 1).await?;
        }
        summary.dependencies += count_records(&dependencies) as u64;

        let record = RepositoryRecord::from_search_item(item, dependencies);
        self.sink.append(&record).await.map_err(CrawlError::Sink)?;

        checkpoint.insert(item.repo.clone());
        self.checkpoints
            .save(checkpoint)
            .await
            .map_err(CrawlError::Checkpoint)?;
        summary.processed += 1;
        Ok(())
    }
}

fn limit_reached(limit: Option<u64>, processed: u64) -> bool {
    limit.is_some_and(|limit| processed >= limit)
}

/// Quota guard and resolver wired from configuration over `host`.
pub fn build_engine(config: &Config, host: Arc<dyn RepositoryHost>) -> (Arc<QuotaGuard>, Resolver) {
    let quota = Arc::new(QuotaGuard::new(host.clone(), config.crawl.quota_low_water));
    let resolver = Resolver::new(
        quota.clone(),
        ManifestFetcher::new(host, config.crawl.manifest_path.clone()),
        Arc::new(MarkerExtractor::new(config.extractor.clone())),
        config.crawl.max_depth,
        config.crawl.package_host_prefix.clone(),
    )
    .with_memoization(config.crawl.memoize);
    (quota, resolver)
}

/// GitHub client from configuration, warning when no token is set.
pub fn github_host(config: &Config) -> Result<Arc<dyn RepositoryHost>> {
    if config.github.token().is_none() {
        warn!(
            "{} is not set; using the anonymous GitHub quota",
            config.github.token_env
        );
    }
    let client = GitHubClient::new(&config.github, config.crawl.per_page)?;
    Ok(Arc::new(client))
}

/// `depcrawl crawl`: crawl, then export everything in the journal.
pub async fn run_crawl(
    config: &Config,
    fresh: bool,
    limit: Option<u64>,
    start_page: u32,
    progress: ProgressMode,
) -> Result<()> {
    let checkpoints = Arc::new(JsonCheckpointStore::new(config.output.checkpoint_path()));
    let sink = Arc::new(JsonlSink::new(config.output.journal_path()));

    if fresh {
        info!("Starting fresh; discarding checkpoint and journal");
        checkpoints.clear().await?;
        sink.clear().await?;
    }

    let host = github_host(config)?;
    let (quota, resolver) = build_engine(config, host.clone());
    let driver = CrawlDriver::new(host, quota, resolver, checkpoints.clone(), sink.clone())
        .with_progress(progress.reporter());

    let options = CrawlOptions {
        query: config.crawl.search_query(),
        start_page,
        limit,
    };
    info!("Searching for \"{}\"", options.query);
    let summary = driver
        .run(&options)
        .await
        .with_context(|| format!("Crawl aborted; progress saved to {}", checkpoints.path().display()))?;

    println!("crawl {}", options.query);
    println!("  pages fetched: {}", summary.pages);
    println!("  repositories processed: {}", summary.processed);
    println!("  skipped (already processed): {}", summary.skipped);
    println!("  without manifest: {}", summary.without_manifest);
    println!("  dependency records: {}", summary.dependencies);

    let exported = export::export_csv(sink.as_ref(), &config.output).await?;
    println!(
        "  exported: {} repositories, {} dependency rows",
        exported.repositories, exported.dependencies
    );
    println!("ok");
    Ok(())
}
