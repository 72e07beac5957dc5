//! Crawl state overview and quota inspection.
//!
//! `depcrawl status` summarizes what earlier runs left on disk without
//! touching the network: how many repositories are checkpointed, how many
//! records the journal holds, and how deep the resolved trees go.
//! `depcrawl quota` asks the host for the current request budget.

use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use depcrawl_core::graph::{count_records, max_depth};
use depcrawl_core::models::{CrawlCheckpoint, RepositoryRecord};
use depcrawl_core::store::{CheckpointStore, ResultSink};

use crate::checkpoint::JsonCheckpointStore;
use crate::config::Config;
use crate::crawl::github_host;
use crate::host::RepositoryHost;
use crate::journal::JsonlSink;

/// Aggregates over the checkpoint and the journal.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlStatus {
    pub checkpointed: usize,
    pub records: usize,
    /// Records whose repository had no dependencies (or no manifest).
    pub without_dependencies: usize,
    pub dependency_records: usize,
    pub deepest: Option<u32>,
    /// Checkpointed repositories with no journal record.
    pub missing_records: usize,
}

impl CrawlStatus {
    pub fn from_state(checkpoint: &CrawlCheckpoint, records: &[RepositoryRecord]) -> Self {
        let in_journal: std::collections::HashSet<_> = records.iter().map(|r| &r.repo).collect();
        Self {
            checkpointed: checkpoint.len(),
            records: records.len(),
            without_dependencies: records.iter().filter(|r| r.dependencies.is_empty()).count(),
            dependency_records: records.iter().map(|r| count_records(&r.dependencies)).sum(),
            deepest: records
                .iter()
                .flat_map(|r| r.dependencies.iter().map(max_depth))
                .max(),
            missing_records: checkpoint
                .processed()
                .iter()
                .filter(|repo| !in_journal.contains(repo))
                .count(),
        }
    }
}

/// `depcrawl status`.
pub async fn run_status(config: &Config) -> Result<()> {
    let checkpoints = JsonCheckpointStore::new(config.output.checkpoint_path());
    let sink = JsonlSink::new(config.output.journal_path());
    let checkpoint = checkpoints.load().await?;
    let records = sink.records().await?;
    let status = CrawlStatus::from_state(&checkpoint, &records);

    println!("depcrawl status");
    println!("===============");
    println!();
    println!("  Checkpoint:    {}", describe_file(checkpoints.path()));
    println!("  Journal:       {}", describe_file(sink.path()));
    println!();
    println!("  Processed:     {}", status.checkpointed);
    println!("  Records:       {}", status.records);
    println!("  No deps:       {}", status.without_dependencies);
    println!("  Dependencies:  {}", status.dependency_records);
    match status.deepest {
        Some(depth) => println!("  Deepest:       {}", depth),
        None => println!("  Deepest:       -"),
    }
    if status.missing_records > 0 {
        println!();
        println!(
            "  warning: {} checkpointed repositories have no journal record",
            status.missing_records
        );
    }
    println!();
    Ok(())
}

/// `depcrawl quota`.
pub async fn run_quota(config: &Config) -> Result<()> {
    let host = github_host(config)?;
    let state = host.rate_limit().await?;
    let until_reset = state.until_reset(Utc::now());

    println!("remaining: {}", state.remaining);
    println!(
        "resets at: {} (in {})",
        state.reset_at.to_rfc3339(),
        format_wait(until_reset.as_secs())
    );
    if state.is_below(config.crawl.quota_low_water) {
        println!(
            "below low-water mark of {}; a crawl would wait for the reset",
            config.crawl.quota_low_water
        );
    }
    Ok(())
}

fn describe_file(path: &Path) -> String {
    match std::fs::metadata(path) {
        Ok(meta) => format!("{} ({})", path.display(), format_bytes(meta.len())),
        Err(_) => format!("{} (missing)", path.display()),
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn format_wait(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}
