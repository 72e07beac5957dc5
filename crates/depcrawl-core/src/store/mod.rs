//! Storage abstraction for depcrawl.
//!
//! Two traits carry everything the crawl engine persists:
//!
//! | Trait | Holds | Written |
//! |-------|-------|---------|
//! | [`CheckpointStore`] | the set of fully processed repositories | after every repository |
//! | [`ResultSink`] | completed [`RepositoryRecord`]s | before the checkpoint save |
//!
//! The engine receives both as explicit objects, so tests can build
//! isolated instances. Implementations must be `Send + Sync` to work with
//! async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CrawlCheckpoint, RepositoryRecord};

/// Durable record of completed repositories.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint, or an empty one if nothing has been saved yet.
    async fn load(&self) -> Result<CrawlCheckpoint>;

    /// Replace the stored checkpoint with `checkpoint`.
    ///
    /// Readers must observe either the previous or the new checkpoint,
    /// never a partial write.
    async fn save(&self, checkpoint: &CrawlCheckpoint) -> Result<()>;

    /// Remove any stored checkpoint.
    async fn clear(&self) -> Result<()>;
}

/// Accumulates repository records for export.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Append one completed record.
    async fn append(&self, record: &RepositoryRecord) -> Result<()>;

    /// All records, one per repository, in first-append order.
    ///
    /// A repository appended more than once (a crash between append and
    /// checkpoint, then a retry) is reported once, with its latest record.
    async fn records(&self) -> Result<Vec<RepositoryRecord>>;

    /// Remove all records.
    async fn clear(&self) -> Result<()>;
}

/// Keep the last record per repository, at the position of its first append.
pub fn dedupe_records(records: Vec<RepositoryRecord>) -> Vec<RepositoryRecord> {
    let mut positions = std::collections::HashMap::new();
    let mut out: Vec<RepositoryRecord> = Vec::with_capacity(records.len());
    for record in records {
        match positions.get(&record.repo) {
            Some(&i) => out[i] = record,
            None => {
                positions.insert(record.repo.clone(), out.len());
                out.push(record);
            }
        }
    }
    out
}
