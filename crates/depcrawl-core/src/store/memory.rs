//! In-memory [`CheckpointStore`] and [`ResultSink`] implementations for testing.
//!
//! State lives behind `std::sync::RwLock`; every operation completes
//! immediately. A save counter lets tests assert when checkpoints were
//! written.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CrawlCheckpoint, RepositoryRecord};

use super::{dedupe_records, CheckpointStore, ResultSink};

/// In-memory checkpoint store.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    saved: RwLock<Option<CrawlCheckpoint>>,
    saves: AtomicUsize,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing checkpoint, as if a previous run saved it.
    pub fn with_checkpoint(checkpoint: CrawlCheckpoint) -> Self {
        Self {
            saved: RwLock::new(Some(checkpoint)),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self) -> Result<CrawlCheckpoint> {
        Ok(self.saved.read().unwrap().clone().unwrap_or_default())
    }

    async fn save(&self, checkpoint: &CrawlCheckpoint) -> Result<()> {
        *self.saved.write().unwrap() = Some(checkpoint.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.saved.write().unwrap() = None;
        Ok(())
    }
}

/// In-memory result sink.
#[derive(Default)]
pub struct InMemorySink {
    records: RwLock<Vec<RepositoryRecord>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw append count, including repeated repositories.
    pub fn append_count(&self) -> usize {
        self.records.read().unwrap().len()
    }
}

#[async_trait]
impl ResultSink for InMemorySink {
    async fn append(&self, record: &RepositoryRecord) -> Result<()> {
        self.records.write().unwrap().push(record.clone());
        Ok(())
    }

    async fn records(&self) -> Result<Vec<RepositoryRecord>> {
        Ok(dedupe_records(self.records.read().unwrap().clone()))
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().unwrap().clear();
        Ok(())
    }
}
