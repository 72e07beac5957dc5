//! Error types for the crawl engine.
//!
//! Only two conditions stop a crawl on their own: the quota endpoint
//! failing ([`CrawlError::Quota`]) and the search index failing
//! ([`CrawlError::Page`]). Failing to persist progress
//! ([`CrawlError::Checkpoint`], [`CrawlError::Sink`]) also stops it, since
//! continuing would break resumption. Everything that goes wrong for a
//! single repository or dependency is absorbed where it happens and shows
//! up as an empty dependency list.

use thiserror::Error;

/// Failure talking to the repository host.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },
}

impl HostError {
    /// HTTP status, if the host answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            HostError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Conditions that abort a crawl run.
///
/// Checkpoint and result journal contents written before the error stay
/// valid for a resumed run.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("quota endpoint unavailable: {0}")]
    Quota(#[source] HostError),

    #[error("search page {page} failed: {source}")]
    Page {
        page: u32,
        #[source]
        source: HostError,
    },

    #[error("checkpoint store failed: {0:#}")]
    Checkpoint(#[source] anyhow::Error),

    #[error("result sink failed: {0:#}")]
    Sink(#[source] anyhow::Error),
}
