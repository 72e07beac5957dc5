//! Quota guard: keeps the crawl inside the upstream request budget.
//!
//! The guard holds the last known [`QuotaState`] behind a single async
//! mutex. Every gate decision (read the estimate, maybe wait, decrement)
//! happens while holding it, so concurrent callers can never both spend
//! the last units of budget.
//!
//! - [`QuotaGuard::await_budget`] pulls fresh numbers from the quota
//!   endpoint and blocks until the reset deadline if fewer than
//!   `low_water` requests remain. The crawl driver calls it before every
//!   search page.
//! - [`QuotaGuard::spend`] is the cheaper per-fetch gate: it checks and
//!   decrements the local estimate, pulling fresh numbers only when none
//!   are known.
//!
//! After a wait the estimate is dropped, so the next gate starts from
//! fresh upstream numbers.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use depcrawl_core::models::QuotaState;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::CrawlError;
use crate::host::RepositoryHost;

/// Reset timestamps have one-second resolution; wait past the boundary.
const RESET_SLACK: Duration = Duration::from_secs(1);

pub struct QuotaGuard {
    host: Arc<dyn RepositoryHost>,
    low_water: u64,
    estimate: Mutex<Option<QuotaState>>,
}

impl QuotaGuard {
    pub fn new(host: Arc<dyn RepositoryHost>, low_water: u64) -> Self {
        Self {
            host,
            low_water,
            estimate: Mutex::new(None),
        }
    }

    pub fn low_water(&self) -> u64 {
        self.low_water
    }

    /// Refresh from the quota endpoint and wait out the window if the budget is low.
    ///
    /// # Errors
    ///
    /// [`CrawlError::Quota`] if the endpoint is unreachable or its answer
    /// cannot be normalized. Proceeding blind risks the upstream banning
    /// the client, so this is fatal for the run.
    pub async fn await_budget(&self) -> Result<(), CrawlError> {
        let mut estimate = self.estimate.lock().await;
        *estimate = None;
        self.gate(&mut estimate).await
    }

    /// Gate a fetch costing `cost` requests, then deduct it from the estimate.
    pub async fn spend(&self, cost: u64) -> Result<(), CrawlError> {
        let mut estimate = self.estimate.lock().await;
        self.gate(&mut estimate).await?;
        if let Some(state) = estimate.as_mut() {
            state.remaining = state.remaining.saturating_sub(cost);
        }
        Ok(())
    }

    /// Current quota as reported upstream, without gating.
    pub async fn current(&self) -> Result<QuotaState, CrawlError> {
        self.host.rate_limit().await.map_err(CrawlError::Quota)
    }

    async fn gate(&self, estimate: &mut Option<QuotaState>) -> Result<(), CrawlError> {
        let state = match estimate.take() {
            Some(state) => state,
            None => {
                let state = self.current().await?;
                debug!(
                    remaining = state.remaining,
                    reset_at = %state.reset_at,
                    "quota refreshed"
                );
                state
            }
        };

        if !state.is_below(self.low_water) {
            *estimate = Some(state);
            return Ok(());
        }

        let until_reset = state.until_reset(Utc::now());
        if !until_reset.is_zero() {
            let wait = Duration::from_secs(until_reset.as_secs()) + RESET_SLACK;
            warn!(
                remaining = state.remaining,
                low_water = self.low_water,
                "Rate limit reached. Waiting {} seconds.",
                wait.as_secs()
            );
            tokio::time::sleep(wait).await;
        }
        Ok(())
    }
}
