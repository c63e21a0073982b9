use crate::domain_port::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Background sweep over the shared stores: family records past expiry
/// plus the audit grace window are deleted, finished rate windows dropped.
pub struct FamilyReaper {
    families: Arc<dyn TokenFamilyStore>,
    counters: Arc<dyn RateCounterStore>,
    interval: Duration,
    grace: Duration,
    counter_window: Duration,
    cancellation_token: CancellationToken,
}

impl FamilyReaper {
    pub fn new(
        families: Arc<dyn TokenFamilyStore>,
        counters: Arc<dyn RateCounterStore>,
        interval: Duration,
        grace: Duration,
        counter_window: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            families,
            counters,
            interval,
            grace,
            counter_window,
            cancellation_token,
        }
    }

    async fn tick_once(&self) -> anyhow::Result<()> {
        let purged = self.families.purge_expired(self.grace).await?;
        if purged > 0 {
            info!(purged, "expired token families purged");
        }

        let pruned = self.counters.prune(self.counter_window).await?;
        if pruned > 0 {
            debug!(pruned, "finished rate windows pruned");
        }

        Ok(())
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("Family reaper shutting down...");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.tick_once().await {
                        tracing::error!("Family reaper error: {:#?}", e);
                    }
                }
            }
        }
        Ok(())
    }
}
