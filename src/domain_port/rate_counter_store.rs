use crate::domain_model::{ClientKey, RouteClass};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CounterStoreError {
    #[error("store error: {0}")]
    Store(String),
}

#[derive(Debug, Clone, Copy)]
pub struct WindowCount {
    /// Hits recorded in the current window, including this one.
    pub count: u64,
    /// Seconds until the window resets.
    pub resets_in_secs: u64,
}

/// Shared counters behind the rate limiter. Increments are atomic per key;
/// enforcement only needs to be approximate across instances.
#[async_trait::async_trait]
pub trait RateCounterStore: Send + Sync {
    /// Record one hit for `(client, route)` within the fixed window,
    /// returning the updated count.
    async fn incr(
        &self,
        client: &ClientKey,
        route: RouteClass,
        window: Duration,
    ) -> Result<WindowCount, CounterStoreError>;

    /// Drop windows that ended before `window` ago. Returns the number
    /// removed; backends with native expiry may have nothing to do.
    async fn prune(&self, window: Duration) -> Result<u64, CounterStoreError>;
}
