use crate::domain_model::{ClientKey, RouteClass};
use crate::domain_port::*;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::time::Duration;

struct Window {
    started_at: DateTime<Utc>,
    count: u64,
}

/// In-process fixed-window counters. The per-entry lock makes each
/// increment atomic; windows reset lazily on the first hit after expiry.
pub struct MemoryRateCounterStore {
    windows: DashMap<(ClientKey, RouteClass), Window>,
}

impl MemoryRateCounterStore {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }
}

impl Default for MemoryRateCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

fn chrono_window(window: Duration) -> Result<ChronoDuration, CounterStoreError> {
    ChronoDuration::from_std(window).map_err(|e| CounterStoreError::Store(e.to_string()))
}

#[async_trait::async_trait]
impl RateCounterStore for MemoryRateCounterStore {
    async fn incr(
        &self,
        client: &ClientKey,
        route: RouteClass,
        window: Duration,
    ) -> Result<WindowCount, CounterStoreError> {
        let span = chrono_window(window)?;
        let now = Utc::now();

        let mut entry = self
            .windows
            .entry((client.clone(), route))
            .or_insert_with(|| Window {
                started_at: now,
                count: 0,
            });

        if now - entry.started_at >= span {
            entry.started_at = now;
            entry.count = 0;
        }
        entry.count += 1;

        let resets_in = (entry.started_at + span - now).num_seconds().max(0) as u64;
        Ok(WindowCount {
            count: entry.count,
            resets_in_secs: resets_in,
        })
    }

    async fn prune(&self, window: Duration) -> Result<u64, CounterStoreError> {
        let span = chrono_window(window)?;
        let cutoff = Utc::now() - span;
        let before = self.windows.len() as u64;
        self.windows.retain(|_, w| w.started_at >= cutoff);
        Ok(before - self.windows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_within_a_window() {
        let store = MemoryRateCounterStore::new();
        let client = ClientKey("192.0.2.1".to_string());
        let window = Duration::from_secs(60);

        for expected in 1..=5 {
            let count = store
                .incr(&client, RouteClass::Login, window)
                .await
                .unwrap();
            assert_eq!(count.count, expected);
            assert!(count.resets_in_secs <= 60);
        }
    }

    #[tokio::test]
    async fn window_resets_after_expiry() {
        let store = MemoryRateCounterStore::new();
        let client = ClientKey("192.0.2.2".to_string());
        let window = Duration::from_millis(50);

        store.incr(&client, RouteClass::Login, window).await.unwrap();
        store.incr(&client, RouteClass::Login, window).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let count = store
            .incr(&client, RouteClass::Login, window)
            .await
            .unwrap();
        assert_eq!(count.count, 1);
    }

    #[tokio::test]
    async fn prune_drops_only_finished_windows() {
        let store = MemoryRateCounterStore::new();
        let stale = ClientKey("192.0.2.3".to_string());
        let live = ClientKey("192.0.2.4".to_string());

        store
            .incr(&stale, RouteClass::Login, Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        store
            .incr(&live, RouteClass::Login, Duration::from_secs(60))
            .await
            .unwrap();

        let pruned = store.prune(Duration::from_millis(10)).await.unwrap();
        assert_eq!(pruned, 1);
    }
}
