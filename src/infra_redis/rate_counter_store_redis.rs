use crate::domain_model::{ClientKey, RouteClass};
use crate::domain_port::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

/// Fixed-window counters as plain INCR keys with a TTL set on the first
/// hit. Approximate across instances, which the bound tolerates.
pub struct RedisRateCounterStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisRateCounterStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisRateCounterStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, client: &ClientKey, route: RouteClass) -> String {
        format!("{}:rate:{}:{}", self.prefix, route, client.as_str())
    }

    fn store_err(e: redis::RedisError) -> CounterStoreError {
        CounterStoreError::Store(e.to_string())
    }
}

#[async_trait::async_trait]
impl RateCounterStore for RedisRateCounterStore {
    async fn incr(
        &self,
        client: &ClientKey,
        route: RouteClass,
        window: Duration,
    ) -> Result<WindowCount, CounterStoreError> {
        let key = self.key(client, route);
        let mut conn = self.conn.clone();

        let count: u64 = conn.incr(&key, 1).await.map_err(Self::store_err)?;
        if count == 1 {
            let _: () = conn
                .expire(&key, window.as_secs() as i64)
                .await
                .map_err(Self::store_err)?;
        }

        let ttl: i64 = conn.ttl(&key).await.map_err(Self::store_err)?;
        Ok(WindowCount {
            count,
            resets_in_secs: ttl.max(0) as u64,
        })
    }

    async fn prune(&self, _window: Duration) -> Result<u64, CounterStoreError> {
        // Counter keys expire with the window TTL; redis collects them.
        Ok(0)
    }
}
