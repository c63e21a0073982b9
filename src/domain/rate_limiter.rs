use crate::application_port::AuthError;
use crate::domain_model::{ClientKey, RouteClass};
use crate::domain_port::RateCounterStore;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RateLimits {
    pub window: Duration,
    pub login_max: u64,
    pub refresh_max: u64,
    pub mfa_max: u64,
}

impl RateLimits {
    fn max_for(&self, route: RouteClass) -> u64 {
        match route {
            RouteClass::Login => self.login_max,
            RouteClass::Refresh => self.refresh_max,
            RouteClass::Mfa => self.mfa_max,
        }
    }
}

/// Fixed-window limiter in front of the authentication routes. Counters
/// live behind an injected store; enforcement is approximate under
/// concurrency, which is all the bound needs.
pub struct RateLimiter {
    counters: Arc<dyn RateCounterStore>,
    limits: RateLimits,
}

impl RateLimiter {
    pub fn new(counters: Arc<dyn RateCounterStore>, limits: RateLimits) -> Self {
        Self { counters, limits }
    }

    pub async fn check(&self, client: &ClientKey, route: RouteClass) -> Result<(), AuthError> {
        let window = self
            .counters
            .incr(client, route, self.limits.window)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        if window.count > self.limits.max_for(route) {
            return Err(AuthError::RateLimited {
                retry_after_secs: window.resets_in_secs.max(1),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::MemoryRateCounterStore;

    fn limiter(login_max: u64) -> RateLimiter {
        RateLimiter::new(
            Arc::new(MemoryRateCounterStore::new()),
            RateLimits {
                window: Duration::from_secs(60),
                login_max,
                refresh_max: 100,
                mfa_max: 10,
            },
        )
    }

    #[tokio::test]
    async fn allows_up_to_the_route_threshold() {
        let limiter = limiter(3);
        let client = ClientKey("10.0.0.1".to_string());

        for _ in 0..3 {
            assert!(limiter.check(&client, RouteClass::Login).await.is_ok());
        }
        let err = limiter.check(&client, RouteClass::Login).await.unwrap_err();
        assert!(matches!(err, AuthError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn thresholds_are_per_route_class() {
        let limiter = limiter(1);
        let client = ClientKey("10.0.0.2".to_string());

        assert!(limiter.check(&client, RouteClass::Login).await.is_ok());
        assert!(limiter.check(&client, RouteClass::Login).await.is_err());
        // A stricter login bound must not spill into refresh traffic.
        assert!(limiter.check(&client, RouteClass::Refresh).await.is_ok());
    }

    #[tokio::test]
    async fn clients_do_not_share_buckets() {
        let limiter = limiter(1);
        let a = ClientKey("10.0.0.3".to_string());
        let b = ClientKey("10.0.0.4".to_string());

        assert!(limiter.check(&a, RouteClass::Login).await.is_ok());
        assert!(limiter.check(&a, RouteClass::Login).await.is_err());
        assert!(limiter.check(&b, RouteClass::Login).await.is_ok());
    }
}
