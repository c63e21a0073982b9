use crate::application_impl::*;
use crate::application_port::*;
use crate::domain::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::server::FamilyReaper;
use crate::settings::Settings;
use nanoid::nanoid;
use sqlx::{MySql, Pool};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Server {
    pub session_service: Arc<dyn SessionService>,
    pub rate_limiter: Arc<RateLimiter>,
    reaper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let alphabet: [char; 16] = [
            '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f',
        ];
        let run_id = nanoid!(10, &alphabet);

        let signing_key = std::env::var("JWT_SIGNING_KEY")
            .unwrap_or_else(|_| "turnstile-dev-secret-key".to_string())
            .into_bytes();
        let codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(CodecConfig {
            issuer: settings.session.issuer.clone(),
            audience: settings.session.audience.clone(),
            access_ttl: Duration::from_secs(settings.session.access_ttl_secs),
            refresh_ttl: Duration::from_secs(settings.session.refresh_ttl_secs),
            leeway: Duration::from_secs(settings.session.leeway_secs),
            signing_key,
        }));

        let retention_grace = Duration::from_secs(settings.session.retention_grace_secs);
        let rate_window = Duration::from_secs(settings.rate.window_secs);

        let families: Arc<dyn TokenFamilyStore>;
        let counters: Arc<dyn RateCounterStore>;
        let mut pool: Option<Pool<MySql>> = None;
        match settings.store.backend.as_str() {
            "memory" => {
                families = Arc::new(MemoryTokenFamilyStore::new());
                counters = Arc::new(MemoryRateCounterStore::new());
            }
            "mysql" => {
                let dsn = settings
                    .store
                    .mysql_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("store.mysql_dsn is required for mysql"))?;
                let mysql_pool = Pool::<MySql>::connect(dsn).await?;
                families = Arc::new(MySqlTokenFamilyStore::new(mysql_pool.clone()));
                // Rate windows are short-lived and tolerate per-instance
                // counting; a SQL round trip per request buys nothing.
                counters = Arc::new(MemoryRateCounterStore::new());
                pool = Some(mysql_pool);
            }
            "redis" => {
                let dsn = settings
                    .store
                    .redis_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("store.redis_dsn is required for redis"))?;
                let redis_client = redis::Client::open(dsn)?;
                let redis_manager = redis_client.get_connection_manager().await?;
                // Families keep a stable prefix so they survive restarts;
                // counters are ephemeral and scoped to this run.
                families = Arc::new(RedisTokenFamilyStore::new(
                    redis_manager.clone(),
                    "turnstile",
                    retention_grace,
                ));
                counters = Arc::new(RedisRateCounterStore::new(
                    redis_manager,
                    format!("turnstile:{}", run_id),
                ));
            }
            other => return Err(anyhow::anyhow!("Unknown store backend: {}", other)),
        }

        let identity: Arc<dyn IdentityProvider> = match settings.identity.backend.as_str() {
            "fake" => {
                let subjects = settings
                    .identity
                    .subjects
                    .iter()
                    .map(|s| FakeSubject {
                        email: s.email.clone(),
                        password: s.password.clone(),
                        role: s.role,
                        mfa_code: s.mfa_code.clone(),
                    })
                    .collect();
                Arc::new(FakeIdentityProvider::new(subjects))
            }
            other => return Err(anyhow::anyhow!("Unknown identity backend: {}", other)),
        };

        let session_service: Arc<dyn SessionService> = Arc::new(CoreSessionService::new(
            identity,
            codec,
            families.clone(),
            SessionConfig {
                refresh_ttl: Duration::from_secs(settings.session.refresh_ttl_secs),
                store_timeout: Duration::from_millis(settings.session.store_timeout_ms),
            },
        ));

        let rate_limiter = Arc::new(RateLimiter::new(
            counters.clone(),
            RateLimits {
                window: rate_window,
                login_max: settings.rate.login_max,
                refresh_max: settings.rate.refresh_max,
                mfa_max: settings.rate.mfa_max,
            },
        ));

        let cancel = CancellationToken::new();
        let reaper = FamilyReaper::new(
            families,
            counters,
            Duration::from_secs(settings.session.reaper_interval_secs),
            retention_grace,
            rate_window,
            cancel.clone(),
        );
        let reaper_handle = tokio::spawn(async move {
            let _ = reaper.run().await;
        });

        info!(%run_id, "server started");

        Ok(Self {
            session_service,
            rate_limiter,
            reaper_handle: Mutex::new(Some(reaper_handle)),
            cancel,
            pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        if let Ok(mut lock) = self.reaper_handle.lock() {
            if let Some(handle) = lock.take() {
                let r = handle.await;
                info!("reaper handle dropped: {:?}", r);
            }
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
