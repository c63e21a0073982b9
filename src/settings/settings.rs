use crate::domain_model::Role;
use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub session: Session,
    pub identity: Identity,
    pub store: Store,
    pub rate: Rate,
    pub http: Http,
    pub log: Log,
}

#[derive(Debug, Deserialize)]
pub struct Session {
    pub issuer: String,
    pub audience: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    /// Clock-skew tolerance on token expiry checks.
    pub leeway_secs: u64,
    /// Bound on any single token-store round trip.
    pub store_timeout_ms: u64,
    pub reaper_interval_secs: u64,
    /// Audit retention for family records past their expiry.
    pub retention_grace_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Identity {
    pub backend: String, // "fake"; the real provider integration deploys separately
    #[serde(default)]
    pub subjects: Vec<IdentitySubject>,
}

/// Seed data for the fake identity backend.
#[derive(Debug, Deserialize)]
pub struct IdentitySubject {
    pub email: String,
    pub password: String,
    pub role: Role,
    pub mfa_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "memory", "mysql" or "redis"
    pub mysql_dsn: Option<String>,
    pub redis_dsn: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Rate {
    pub window_secs: u64,
    pub login_max: u64,
    pub refresh_max: u64,
    pub mfa_max: u64,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub cert_path: String,
    pub key_path: String,
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
