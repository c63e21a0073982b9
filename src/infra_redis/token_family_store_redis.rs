use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

/// Family record as a redis hash, expired natively via EXPIREAT at the
/// GC horizon. The rotation script is the redis equivalent of a
/// conditional UPDATE: the whole check-and-increment runs as one atomic
/// server-side step.
const ROTATE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return -1
end
if redis.call('HGET', KEYS[1], 'revoked') == '1' then
  return -2
end
if redis.call('HGET', KEYS[1], 'gen') ~= ARGV[1] then
  return -3
end
redis.call('HSET', KEYS[1], 'gen', ARGV[2], 'rotated_at', ARGV[3], 'expires_at', ARGV[4])
redis.call('EXPIREAT', KEYS[1], ARGV[5])
return tonumber(ARGV[2])
"#;

pub struct RedisTokenFamilyStore {
    conn: ConnectionManager,
    prefix: String,
    /// Audit retention past a record's expiry, mirrored into key TTLs.
    grace: Duration,
}

impl RedisTokenFamilyStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>, grace: Duration) -> Self {
        RedisTokenFamilyStore {
            conn,
            prefix: prefix.into(),
            grace,
        }
    }

    fn family_key(&self, family_id: FamilyId) -> String {
        format!("{}:family:{}", self.prefix, family_id)
    }

    fn subject_key(&self, subject_id: SubjectId) -> String {
        format!("{}:subject:{}", self.prefix, subject_id)
    }

    fn horizon(&self, expires_at: DateTime<Utc>) -> i64 {
        expires_at.timestamp() + self.grace.as_secs() as i64
    }

    fn store_err(e: redis::RedisError) -> FamilyStoreError {
        FamilyStoreError::Store(e.to_string())
    }
}

#[async_trait::async_trait]
impl TokenFamilyStore for RedisTokenFamilyStore {
    async fn create_family(
        &self,
        subject_id: SubjectId,
        expires_at: DateTime<Utc>,
    ) -> Result<FamilyId, FamilyStoreError> {
        let family_id = FamilyId::new();
        let family_key = self.family_key(family_id);
        let subject_key = self.subject_key(subject_id);
        let horizon = self.horizon(expires_at);
        let mut conn = self.conn.clone();

        let _: () = redis::pipe()
            .atomic()
            .hset_multiple(
                &family_key,
                &[
                    ("subject", subject_id.to_string()),
                    ("gen", "0".to_string()),
                    ("revoked", "0".to_string()),
                    ("created_at", Utc::now().timestamp().to_string()),
                    ("expires_at", expires_at.timestamp().to_string()),
                ],
            )
            .expire_at(&family_key, horizon)
            .sadd(&subject_key, family_id.to_string())
            .expire_at(&subject_key, horizon)
            .query_async(&mut conn)
            .await
            .map_err(Self::store_err)?;

        Ok(family_id)
    }

    async fn rotate(
        &self,
        family_id: FamilyId,
        expected: Generation,
        expires_at: DateTime<Utc>,
    ) -> Result<Generation, FamilyStoreError> {
        let mut conn = self.conn.clone();
        let next = expected.next();

        let code: i64 = redis::Script::new(ROTATE_SCRIPT)
            .key(self.family_key(family_id))
            .arg(expected.0.to_string())
            .arg(next.0.to_string())
            .arg(Utc::now().timestamp().to_string())
            .arg(expires_at.timestamp().to_string())
            .arg(self.horizon(expires_at))
            .invoke_async(&mut conn)
            .await
            .map_err(Self::store_err)?;

        match code {
            -1 => Err(FamilyStoreError::NotFound),
            -2 => Err(FamilyStoreError::Revoked),
            -3 => Err(FamilyStoreError::Conflict),
            n if n == i64::from(next.0) => Ok(next),
            other => Err(FamilyStoreError::Store(format!(
                "unexpected rotate script result: {other}"
            ))),
        }
    }

    async fn revoke(&self, family_id: FamilyId) -> Result<(), FamilyStoreError> {
        let key = self.family_key(family_id);
        let mut conn = self.conn.clone();

        // HSET on a missing key would resurrect it without a TTL; skip
        // families redis has already expired.
        let exists: bool = conn.exists(&key).await.map_err(Self::store_err)?;
        if exists {
            let _: () = conn
                .hset(&key, "revoked", "1")
                .await
                .map_err(Self::store_err)?;
        }
        Ok(())
    }

    async fn revoke_subject(&self, subject_id: SubjectId) -> Result<u64, FamilyStoreError> {
        let subject_key = self.subject_key(subject_id);
        let mut conn = self.conn.clone();

        let members: Vec<String> = conn.smembers(&subject_key).await.map_err(Self::store_err)?;

        let mut revoked = 0;
        for member in members {
            let family_id: FamilyId = member
                .parse()
                .map_err(|_| FamilyStoreError::Store("invalid family id in index".to_string()))?;
            let key = self.family_key(family_id);
            let was_live: Option<String> =
                conn.hget(&key, "revoked").await.map_err(Self::store_err)?;
            if was_live.as_deref() == Some("0") {
                let _: () = conn
                    .hset(&key, "revoked", "1")
                    .await
                    .map_err(Self::store_err)?;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn is_revoked(&self, family_id: FamilyId) -> Result<bool, FamilyStoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .hget(self.family_key(family_id), "revoked")
            .await
            .map_err(Self::store_err)?;
        match value {
            Some(v) => Ok(v == "1"),
            None => Err(FamilyStoreError::NotFound),
        }
    }

    async fn purge_expired(&self, _grace: Duration) -> Result<u64, FamilyStoreError> {
        // Keys carry EXPIREAT at expiry + grace; redis collects them.
        Ok(0)
    }
}
