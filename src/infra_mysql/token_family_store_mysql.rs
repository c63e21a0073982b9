use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use std::time::Duration;
use uuid::Uuid;

pub struct MySqlTokenFamilyStore {
    pool: MySqlPool,
}

impl MySqlTokenFamilyStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlTokenFamilyStore { pool }
    }

    #[inline]
    fn id_as_bytes(id: &Uuid) -> &[u8] {
        id.as_bytes()
    }

    fn row_to_state(row: MySqlRow) -> Result<(Generation, bool), FamilyStoreError> {
        let generation: u32 = row
            .try_get("current_generation")
            .map_err(|e| FamilyStoreError::Store(e.to_string()))?;
        let revoked: bool = row
            .try_get("revoked")
            .map_err(|e| FamilyStoreError::Store(e.to_string()))?;
        Ok((Generation(generation), revoked))
    }

    async fn fetch_state(
        &self,
        family_id: FamilyId,
    ) -> Result<Option<(Generation, bool)>, FamilyStoreError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT current_generation, revoked
FROM token_family
WHERE family_id = ?
"#,
        )
        .bind(Self::id_as_bytes(&family_id.0))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| FamilyStoreError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_state).transpose()
    }
}

#[async_trait::async_trait]
impl TokenFamilyStore for MySqlTokenFamilyStore {
    async fn create_family(
        &self,
        subject_id: SubjectId,
        expires_at: DateTime<Utc>,
    ) -> Result<FamilyId, FamilyStoreError> {
        let family_id = FamilyId::new();

        sqlx::query(
            r#"
INSERT INTO token_family (family_id, subject_id, current_generation, revoked, created_at, expires_at)
VALUES (?, ?, 0, 0, ?, ?)
"#,
        )
        .bind(Self::id_as_bytes(&family_id.0))
        .bind(Self::id_as_bytes(&subject_id.0))
        .bind(Utc::now())
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| FamilyStoreError::Store(e.to_string()))?;

        Ok(family_id)
    }

    /// The conditional UPDATE is the whole atomicity story: the row only
    /// changes when the stored generation still matches, so of two
    /// concurrent callers exactly one sees rows_affected == 1. The
    /// follow-up SELECT only classifies the loser's failure.
    async fn rotate(
        &self,
        family_id: FamilyId,
        expected: Generation,
        expires_at: DateTime<Utc>,
    ) -> Result<Generation, FamilyStoreError> {
        let result = sqlx::query(
            r#"
UPDATE token_family
SET current_generation = current_generation + 1,
    last_rotated_at = ?,
    expires_at = ?
WHERE family_id = ? AND current_generation = ? AND revoked = 0
"#,
        )
        .bind(Utc::now())
        .bind(expires_at)
        .bind(Self::id_as_bytes(&family_id.0))
        .bind(expected.0)
        .execute(&self.pool)
        .await
        .map_err(|e| FamilyStoreError::Store(e.to_string()))?;

        if result.rows_affected() == 1 {
            return Ok(expected.next());
        }

        match self.fetch_state(family_id).await? {
            None => Err(FamilyStoreError::NotFound),
            Some((_, true)) => Err(FamilyStoreError::Revoked),
            Some((_, false)) => Err(FamilyStoreError::Conflict),
        }
    }

    async fn revoke(&self, family_id: FamilyId) -> Result<(), FamilyStoreError> {
        sqlx::query(
            r#"
UPDATE token_family
SET revoked = 1
WHERE family_id = ?
"#,
        )
        .bind(Self::id_as_bytes(&family_id.0))
        .execute(&self.pool)
        .await
        .map_err(|e| FamilyStoreError::Store(e.to_string()))?;

        Ok(())
    }

    async fn revoke_subject(&self, subject_id: SubjectId) -> Result<u64, FamilyStoreError> {
        let result = sqlx::query(
            r#"
UPDATE token_family
SET revoked = 1
WHERE subject_id = ? AND revoked = 0
"#,
        )
        .bind(Self::id_as_bytes(&subject_id.0))
        .execute(&self.pool)
        .await
        .map_err(|e| FamilyStoreError::Store(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn is_revoked(&self, family_id: FamilyId) -> Result<bool, FamilyStoreError> {
        match self.fetch_state(family_id).await? {
            Some((_, revoked)) => Ok(revoked),
            None => Err(FamilyStoreError::NotFound),
        }
    }

    async fn purge_expired(&self, grace: Duration) -> Result<u64, FamilyStoreError> {
        let grace = ChronoDuration::from_std(grace)
            .map_err(|e| FamilyStoreError::Store(e.to_string()))?;
        let cutoff = Utc::now() - grace;

        let result = sqlx::query(
            r#"
DELETE FROM token_family
WHERE expires_at < ?
"#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| FamilyStoreError::Store(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
