use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::time::Duration;

/// In-process family store. Each `rotate` runs under the map's per-entry
/// lock, which makes the compare-and-increment atomic: of two tasks
/// presenting the same generation, the second sees the bumped value and
/// gets `Conflict`.
pub struct MemoryTokenFamilyStore {
    families: DashMap<FamilyId, TokenFamilyRecord>,
}

impl MemoryTokenFamilyStore {
    pub fn new() -> Self {
        Self {
            families: DashMap::new(),
        }
    }
}

impl Default for MemoryTokenFamilyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TokenFamilyStore for MemoryTokenFamilyStore {
    async fn create_family(
        &self,
        subject_id: SubjectId,
        expires_at: chrono::DateTime<Utc>,
    ) -> Result<FamilyId, FamilyStoreError> {
        let family_id = FamilyId::new();
        self.families.insert(
            family_id,
            TokenFamilyRecord::new(family_id, subject_id, expires_at),
        );
        Ok(family_id)
    }

    async fn rotate(
        &self,
        family_id: FamilyId,
        expected: Generation,
        expires_at: chrono::DateTime<Utc>,
    ) -> Result<Generation, FamilyStoreError> {
        let mut record = self
            .families
            .get_mut(&family_id)
            .ok_or(FamilyStoreError::NotFound)?;

        if record.revoked {
            return Err(FamilyStoreError::Revoked);
        }
        if record.current_generation != expected {
            return Err(FamilyStoreError::Conflict);
        }

        record.current_generation = expected.next();
        record.last_rotated_at = Some(Utc::now());
        record.expires_at = expires_at;
        Ok(record.current_generation)
    }

    async fn revoke(&self, family_id: FamilyId) -> Result<(), FamilyStoreError> {
        if let Some(mut record) = self.families.get_mut(&family_id) {
            record.revoked = true;
        }
        Ok(())
    }

    async fn revoke_subject(&self, subject_id: SubjectId) -> Result<u64, FamilyStoreError> {
        let mut revoked = 0;
        for mut record in self.families.iter_mut() {
            if record.subject_id == subject_id && !record.revoked {
                record.revoked = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn is_revoked(&self, family_id: FamilyId) -> Result<bool, FamilyStoreError> {
        self.families
            .get(&family_id)
            .map(|record| record.revoked)
            .ok_or(FamilyStoreError::NotFound)
    }

    async fn purge_expired(&self, grace: Duration) -> Result<u64, FamilyStoreError> {
        let cutoff = Utc::now()
            - ChronoDuration::from_std(grace)
                .map_err(|e| FamilyStoreError::Store(e.to_string()))?;
        let before = self.families.len() as u64;
        self.families.retain(|_, record| record.expires_at >= cutoff);
        Ok(before - self.families.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use std::sync::Arc;

    fn subject() -> SubjectId {
        SubjectId(uuid::Uuid::new_v4())
    }

    fn far_expiry() -> chrono::DateTime<Utc> {
        Utc::now() + ChronoDuration::hours(12)
    }

    #[tokio::test]
    async fn rotation_advances_one_generation_at_a_time() {
        let store = MemoryTokenFamilyStore::new();
        let family = store.create_family(subject(), far_expiry()).await.unwrap();

        assert_eq!(
            store.rotate(family, Generation::ZERO, far_expiry()).await.unwrap(),
            Generation(1)
        );
        assert_eq!(
            store.rotate(family, Generation(1), far_expiry()).await.unwrap(),
            Generation(2)
        );
        assert!(matches!(
            store.rotate(family, Generation(1), far_expiry()).await,
            Err(FamilyStoreError::Conflict)
        ));
    }

    #[tokio::test]
    async fn revoked_families_refuse_rotation() {
        let store = MemoryTokenFamilyStore::new();
        let family = store.create_family(subject(), far_expiry()).await.unwrap();

        store.revoke(family).await.unwrap();
        store.revoke(family).await.unwrap(); // idempotent
        assert!(store.is_revoked(family).await.unwrap());
        assert!(matches!(
            store.rotate(family, Generation::ZERO, far_expiry()).await,
            Err(FamilyStoreError::Revoked)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_rotation_has_exactly_one_winner() {
        let store = Arc::new(MemoryTokenFamilyStore::new());
        let family = store.create_family(subject(), far_expiry()).await.unwrap();

        let attempts = (0..50).map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store.rotate(family, Generation::ZERO, far_expiry()).await
            })
        });
        let results = join_all(attempts).await;

        let wins = results
            .iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Ok(Err(FamilyStoreError::Conflict))))
            .count();
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 49);
    }

    #[tokio::test]
    async fn revoke_subject_hits_every_live_family() {
        let store = MemoryTokenFamilyStore::new();
        let target = subject();
        let other = subject();
        store.create_family(target, far_expiry()).await.unwrap();
        store.create_family(target, far_expiry()).await.unwrap();
        let untouched = store.create_family(other, far_expiry()).await.unwrap();

        assert_eq!(store.revoke_subject(target).await.unwrap(), 2);
        assert_eq!(store.revoke_subject(target).await.unwrap(), 0);
        assert!(!store.is_revoked(untouched).await.unwrap());
    }

    #[tokio::test]
    async fn purge_respects_the_grace_window() {
        let store = MemoryTokenFamilyStore::new();
        let stale = store
            .create_family(subject(), Utc::now() - ChronoDuration::hours(2))
            .await
            .unwrap();
        let recent = store
            .create_family(subject(), Utc::now() - ChronoDuration::minutes(10))
            .await
            .unwrap();

        let purged = store
            .purge_expired(Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(matches!(
            store.is_revoked(stale).await,
            Err(FamilyStoreError::NotFound)
        ));
        assert!(store.is_revoked(recent).await.is_ok());
    }
}
