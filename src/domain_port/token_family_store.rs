use crate::domain_model::*;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FamilyStoreError {
    /// Stored generation differs from the presented one. Definitive
    /// evidence of refresh-token reuse.
    #[error("generation conflict")]
    Conflict,
    #[error("family revoked")]
    Revoked,
    #[error("family not found")]
    NotFound,
    #[error("store error: {0}")]
    Store(String),
}

/// Tracks refresh-token families: lineage, revocation, last-used marker.
/// The only shared mutable state in the core; `rotate` is the single
/// atomic operation everything else leans on.
#[async_trait::async_trait]
pub trait TokenFamilyStore: Send + Sync {
    /// Atomically insert a new family record at generation 0.
    async fn create_family(
        &self,
        subject_id: SubjectId,
        expires_at: DateTime<Utc>,
    ) -> Result<FamilyId, FamilyStoreError>;

    /// Atomic compare-and-increment: succeeds only if the stored current
    /// generation equals `expected` and the family is not revoked. Two
    /// concurrent callers presenting the same generation get exactly one
    /// success; the loser sees `Conflict`. `expires_at` moves the record's
    /// garbage-collection horizon to the newly issued refresh token.
    async fn rotate(
        &self,
        family_id: FamilyId,
        expected: Generation,
        expires_at: DateTime<Utc>,
    ) -> Result<Generation, FamilyStoreError>;

    /// Idempotent. Revoking an already-revoked or missing family is not an
    /// error.
    async fn revoke(&self, family_id: FamilyId) -> Result<(), FamilyStoreError>;

    /// Revoke every live family belonging to a subject. Returns how many
    /// were revoked.
    async fn revoke_subject(&self, subject_id: SubjectId) -> Result<u64, FamilyStoreError>;

    async fn is_revoked(&self, family_id: FamilyId) -> Result<bool, FamilyStoreError>;

    /// Delete records past expiry plus the audit grace window. Returns the
    /// number removed.
    async fn purge_expired(&self, grace: Duration) -> Result<u64, FamilyStoreError>;
}
