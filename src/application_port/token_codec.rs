use super::{AccessToken, AuthError, RefreshToken};
use crate::domain_model::*;
use chrono::{DateTime, Utc};

/// Decoded access-token claims, verified and parsed.
#[derive(Debug, Clone)]
pub struct AccessTokenClaims {
    pub subject_id: SubjectId,
    pub role: Role,
    pub permissions: Vec<Permission>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Decoded refresh-token claims. Carries the full identity snapshot plus
/// the family lineage, so rotation never needs an identity lookup.
#[derive(Debug, Clone)]
pub struct RefreshTokenClaims {
    pub subject_id: SubjectId,
    pub role: Role,
    pub permissions: Vec<Permission>,
    pub family_id: FamilyId,
    pub generation: Generation,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies session tokens. Pure CPU, never suspends; signature
/// verification always precedes any use of the claims. The permission set
/// is derived from the role at issuance, once.
pub trait TokenCodec: Send + Sync {
    fn issue_access(
        &self,
        subject_id: SubjectId,
        role: Role,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError>;

    fn issue_refresh(
        &self,
        subject_id: SubjectId,
        role: Role,
        family_id: FamilyId,
        generation: Generation,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError>;

    fn verify_access(&self, token: &AccessToken) -> Result<AccessTokenClaims, AuthError>;

    fn verify_refresh(&self, token: &RefreshToken) -> Result<RefreshTokenClaims, AuthError>;
}
