use super::SubjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the lineage of refresh tokens descended from one login.
#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct FamilyId(pub uuid::Uuid);

impl FamilyId {
    pub fn new() -> Self {
        FamilyId(uuid::Uuid::new_v4())
    }
}

impl Default for FamilyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for FamilyId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(FamilyId)
    }
}

/// Position within a family's rotation sequence. Exactly one generation is
/// current per family at any time.
#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
pub struct Generation(pub u32);

impl Generation {
    pub const ZERO: Generation = Generation(0);

    pub fn next(&self) -> Generation {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-side record for one refresh-token family. Never deleted inline;
/// the reaper collects records past expiry plus the audit grace window.
#[derive(Debug, Clone)]
pub struct TokenFamilyRecord {
    pub family_id: FamilyId,
    pub subject_id: SubjectId,
    pub current_generation: Generation,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub last_rotated_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl TokenFamilyRecord {
    pub fn new(family_id: FamilyId, subject_id: SubjectId, expires_at: DateTime<Utc>) -> Self {
        TokenFamilyRecord {
            family_id,
            subject_id,
            current_generation: Generation::ZERO,
            revoked: false,
            created_at: Utc::now(),
            last_rotated_at: None,
            expires_at,
        }
    }
}
