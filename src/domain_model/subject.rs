use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct SubjectId(pub uuid::Uuid);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SubjectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(SubjectId)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Recruiter,
    HiringManager,
}

impl Role {
    /// The fixed permission set attached to tokens at issuance time.
    /// Authorization decisions read the token's snapshot, never this table.
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::Admin => &[
                Permission::ReadProfiles,
                Permission::WriteProfiles,
                Permission::ReadPostings,
                Permission::WritePostings,
                Permission::ReadReports,
                Permission::ManageSessions,
            ],
            Role::Recruiter => &[
                Permission::ReadProfiles,
                Permission::WriteProfiles,
                Permission::ReadPostings,
                Permission::WritePostings,
                Permission::ReadReports,
            ],
            Role::HiringManager => &[
                Permission::ReadProfiles,
                Permission::ReadPostings,
                Permission::ReadReports,
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Recruiter => "recruiter",
            Role::HiringManager => "hiring_manager",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "read:profiles")]
    ReadProfiles,
    #[serde(rename = "write:profiles")]
    WriteProfiles,
    #[serde(rename = "read:postings")]
    ReadPostings,
    #[serde(rename = "write:postings")]
    WritePostings,
    #[serde(rename = "read:reports")]
    ReadReports,
    #[serde(rename = "manage:sessions")]
    ManageSessions,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ReadProfiles => "read:profiles",
            Permission::WriteProfiles => "write:profiles",
            Permission::ReadPostings => "read:postings",
            Permission::WritePostings => "write:postings",
            Permission::ReadReports => "read:reports",
            Permission::ManageSessions => "manage:sessions",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the identity provider hands back after verifying credentials.
/// Read-only to this core.
#[derive(Debug, Clone)]
pub struct SubjectIdentity {
    pub subject_id: SubjectId,
    pub email: String,
    pub role: Role,
}

/// The authenticated caller as seen by protected routes. Built entirely
/// from access-token claims.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectContext {
    pub subject_id: SubjectId,
    pub role: Role,
    pub permissions: Vec<Permission>,
}

impl SubjectContext {
    pub fn has_all(&self, required: &[Permission]) -> bool {
        required.iter().all(|p| self.permissions.contains(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_permission_table_is_fixed() {
        assert!(Role::Admin.permissions().contains(&Permission::ManageSessions));
        assert!(!Role::Recruiter.permissions().contains(&Permission::ManageSessions));
        assert!(!Role::HiringManager.permissions().contains(&Permission::WriteProfiles));
    }

    #[test]
    fn permission_serde_uses_claim_strings() {
        let json = serde_json::to_string(&Permission::ReadProfiles).unwrap();
        assert_eq!(json, "\"read:profiles\"");
        let back: Permission = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Permission::ReadProfiles);
    }
}
