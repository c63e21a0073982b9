use super::AuthError;
use crate::domain_model::{ChallengeId, SubjectIdentity};

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub mfa_code: Option<String>,
}

/// Outcome of primary authentication at the external identity provider.
#[derive(Debug)]
pub enum Authentication {
    Granted(SubjectIdentity),
    MfaChallenge { challenge_id: ChallengeId },
}

/// The external identity provider, consumed as a capability. Credential
/// verification and MFA mechanics live entirely behind this port.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Authentication, AuthError>;

    async fn verify_mfa(
        &self,
        challenge_id: ChallengeId,
        code: &str,
    ) -> Result<SubjectIdentity, AuthError>;
}
