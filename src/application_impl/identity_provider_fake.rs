use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

const CHALLENGE_TTL_MINUTES: i64 = 5;

/// One seeded subject for the fake identity backend.
#[derive(Debug, Clone)]
pub struct FakeSubject {
    pub email: String,
    pub password: String,
    pub role: Role,
    /// When set, login must be completed with this code via the MFA leg.
    pub mfa_code: Option<String>,
}

struct PendingChallenge {
    email: String,
    issued_at: DateTime<Utc>,
}

/// Dev/test identity backend. Verifies seeded credentials in memory and
/// simulates the provider's MFA challenge leg. The production deployment
/// replaces this with the real identity provider integration.
pub struct FakeIdentityProvider {
    subjects: Vec<FakeSubject>,
    pending: DashMap<ChallengeId, PendingChallenge>,
}

impl FakeIdentityProvider {
    pub fn new(subjects: Vec<FakeSubject>) -> Self {
        Self {
            subjects,
            pending: DashMap::new(),
        }
    }

    fn find(&self, email: &str) -> Option<&FakeSubject> {
        self.subjects.iter().find(|s| s.email == email)
    }

    fn identity_for(subject: &FakeSubject) -> SubjectIdentity {
        SubjectIdentity {
            subject_id: fake_subject_id(&subject.email),
            email: subject.email.clone(),
            role: subject.role,
        }
    }
}

fn fake_subject_id(email: &str) -> SubjectId {
    SubjectId(uuid::Uuid::new_v5(
        &uuid::Uuid::NAMESPACE_OID,
        email.as_bytes(),
    ))
}

#[async_trait::async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Authentication, AuthError> {
        let subject = self
            .find(&credentials.email)
            .ok_or(AuthError::InvalidCredentials)?;

        if subject.password != credentials.password {
            return Err(AuthError::InvalidCredentials);
        }

        match (&subject.mfa_code, &credentials.mfa_code) {
            (None, _) => Ok(Authentication::Granted(Self::identity_for(subject))),
            (Some(expected), Some(provided)) if expected == provided => {
                Ok(Authentication::Granted(Self::identity_for(subject)))
            }
            (Some(_), Some(_)) => Err(AuthError::MfaInvalid),
            (Some(_), None) => {
                let challenge_id = ChallengeId::new();
                self.pending.insert(
                    challenge_id,
                    PendingChallenge {
                        email: subject.email.clone(),
                        issued_at: Utc::now(),
                    },
                );
                Ok(Authentication::MfaChallenge { challenge_id })
            }
        }
    }

    async fn verify_mfa(
        &self,
        challenge_id: ChallengeId,
        code: &str,
    ) -> Result<SubjectIdentity, AuthError> {
        let (_, challenge) = self
            .pending
            .remove(&challenge_id)
            .ok_or(AuthError::MfaInvalid)?;

        if Utc::now() - challenge.issued_at > Duration::minutes(CHALLENGE_TTL_MINUTES) {
            return Err(AuthError::MfaInvalid);
        }

        let subject = self.find(&challenge.email).ok_or(AuthError::MfaInvalid)?;
        match &subject.mfa_code {
            Some(expected) if expected == code => Ok(Self::identity_for(subject)),
            _ => Err(AuthError::MfaInvalid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> FakeIdentityProvider {
        FakeIdentityProvider::new(vec![
            FakeSubject {
                email: "admin@example.com".to_string(),
                password: "admin-pass".to_string(),
                role: Role::Admin,
                mfa_code: Some("424242".to_string()),
            },
            FakeSubject {
                email: "recruiter@example.com".to_string(),
                password: "recruiter-pass".to_string(),
                role: Role::Recruiter,
                mfa_code: None,
            },
        ])
    }

    fn creds(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.to_string(),
            password: password.to_string(),
            mfa_code: None,
        }
    }

    #[tokio::test]
    async fn grants_without_mfa_when_not_enrolled() {
        let provider = provider();
        let outcome = provider
            .authenticate(&creds("recruiter@example.com", "recruiter-pass"))
            .await
            .unwrap();
        match outcome {
            Authentication::Granted(identity) => assert_eq!(identity.role, Role::Recruiter),
            other => panic!("expected grant, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mfa_challenge_round_trip() {
        let provider = provider();
        let outcome = provider
            .authenticate(&creds("admin@example.com", "admin-pass"))
            .await
            .unwrap();
        let challenge_id = match outcome {
            Authentication::MfaChallenge { challenge_id } => challenge_id,
            other => panic!("expected challenge, got {other:?}"),
        };

        assert!(matches!(
            provider.verify_mfa(challenge_id, "000000").await,
            Err(AuthError::MfaInvalid)
        ));
        // The failed attempt consumed the challenge.
        assert!(matches!(
            provider.verify_mfa(challenge_id, "424242").await,
            Err(AuthError::MfaInvalid)
        ));

        let outcome = provider
            .authenticate(&creds("admin@example.com", "admin-pass"))
            .await
            .unwrap();
        let challenge_id = match outcome {
            Authentication::MfaChallenge { challenge_id } => challenge_id,
            other => panic!("expected challenge, got {other:?}"),
        };
        let identity = provider.verify_mfa(challenge_id, "424242").await.unwrap();
        assert_eq!(identity.role, Role::Admin);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let provider = provider();
        assert!(matches!(
            provider
                .authenticate(&creds("admin@example.com", "wrong"))
                .await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}
