use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lifetime of a refresh token; also the family record's GC horizon.
    pub refresh_ttl: Duration,
    /// Upper bound on any single family-store round trip.
    pub store_timeout: Duration,
}

/// Session Issuer, Refresh Rotator and Authorization Gate in one service.
/// All collaborators are injected; the family store is the only state.
pub struct CoreSessionService {
    identity: Arc<dyn IdentityProvider>,
    codec: Arc<dyn TokenCodec>,
    families: Arc<dyn TokenFamilyStore>,
    cfg: SessionConfig,
}

impl CoreSessionService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        codec: Arc<dyn TokenCodec>,
        families: Arc<dyn TokenFamilyStore>,
        cfg: SessionConfig,
    ) -> Self {
        Self {
            identity,
            codec,
            families,
            cfg,
        }
    }

    /// Bound a family-store round trip. A timeout is a transient
    /// infrastructure failure, never a token verdict.
    async fn store_call<T, F>(&self, fut: F) -> Result<T, FamilyStoreError>
    where
        F: Future<Output = Result<T, FamilyStoreError>>,
    {
        match tokio::time::timeout(self.cfg.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(FamilyStoreError::Store("family store timed out".to_string())),
        }
    }

    /// Mint an access/refresh pair for a fresh family at generation 0.
    async fn open_session(&self, identity: &SubjectIdentity) -> Result<SessionTokens, AuthError> {
        let family_expires_at = Utc::now() + self.cfg.refresh_ttl;
        let family_id = self
            .store_call(self.families.create_family(identity.subject_id, family_expires_at))
            .await
            .map_err(store_to_auth)?;

        let (refresh_token, refresh_exp) = self.codec.issue_refresh(
            identity.subject_id,
            identity.role,
            family_id,
            Generation::ZERO,
        )?;
        let (access_token, access_exp) = self.codec.issue_access(identity.subject_id, identity.role)?;

        Ok(SessionTokens {
            access_token,
            refresh_token,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_exp,
        })
    }
}

fn store_to_auth(err: FamilyStoreError) -> AuthError {
    match err {
        FamilyStoreError::Conflict => AuthError::ReuseDetected,
        FamilyStoreError::Revoked => AuthError::TokenRevoked,
        FamilyStoreError::NotFound => AuthError::TokenInvalid,
        FamilyStoreError::Store(e) => AuthError::Store(e),
    }
}

/// Short stable fingerprint for audit logs. The raw token never hits the
/// log stream.
fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..8])
}

#[async_trait::async_trait]
impl SessionService for CoreSessionService {
    async fn login(&self, input: LoginInput) -> Result<LoginOutcome, AuthError> {
        let credentials = Credentials {
            email: input.email,
            password: input.password,
            mfa_code: input.mfa_code,
        };

        match self.identity.authenticate(&credentials).await? {
            Authentication::MfaChallenge { challenge_id } => {
                Ok(LoginOutcome::MfaChallenge { challenge_id })
            }
            Authentication::Granted(identity) => {
                let tokens = self.open_session(&identity).await?;
                Ok(LoginOutcome::Tokens(tokens))
            }
        }
    }

    async fn complete_mfa(&self, input: MfaInput) -> Result<SessionTokens, AuthError> {
        let identity = self
            .identity
            .verify_mfa(input.challenge_id, &input.code)
            .await?;
        self.open_session(&identity).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, AuthError> {
        // Signature and expiry first; nothing below runs for a token we
        // cannot trust, and the store is never touched for one.
        let claims = self
            .codec
            .verify_refresh(&RefreshToken(refresh_token.to_string()))?;

        let next_expiry = Utc::now() + self.cfg.refresh_ttl;

        match self
            .store_call(
                self.families
                    .rotate(claims.family_id, claims.generation, next_expiry),
            )
            .await
        {
            Ok(next_generation) => {
                let (refresh_token, refresh_exp) = self.codec.issue_refresh(
                    claims.subject_id,
                    claims.role,
                    claims.family_id,
                    next_generation,
                )?;
                let (access_token, access_exp) =
                    self.codec.issue_access(claims.subject_id, claims.role)?;
                Ok(SessionTokens {
                    access_token,
                    refresh_token,
                    access_token_expires_at: access_exp,
                    refresh_token_expires_at: refresh_exp,
                })
            }
            Err(FamilyStoreError::Conflict) => {
                // A stale generation on a live family means an already
                // rotated-out token came back: revoke the whole lineage.
                warn!(
                    subject = %claims.subject_id,
                    family = %claims.family_id,
                    presented_generation = %claims.generation,
                    token_fingerprint = %fingerprint(refresh_token),
                    "refresh token reuse detected, revoking family"
                );
                if let Err(e) = self.store_call(self.families.revoke(claims.family_id)).await {
                    warn!(family = %claims.family_id, "revoke after reuse failed: {e}");
                }
                Err(AuthError::ReuseDetected)
            }
            Err(FamilyStoreError::Revoked) => Err(AuthError::TokenRevoked),
            Err(FamilyStoreError::NotFound) => Err(AuthError::TokenInvalid),
            Err(FamilyStoreError::Store(e)) => Err(AuthError::Store(e)),
        }
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self
            .codec
            .verify_refresh(&RefreshToken(refresh_token.to_string()))?;

        // Idempotent: logging out an already-revoked family succeeds.
        self.store_call(self.families.revoke(claims.family_id))
            .await
            .map_err(store_to_auth)
    }

    async fn authorize(
        &self,
        access_token: &str,
        required: &[Permission],
    ) -> Result<SubjectContext, AuthError> {
        // Claim-based only: no store lookup, so revocation takes effect at
        // the next refresh rather than mid-lifetime. Access tokens stay
        // short-lived for exactly this reason.
        let claims = self
            .codec
            .verify_access(&AccessToken(access_token.to_string()))?;

        let context = SubjectContext {
            subject_id: claims.subject_id,
            role: claims.role,
            permissions: claims.permissions,
        };

        if !context.has_all(required) {
            return Err(AuthError::Forbidden);
        }

        Ok(context)
    }

    async fn revoke_subject(&self, subject_id: SubjectId) -> Result<u64, AuthError> {
        self.store_call(self.families.revoke_subject(subject_id))
            .await
            .map_err(store_to_auth)
    }
}
