use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid or expired multi-factor challenge")]
    MfaInvalid,
    #[error("token invalid")]
    TokenInvalid,
    #[error("token expired")]
    TokenExpired,
    #[error("refresh token reuse detected")]
    ReuseDetected,
    #[error("token family revoked")]
    TokenRevoked,
    #[error("permission denied")]
    Forbidden,
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub mfa_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MfaInput {
    pub challenge_id: ChallengeId,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct SessionTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Login either completes with a token pair or stops at an MFA challenge
/// the client must answer through the mfa route.
#[derive(Debug)]
pub enum LoginOutcome {
    Tokens(SessionTokens),
    MfaChallenge { challenge_id: ChallengeId },
}

#[async_trait::async_trait]
pub trait SessionService: Send + Sync {
    async fn login(&self, input: LoginInput) -> Result<LoginOutcome, AuthError>;
    async fn complete_mfa(&self, input: MfaInput) -> Result<SessionTokens, AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, AuthError>;
    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError>;
    async fn authorize(
        &self,
        access_token: &str,
        required: &[Permission],
    ) -> Result<SubjectContext, AuthError>;
    async fn revoke_subject(&self, subject_id: SubjectId) -> Result<u64, AuthError>;
}
