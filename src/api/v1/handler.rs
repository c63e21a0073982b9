use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
}

impl From<SessionTokens> for TokenResponse {
    fn from(tokens: SessionTokens) -> Self {
        TokenResponse {
            access_token: tokens.access_token.0,
            refresh_token: tokens.refresh_token.0,
            expires_in: (tokens.access_token_expires_at - Utc::now())
                .num_seconds()
                .max(0),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub mfa_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LoginResponse {
    Tokens(TokenResponse),
    MfaChallenge {
        mfa_required: bool,
        challenge_id: ChallengeId,
    },
}

pub async fn login(
    body: LoginRequest,
    session_service: Arc<dyn SessionService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let input = LoginInput {
        email: body.email,
        password: body.password,
        mfa_code: body.mfa_code,
    };
    let outcome = session_service
        .login(input)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    let response = match outcome {
        LoginOutcome::Tokens(tokens) => LoginResponse::Tokens(tokens.into()),
        LoginOutcome::MfaChallenge { challenge_id } => LoginResponse::MfaChallenge {
            mfa_required: true,
            challenge_id,
        },
    };
    Ok(warp::reply::json(&ApiResponse::ok(response)))
}

#[derive(Debug, Deserialize)]
pub struct MfaRequest {
    pub challenge_id: ChallengeId,
    pub code: String,
}

pub async fn complete_mfa(
    body: MfaRequest,
    session_service: Arc<dyn SessionService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let tokens = session_service
        .complete_mfa(MfaInput {
            challenge_id: body.challenge_id,
            code: body.code,
        })
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(TokenResponse::from(
        tokens,
    ))))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    body: RefreshRequest,
    session_service: Arc<dyn SessionService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let tokens = session_service
        .refresh(&body.refresh_token)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(TokenResponse::from(
        tokens,
    ))))
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse;

pub async fn logout(
    body: LogoutRequest,
    session_service: Arc<dyn SessionService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    session_service
        .logout(&body.refresh_token)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(LogoutResponse)))
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub subject_id: SubjectId,
    pub role: Role,
    pub permissions: Vec<Permission>,
}

pub async fn current_session(
    context: SubjectContext,
) -> Result<impl warp::Reply, warp::Rejection> {
    let response = SessionResponse {
        subject_id: context.subject_id,
        role: context.role,
        permissions: context.permissions,
    };
    Ok(warp::reply::json(&ApiResponse::ok(response)))
}

#[derive(Debug, Deserialize)]
pub struct RevokeSessionsRequest {
    pub subject_id: SubjectId,
}

#[derive(Debug, Serialize)]
pub struct RevokeSessionsResponse {
    pub revoked_families: u64,
}

pub async fn revoke_sessions(
    context: SubjectContext,
    body: RevokeSessionsRequest,
    session_service: Arc<dyn SessionService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    tracing::info!(
        admin = %context.subject_id,
        target = %body.subject_id,
        "administrative session revocation"
    );
    let revoked_families = session_service
        .revoke_subject(body.subject_id)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(
        RevokeSessionsResponse { revoked_families },
    )))
}
