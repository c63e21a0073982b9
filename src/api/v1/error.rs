use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::reply::Reply;
use warp::{Rejection, reject};

/// Stable machine-readable reason codes. Clients branch on these, so the
/// wire strings never change.
#[derive(Debug, Clone, Copy, Error, Serialize, Eq, PartialEq)]
pub enum ApiErrorCode {
    #[error("Invalid email or password")]
    #[serde(rename = "AUTH_INVALID_CREDENTIALS")]
    InvalidCredentials,
    #[error("Invalid or expired multi-factor challenge")]
    #[serde(rename = "AUTH_MFA_INVALID")]
    MfaInvalid,
    #[error("Token is not valid")]
    #[serde(rename = "AUTH_TOKEN_INVALID")]
    TokenInvalid,
    #[error("Token has expired")]
    #[serde(rename = "AUTH_TOKEN_EXPIRED")]
    TokenExpired,
    #[error("Refresh token reuse detected; all sessions revoked")]
    #[serde(rename = "AUTH_TOKEN_REUSE")]
    TokenReuse,
    #[error("Session has been revoked")]
    #[serde(rename = "AUTH_TOKEN_REVOKED")]
    TokenRevoked,
    #[error("Permission denied")]
    #[serde(rename = "AUTH_FORBIDDEN")]
    Forbidden,
    #[error("Too many requests")]
    #[serde(rename = "AUTH_RATE_LIMITED")]
    RateLimited,
    #[error("Authentication service temporarily unavailable")]
    #[serde(rename = "AUTH_UNAVAILABLE")]
    Unavailable,
    #[error("Internal error")]
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidCredentials
            | ApiErrorCode::MfaInvalid
            | ApiErrorCode::TokenInvalid
            | ApiErrorCode::TokenExpired
            | ApiErrorCode::TokenReuse
            | ApiErrorCode::TokenRevoked => StatusCode::UNAUTHORIZED,
            ApiErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ApiErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

/// Rejection payload: the reason code plus the rate limiter's retry hint.
#[derive(Debug, Clone)]
pub struct ApiRejection {
    pub code: ApiErrorCode,
    pub retry_after_secs: Option<u64>,
}

impl reject::Reject for ApiRejection {}

impl From<ApiErrorCode> for ApiRejection {
    fn from(code: ApiErrorCode) -> Self {
        ApiRejection {
            code,
            retry_after_secs: None,
        }
    }
}

impl From<AuthError> for ApiRejection {
    fn from(error: AuthError) -> Self {
        let code = match error {
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            AuthError::MfaInvalid => ApiErrorCode::MfaInvalid,
            AuthError::TokenInvalid => ApiErrorCode::TokenInvalid,
            AuthError::TokenExpired => ApiErrorCode::TokenExpired,
            AuthError::ReuseDetected => ApiErrorCode::TokenReuse,
            AuthError::TokenRevoked => ApiErrorCode::TokenRevoked,
            AuthError::Forbidden => ApiErrorCode::Forbidden,
            AuthError::RateLimited { retry_after_secs } => {
                return ApiRejection {
                    code: ApiErrorCode::RateLimited,
                    retry_after_secs: Some(retry_after_secs),
                };
            }
            AuthError::Store(e) => {
                warn!("Store unavailable: {}", e);
                ApiErrorCode::Unavailable
            }
            AuthError::InternalError(e) => ApiErrorCode::internal(e),
        };
        ApiRejection {
            code,
            retry_after_secs: None,
        }
    }
}

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    if let Some(rejection) = err.find::<ApiRejection>() {
        let json = warp::reply::json(&ApiResponse::<()>::err(
            rejection.code,
            rejection.code.to_string(),
        ));
        let reply = warp::reply::with_status(json, rejection.code.status());
        match rejection.retry_after_secs {
            Some(secs) => {
                Ok(warp::reply::with_header(reply, "Retry-After", secs.to_string())
                    .into_response())
            }
            None => Ok(reply.into_response()),
        }
    } else {
        let json = warp::reply::json(&ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(ApiError {
                code: ApiErrorCode::InternalError,
                message: format!("Unhandled error: {:?}", err),
            }),
        });
        Ok(warp::reply::with_status(json, StatusCode::INTERNAL_SERVER_ERROR).into_response())
    }
}
