use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TOKEN_USE_ACCESS: &str = "access";
const TOKEN_USE_REFRESH: &str = "refresh";

#[derive(Debug, Clone)]
pub struct CodecConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Clock-skew tolerance applied to expiry only.
    pub leeway: Duration,
    pub signing_key: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: String,
    role: Role,
    permissions: Vec<Permission>,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String,
    typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RefreshClaims {
    sub: String,
    role: Role,
    permissions: Vec<Permission>,
    fid: String,
    r#gen: u32,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String,
    typ: String,
}

fn encode_access(
    subject_id: SubjectId,
    role: Role,
    cfg: &CodecConfig,
    key: &EncodingKey,
) -> Result<(String, DateTime<Utc>), AuthError> {
    let iat_dt = Utc::now();
    let exp_dt = iat_dt + cfg.access_ttl;
    let claims = AccessClaims {
        sub: subject_id.to_string(),
        role,
        permissions: role.permissions().to_vec(),
        exp: exp_dt.timestamp(),
        iat: iat_dt.timestamp(),
        iss: cfg.issuer.clone(),
        aud: cfg.audience.clone(),
        jti: uuid::Uuid::new_v4().to_string(),
        typ: TOKEN_USE_ACCESS.to_string(),
    };
    let token = encode(&Header::new(Algorithm::HS256), &claims, key)
        .map_err(|e| AuthError::InternalError(e.to_string()))?;
    Ok((token, exp_dt))
}

fn encode_refresh(
    subject_id: SubjectId,
    role: Role,
    family_id: FamilyId,
    generation: Generation,
    cfg: &CodecConfig,
    key: &EncodingKey,
) -> Result<(String, DateTime<Utc>), AuthError> {
    let iat_dt = Utc::now();
    let exp_dt = iat_dt + cfg.refresh_ttl;
    let claims = RefreshClaims {
        sub: subject_id.to_string(),
        role,
        permissions: role.permissions().to_vec(),
        fid: family_id.to_string(),
        r#gen: generation.0,
        exp: exp_dt.timestamp(),
        iat: iat_dt.timestamp(),
        iss: cfg.issuer.clone(),
        aud: cfg.audience.clone(),
        jti: uuid::Uuid::new_v4().to_string(),
        typ: TOKEN_USE_REFRESH.to_string(),
    };
    let token = encode(&Header::new(Algorithm::HS256), &claims, key)
        .map_err(|e| AuthError::InternalError(e.to_string()))?;
    Ok((token, exp_dt))
}

pub struct JwtHs256Codec {
    cfg: CodecConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtHs256Codec {
    pub fn new(cfg: CodecConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(&cfg.signing_key);
        let decoding_key = DecodingKey::from_secret(&cfg.signing_key);
        JwtHs256Codec {
            cfg,
            encoding_key,
            decoding_key,
        }
    }

    fn validation(&self) -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.validate_exp = true;
        v.leeway = self.cfg.leeway.as_secs();
        v.set_audience(&[self.cfg.audience.clone()]);
        v.set_issuer(&[self.cfg.issuer.clone()]);
        v
    }

    fn parse_subject_id(sub: &str) -> Result<SubjectId, AuthError> {
        sub.parse::<SubjectId>().map_err(|_| AuthError::TokenInvalid)
    }

    fn ts(secs: i64) -> Result<DateTime<Utc>, AuthError> {
        Utc.timestamp_opt(secs, 0)
            .single()
            .ok_or(AuthError::TokenInvalid)
    }
}

fn map_decode_error(e: jsonwebtoken::errors::Error) -> AuthError {
    match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid,
    }
}

impl TokenCodec for JwtHs256Codec {
    fn issue_access(
        &self,
        subject_id: SubjectId,
        role: Role,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
        let (token, exp_dt) = encode_access(subject_id, role, &self.cfg, &self.encoding_key)?;
        Ok((AccessToken(token), exp_dt))
    }

    fn issue_refresh(
        &self,
        subject_id: SubjectId,
        role: Role,
        family_id: FamilyId,
        generation: Generation,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError> {
        let (token, exp_dt) = encode_refresh(
            subject_id,
            role,
            family_id,
            generation,
            &self.cfg,
            &self.encoding_key,
        )?;
        Ok((RefreshToken(token), exp_dt))
    }

    fn verify_access(&self, token: &AccessToken) -> Result<AccessTokenClaims, AuthError> {
        let data = decode::<AccessClaims>(&token.0, &self.decoding_key, &self.validation())
            .map_err(map_decode_error)?;
        let claims = data.claims;
        if claims.typ != TOKEN_USE_ACCESS {
            return Err(AuthError::TokenInvalid);
        }
        Ok(AccessTokenClaims {
            subject_id: Self::parse_subject_id(&claims.sub)?,
            role: claims.role,
            permissions: claims.permissions,
            issued_at: Self::ts(claims.iat)?,
            expires_at: Self::ts(claims.exp)?,
        })
    }

    fn verify_refresh(&self, token: &RefreshToken) -> Result<RefreshTokenClaims, AuthError> {
        let data = decode::<RefreshClaims>(&token.0, &self.decoding_key, &self.validation())
            .map_err(map_decode_error)?;
        let claims = data.claims;
        if claims.typ != TOKEN_USE_REFRESH {
            return Err(AuthError::TokenInvalid);
        }
        Ok(RefreshTokenClaims {
            subject_id: Self::parse_subject_id(&claims.sub)?,
            role: claims.role,
            permissions: claims.permissions,
            family_id: claims.fid.parse().map_err(|_| AuthError::TokenInvalid)?,
            generation: Generation(claims.r#gen),
            issued_at: Self::ts(claims.iat)?,
            expires_at: Self::ts(claims.exp)?,
        })
    }
}
