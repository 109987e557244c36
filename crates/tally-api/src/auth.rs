use std::time::Duration;

use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub session_id: Option<String>,
}

/// Verifies HS256 bearer tokens signed with the shared secret
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
    clock_skew: Duration,
}

impl JwtVerifier {
    pub fn new(config: &AppConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        validation.leeway = config.auth_clock_skew.as_secs();
        if let Some(issuer) = config.jwt_issuer.as_deref() {
            validation.set_issuer(&[issuer]);
        }
        Self {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            clock_skew: config.auth_clock_skew,
        }
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let decoded = decode::<AccessClaims>(token, &self.key, &self.validation).map_err(|error| {
            AppError::unauthorized(format!("Token validation failed: {}", sanitize(&error)))
        })?;

        if decoded.claims.sub.trim().is_empty() {
            return Err(AppError::unauthorized("Token subject is missing"));
        }
        validate_temporal_claims(&decoded.claims, self.clock_skew)?;

        Ok(AuthenticatedUser {
            user_id: decoded.claims.sub,
            session_id: decoded.claims.session_id.or(decoded.claims.jti),
        })
    }
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get("authorization")
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Authorization header is not valid UTF-8"))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AppError::unauthorized("Authorization header must be `Bearer <token>`"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized(
            "Authorization scheme must be `Bearer`",
        ));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::unauthorized("Bearer token is empty"));
    }

    Ok(token)
}

#[derive(Debug, Deserialize)]
struct AccessClaims {
    sub: String,
    exp: Option<i64>,
    iat: Option<i64>,
    nbf: Option<i64>,
    jti: Option<String>,
    session_id: Option<String>,
}

fn validate_temporal_claims(claims: &AccessClaims, clock_skew: Duration) -> Result<(), AppError> {
    let now = chrono::Utc::now().timestamp();
    let skew = i64::try_from(clock_skew.as_secs()).unwrap_or(0);

    let exp = claims
        .exp
        .ok_or_else(|| AppError::unauthorized("Token missing `exp` claim"))?;
    if exp <= now.saturating_sub(skew) {
        return Err(AppError::unauthorized("Token is expired"));
    }

    if let Some(iat) = claims.iat {
        if iat > now.saturating_add(skew) {
            return Err(AppError::unauthorized("Token `iat` is in the future"));
        }
    }

    if let Some(nbf) = claims.nbf {
        if nbf > now.saturating_add(skew) {
            return Err(AppError::unauthorized("Token is not yet valid"));
        }
    }

    Ok(())
}

fn sanitize(error: &impl std::fmt::Display) -> String {
    error.to_string().replace('\n', " ").trim().to_string()
}
