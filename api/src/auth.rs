//! Team authentication via the `team_session` cookie.
//!
//! Cookie issuance (the join/login flow) lives outside this service; here we
//! only verify the HS256 JWT and hand the handler a scoped `team_id`. Every
//! session read and write downstream must be scoped by this id.

use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const TEAM_SESSION_COOKIE: &str = "team_session";

const SESSION_MAX_AGE_SECONDS: i64 = 60 * 60 * 24 * 7;

#[derive(Debug, Serialize, Deserialize)]
pub struct TeamClaims {
    pub team_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated team extracted from the `team_session` cookie.
#[derive(Debug, Clone)]
pub struct TeamSession {
    pub team_id: String,
}

fn session_secret() -> Result<String, AppError> {
    std::env::var("TEAM_SESSION_SECRET")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Internal("TEAM_SESSION_SECRET must be configured".to_string()))
}

/// Mint a team session token. Used by operator tooling and tests — the
/// student-facing issuance flow is a separate service.
pub fn encode_team_token(team_id: &str, secret: &str) -> Result<String, AppError> {
    let now = Utc::now().timestamp();
    let claims = TeamClaims {
        team_id: team_id.to_string(),
        iat: now,
        exp: now + SESSION_MAX_AGE_SECONDS,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign team token: {e}")))
}

pub fn verify_team_token(token: &str, secret: &str) -> Option<TeamClaims> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<TeamClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .ok()
    .map(|data| data.claims)
    .filter(|claims| !claims.team_id.trim().is_empty())
}

/// Pull a named cookie out of the Cookie header(s).
fn cookie_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key.trim() == name).then(|| value.trim())
        })
        .next()
}

impl<S> FromRequestParts<S> for TeamSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = cookie_value(parts, TEAM_SESSION_COOKIE).ok_or_else(|| {
            AppError::Unauthorized {
                message: "Missing team_session cookie".to_string(),
            }
        })?;

        let secret = session_secret()?;
        let claims =
            verify_team_token(token, &secret).ok_or_else(|| AppError::Unauthorized {
                message: "Invalid or expired team session".to_string(),
            })?;

        tracing::debug!(team_id = %claims.team_id, "team session verified");
        Ok(TeamSession {
            team_id: claims.team_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    const SECRET: &str = "test-secret";

    #[test]
    fn token_round_trips() {
        let token = encode_team_token("T1", SECRET).unwrap();
        let claims = verify_team_token(&token, SECRET).expect("token should verify");
        assert_eq!(claims.team_id, "T1");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = encode_team_token("T1", SECRET).unwrap();
        assert!(verify_team_token(&token, "other-secret").is_none());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(verify_team_token("not-a-jwt", SECRET).is_none());
    }

    #[test]
    fn cookie_value_finds_named_cookie_among_several() {
        let request = Request::builder()
            .header(COOKIE, "theme=dark; team_session=abc123; lang=he")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();
        assert_eq!(cookie_value(&parts, TEAM_SESSION_COOKIE), Some("abc123"));
        assert_eq!(cookie_value(&parts, "missing"), None);
    }
}
