use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderValue},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// Cookie carrying the session token. The value keeps the `Bearer ` prefix,
/// so header and cookie transport parse identically.
pub const SESSION_COOKIE: &str = "Authorization";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    /// Snapshot of the account flag at signin time. The change-password gate
    /// reads this, so verifying after signin needs a fresh signin to count.
    pub verified: bool,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        let SessionConfig { secret, ttl_hours } = state.config.session.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::from_secs((ttl_hours as u64) * 3600),
        }
    }
}

impl SessionKeys {
    pub fn sign(&self, user_id: Uuid, email: &str, verified: bool) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            verified,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "session token signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }

    pub fn max_age_secs(&self) -> i64 {
        self.ttl.as_secs() as i64
    }
}

pub fn session_cookie(
    token: &str,
    max_age_secs: i64,
    secure: bool,
) -> anyhow::Result<HeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE}=Bearer {token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie)?)
}

pub fn clear_session_cookie(secure: bool) -> anyhow::Result<HeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie)?)
}

/// Decoded claims for a protected route. Tries the bearer header first, then
/// the cookie set at signin.
pub struct AuthSession(pub Claims);

fn token_from_parts(parts: &Parts) -> Option<String> {
    if let Some(value) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }
    let cookies = parts.headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|part| {
        let (name, value) = part.trim().split_once('=')?;
        if name != SESSION_COOKIE {
            return None;
        }
        value.strip_prefix("Bearer ").map(|t| t.to_string())
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = SessionKeys::from_ref(state);
        let token = token_from_parts(parts).ok_or(ApiError::Unauthenticated)?;
        match keys.verify(&token) {
            Ok(claims) => Ok(AuthSession(claims)),
            Err(_) => {
                warn!("invalid or expired session token");
                Err(ApiError::Unauthenticated)
            }
        }
    }
}
