use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::HeaderMap;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

const TOKEN_LIFETIME_SECS: usize = 30 * 24 * 60 * 60;

// ── JWT Claims ──

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,   // user id
    pub exp: usize, // expiry (unix timestamp)
}

impl Claims {
    pub fn new(user_id: i64) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as usize;
        Self {
            sub: user_id,
            exp: now + TOKEN_LIFETIME_SECS,
        }
    }
}

/// Sign a bearer token for `user_id`. Sessions are issued elsewhere; this
/// exists for operators and tests that need a credential the service accepts.
pub fn issue_token(user_id: i64, jwt_secret: &str) -> AppResult<String> {
    encode(
        &Header::default(),
        &Claims::new(user_id),
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

// ── Extract authenticated user from Authorization header ──

pub fn extract_user_id(headers: &HeaderMap, jwt_secret: &str) -> AppResult<i64> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthorized)?;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized)?;

    Ok(data.claims.sub)
}

/// Like [`extract_user_id`], for read endpoints where identity is optional.
pub fn optional_user_id(headers: &HeaderMap, jwt_secret: &str) -> Option<i64> {
    extract_user_id(headers, jwt_secret).ok()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn issued_token_round_trips_to_user_id() {
        let token = issue_token(42, "secret").unwrap();
        assert_eq!(extract_user_id(&bearer(&token), "secret").unwrap(), 42);
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let err = extract_user_id(&HeaderMap::new(), "secret").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[test]
    fn empty_bearer_is_unauthorized() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer "));
        assert!(matches!(
            extract_user_id(&headers, "secret"),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = issue_token(7, "other").unwrap();
        assert!(extract_user_id(&bearer(&token), "secret").is_err());
        assert_eq!(optional_user_id(&bearer(&token), "secret"), None);
    }
}
