// src/auth.rs
use crate::error::{ClientError, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::dangerous_insecure_decode;
use serde::{Deserialize, Serialize};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Claims carried by the backend's session cookies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp as i64, 0)
    }

    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        (self.exp as i64) <= (now + margin).timestamp()
    }
}

// The client holds no signing secret; it only reads `exp` to schedule a refresh.
pub fn decode_claims(token: &str) -> Result<Claims> {
    dangerous_insecure_decode::<Claims>(token)
        .map(|data| data.claims)
        .map_err(|e| ClientError::ParseFailed(e.to_string()))
}

/// Picks a single cookie value out of a `Cookie` header string.
pub fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Same rule the backend enforces, checked before any request is sent.
pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ClientError::request(
            "Password must be at least 8 characters long",
        ));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ClientError::request("Password must be 72 bytes or fewer"));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn create_token(user_id: &str, exp: DateTime<Utc>) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        sub: user_id.to_string(),
        exp: exp.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"test-secret"),
    )
    .unwrap()
}
