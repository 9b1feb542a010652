//! Access token verification
//!
//! Tokens arrive either in the `accessToken` cookie or as a bearer
//! `Authorization` header, signed HS256 with the shared platform secret.

use crate::error::{ArenaError, Result};
use crate::types::UserId;
use jsonwebtoken::{decode, DecodingKey, TokenData, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by platform access tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user document id)
    #[serde(rename = "_id")]
    pub id: UserId,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Verifier for inbound access tokens
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Verify signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<AccessClaims> {
        let token_data: TokenData<AccessClaims> =
            decode(token, &self.decoding_key, &Validation::default()).map_err(|e| {
                ArenaError::Unauthorized {
                    reason: format!("Invalid access token: {}", e),
                }
            })?;

        Ok(token_data.claims)
    }
}

/// Pull a token out of the `accessToken` cookie or `Authorization: Bearer`
/// header value, cookie first.
pub fn extract_token(cookie_header: Option<&str>, auth_header: Option<&str>) -> Option<String> {
    if let Some(cookies) = cookie_header {
        for pair in cookies.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            if parts.next() == Some("accessToken") {
                if let Some(value) = parts.next() {
                    if !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
        }
    }

    auth_header
        .and_then(|header| header.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
}
