//! Access token issuance and verification (HS256 JWT).

use crate::errors::AuthError;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Claims carried in an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Id of the authenticated user.
    pub user_id: i64,
    /// Email of the authenticated user.
    pub email: String,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

/// Signs and verifies access tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_seconds: u64,
}

impl TokenService {
    /// Build a token service from the signing secret.
    #[must_use]
    pub fn new(secret: &SecretString, ttl_seconds: u64) -> Self {
        let secret_bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret_bytes),
            decoding_key: DecodingKey::from_secret(secret_bytes),
            ttl_seconds,
        }
    }

    /// Issue an access token for a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Hashing` if signing fails (malformed key).
    pub fn sign(&self, user_id: i64, email: &str) -> Result<String, AuthError> {
        let claims = Claims {
            user_id,
            email: email.to_string(),
            exp: Utc::now().timestamp() + self.ttl_seconds as i64,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Hashing(format!("token signing failed: {e}")))
    }

    /// Verify a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for bad signatures, garbage input,
    /// or expired tokens.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(&SecretString::from("unit-test-secret"), 3600)
    }

    #[test]
    fn test_sign_then_verify() {
        let tokens = service();

        let token = tokens.sign(7, "a@b.com").unwrap();
        let claims = tokens.verify(&token).unwrap();

        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.email, "a@b.com");
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let tokens = service();
        assert!(matches!(
            tokens.verify("not-a-token"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let tokens = service();
        let other = TokenService::new(&SecretString::from("different-secret"), 3600);

        let token = tokens.sign(1, "a@b.com").unwrap();
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = service();
        // Hand-built claims with exp in the past beyond default leeway.
        let claims = Claims {
            user_id: 1,
            email: "a@b.com".to_string(),
            exp: Utc::now().timestamp() - 600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"unit-test-secret"),
        )
        .unwrap();

        assert!(matches!(tokens.verify(&token), Err(AuthError::InvalidToken)));
    }
}
