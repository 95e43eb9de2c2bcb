//! JWT issuing and verification (HS256).

use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;
use crate::security::backoff::now_millis;

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub id: i64,
    pub iat: u64,
    pub exp: u64,
}

/// Signs and verifies tokens with a shared secret.
pub struct JwtHandler {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtHandler {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `user_id`.
    pub fn generate_token(&self, user_id: i64) -> Result<String, AuthError> {
        let iat = now_millis() / 1000;
        let claims = Claims {
            id: user_id,
            iat,
            exp: iat.saturating_add(self.ttl.as_secs()),
        };
        tracing::debug!(user_id, ttl_secs = self.ttl.as_secs(), "Issuing token");
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding).map_err(AuthError::Signing)
    }

    /// Verify signature and expiry.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(secret: &str) -> JwtHandler {
        JwtHandler::new(secret, Duration::from_secs(24 * 3600))
    }

    #[test]
    fn test_generation_and_validation() {
        let handler = handler("test-secret");
        let token = handler.generate_token(42).unwrap();

        let claims = handler.validate_token(&token).unwrap();
        assert_eq!(claims.id, 42);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_invalid_token_rejected() {
        let result = handler("test-secret").validate_token("invalid.token.here");
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_different_secrets_reject() {
        let token = handler("secret1").generate_token(1).unwrap();
        let result = handler("secret2").validate_token(&token);
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_reported() {
        let handler = handler("test-secret");
        let now = now_millis() / 1000;
        let token = handler
            .sign(&Claims {
                id: 1,
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();

        let result = handler.validate_token(&token);
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }
}
