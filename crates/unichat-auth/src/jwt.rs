//! Token generation and validation
//!
//! HMAC-SHA256 signed tokens carrying the authenticated user's identity and
//! the conversation they were issued for. Signature and expiry are checked
//! here; whether the token is still honored (not logged out, not pruned) is
//! the auth service's session-record check.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use unichat_core::UserRecord;

/// Token claims
///
/// Exactly the fields that round-trip through the credential: any verifier
/// rejects tokens missing `exp` or carrying an unparseable signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Owning user's record id
    pub user_id: String,
    /// Login name (lowercased email)
    pub username: String,
    /// Email address
    pub email: String,
    /// Role string at issue time
    pub role: String,
    /// Issued at (Unix epoch seconds)
    pub iat: i64,
    /// Expiry (Unix epoch seconds)
    pub exp: i64,
    /// Conversation the token was issued for
    pub session_id: String,
}

impl Claims {
    /// Build claims for a user, expiring `ttl_hours` from `now`
    pub fn for_user(
        user: &UserRecord,
        session_id: &str,
        now: DateTime<Utc>,
        ttl_hours: i64,
    ) -> Self {
        Self {
            user_id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(ttl_hours)).timestamp(),
            session_id: session_id.to_string(),
        }
    }

    /// Expiry as a UTC timestamp
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// Token validation errors
///
/// The two sub-kinds a caller may want to log differently are kept
/// distinguishable here; the service collapses all of them into one
/// outward invalid-token outcome.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Invalid token signature")]
    Signature,

    #[error("Malformed token")]
    Malformed,

    #[error("Token has been revoked")]
    Revoked,

    #[error("Failed to encode token: {0}")]
    Encoding(String),
}

/// Sign claims into a token string
pub fn encode_token(secret: &str, claims: &Claims) -> Result<String, TokenError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TokenError::Encoding(e.to_string()))
}

/// Validate a token string and extract its claims
///
/// Rejects expired tokens with no leeway: a token expiring at exactly now
/// is invalid.
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::Signature,
        _ => TokenError::Malformed,
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> UserRecord {
        UserRecord {
            id: "u-1".to_string(),
            username: "jane@example.com".to_string(),
            email: "jane@example.com".to_string(),
            password_hash: "hash".to_string(),
            name: "Jane Doe".to_string(),
            mobile: "+201234567890".to_string(),
            faculty: "Engineering".to_string(),
            role: "user".to_string(),
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
            session_id: "conv-1".to_string(),
        }
    }

    #[test]
    fn test_encode_and_decode_round_trip() {
        let user = sample_user();
        let claims = Claims::for_user(&user, "conv-2", Utc::now(), 24);

        let token = encode_token("test-secret", &claims).unwrap();
        let decoded = decode_token("test-secret", &token).unwrap();

        assert_eq!(decoded.user_id, "u-1");
        assert_eq!(decoded.username, "jane@example.com");
        assert_eq!(decoded.email, "jane@example.com");
        assert_eq!(decoded.role, "user");
        assert_eq!(decoded.session_id, "conv-2");
        assert_eq!(decoded.exp, claims.exp);
    }

    #[test]
    fn test_garbage_token_is_malformed() {
        let result = decode_token("test-secret", "not.a.token");
        assert!(matches!(result, Err(TokenError::Malformed)));
    }

    #[test]
    fn test_wrong_secret() {
        let user = sample_user();
        let claims = Claims::for_user(&user, "conv", Utc::now(), 24);
        let token = encode_token("secret-one", &claims).unwrap();

        let result = decode_token("secret-two", &token);
        assert!(matches!(result, Err(TokenError::Signature)));
    }

    #[test]
    fn test_expired_token() {
        let user = sample_user();
        // Issued two hours ago, expired one hour ago
        let claims = Claims::for_user(&user, "conv", Utc::now() - Duration::hours(2), 1);
        let token = encode_token("test-secret", &claims).unwrap();

        let result = decode_token("test-secret", &token);
        assert!(matches!(result, Err(TokenError::Expired)));
    }

    #[test]
    fn test_missing_exp_is_rejected() {
        // Hand-build a payload without the exp claim
        #[derive(Serialize)]
        struct NoExp {
            user_id: String,
            iat: i64,
        }

        let token = encode(
            &Header::new(Algorithm::HS256),
            &NoExp {
                user_id: "u-1".to_string(),
                iat: Utc::now().timestamp(),
            },
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(decode_token("test-secret", &token).is_err());
    }
}
