//! JWT token generation and validation
//!
//! Access and refresh tokens both carry `{sub, role}` and are signed with
//! HMAC-SHA256, each kind with its own secret. A refresh token never verifies
//! as an access token and vice versa.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tourbook_core::{Identity, Role, TokenConfig};
use uuid::Uuid;

/// Which secret a token is signed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - user ID
    pub sub: String,
    /// JWT ID - makes every issued token unique
    pub jti: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch)
    pub exp: u64,
    /// User's role
    pub role: Role,
    /// Token kind
    pub typ: TokenKind,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity::new(self.sub.clone(), self.role)
    }
}

/// JWT token generation and validation errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Expected {expected:?} token, got {actual:?}")]
    WrongTokenKind {
        expected: TokenKind,
        actual: TokenKind,
    },

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

/// Sign `payload` as a token of `kind`
pub fn sign_token(
    payload: &Identity,
    kind: TokenKind,
    secret: &str,
    ttl_secs: u64,
    issuer: &str,
) -> Result<String, TokenError> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

    let claims = Claims {
        iss: issuer.to_string(),
        sub: payload.subject_id.clone(),
        jti: Uuid::new_v4().to_string(),
        iat: now,
        exp: now + ttl_secs,
        role: payload.role,
        typ: kind,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify signature, expiry and issuer of `token` against `secret`
pub fn verify_token(token: &str, secret: &str, issuer: &str) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&["exp", "sub", "iss"]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::ExpiredToken,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        _ => TokenError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Access + refresh token pair returned by login
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues and verifies both token kinds for one deployment
#[derive(Debug, Clone)]
pub struct TokenService {
    config: TokenConfig,
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn issue_access_token(&self, payload: &Identity) -> Result<String, TokenError> {
        sign_token(
            payload,
            TokenKind::Access,
            &self.config.access_secret,
            self.config.access_ttl_secs,
            &self.config.issuer,
        )
    }

    pub fn issue_refresh_token(&self, payload: &Identity) -> Result<String, TokenError> {
        sign_token(
            payload,
            TokenKind::Refresh,
            &self.config.refresh_secret,
            self.config.refresh_ttl_secs,
            &self.config.issuer,
        )
    }

    pub fn issue_pair(&self, payload: &Identity) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(payload)?,
            refresh_token: self.issue_refresh_token(payload)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(token, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(token, TokenKind::Refresh)
    }

    fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let secret = match expected {
            TokenKind::Access => &self.config.access_secret,
            TokenKind::Refresh => &self.config.refresh_secret,
        };
        let claims = verify_token(token, secret, &self.config.issuer)?;
        if claims.typ != expected {
            return Err(TokenError::WrongTokenKind {
                expected,
                actual: claims.typ,
            });
        }
        Ok(claims)
    }

    pub fn access_ttl_secs(&self) -> u64 {
        self.config.access_ttl_secs
    }

    pub fn refresh_ttl_secs(&self) -> u64 {
        self.config.refresh_ttl_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(&TokenConfig::default())
    }

    #[test]
    fn test_generate_and_validate_access_token() {
        let tokens = service();
        let identity = Identity::new(Uuid::new_v4().to_string(), Role::User);

        let token = tokens
            .issue_access_token(&identity)
            .expect("Failed to generate token");
        let claims = tokens.verify_access(&token).expect("Failed to validate token");

        assert_eq!(claims.sub, identity.subject_id);
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.typ, TokenKind::Access);
        assert_eq!(claims.iss, "tourbook");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.identity(), identity);
    }

    #[test]
    fn test_refresh_token_outlives_access_token() {
        let tokens = service();
        let pair = tokens
            .issue_pair(&Identity::new("u-1", Role::Admin))
            .unwrap();

        let access = tokens.verify_access(&pair.access_token).unwrap();
        let refresh = tokens.verify_refresh(&pair.refresh_token).unwrap();

        assert!(refresh.exp > access.exp);
        assert_eq!(refresh.role, Role::Admin);
    }

    #[test]
    fn test_secrets_not_interchangeable() {
        let tokens = service();
        let pair = tokens.issue_pair(&Identity::new("u-1", Role::User)).unwrap();

        assert!(matches!(
            tokens.verify_access(&pair.refresh_token),
            Err(TokenError::InvalidSignature)
        ));
        assert!(matches!(
            tokens.verify_refresh(&pair.access_token),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_kind_checked_even_with_shared_secret() {
        let config = TokenConfig {
            refresh_secret: TokenConfig::default().access_secret,
            ..Default::default()
        };
        let tokens = TokenService::new(&config);
        let refresh = tokens
            .issue_refresh_token(&Identity::new("u-1", Role::User))
            .unwrap();

        assert!(matches!(
            tokens.verify_access(&refresh),
            Err(TokenError::WrongTokenKind { .. })
        ));
    }

    #[test]
    fn test_two_tokens_for_same_payload_differ() {
        let tokens = service();
        let identity = Identity::new("u-1", Role::User);

        let first = tokens.issue_access_token(&identity).unwrap();
        let second = tokens.issue_access_token(&identity).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_invalid_token() {
        let result = service().verify_access("invalid.token.here");
        assert!(matches!(result, Err(TokenError::InvalidToken)));
    }

    #[test]
    fn test_tampered_token() {
        let tokens = service();
        let token = tokens
            .issue_access_token(&Identity::new("u-1", Role::User))
            .unwrap();

        // Flip one character of the signature
        let mut tampered = token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });

        assert!(tokens.verify_access(&tampered).is_err());
    }

    #[test]
    fn test_wrong_issuer() {
        let config = TokenConfig::default();
        let token = sign_token(
            &Identity::new("u-1", Role::User),
            TokenKind::Access,
            &config.access_secret,
            60,
            "someone-else",
        )
        .unwrap();

        assert!(verify_token(&token, &config.access_secret, &config.issuer).is_err());
    }

    #[test]
    fn test_expired_token() {
        let config = TokenConfig::default();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        // Create a token that expired 1 hour ago
        let claims = Claims {
            iss: config.issuer.clone(),
            sub: Uuid::new_v4().to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now - 7200,
            exp: now - 3600,
            role: Role::User,
            typ: TokenKind::Access,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.access_secret.as_bytes()),
        )
        .unwrap();

        let result = TokenService::new(&config).verify_access(&token);
        assert!(matches!(result, Err(TokenError::ExpiredToken)));
    }
}
