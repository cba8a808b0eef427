//! Caller identity resolution
//!
//! One resolver, two strategies:
//! 1. Trusted identity headers (`x-user-id` + `x-user-role`) set by the
//!    gateway, optionally signed with HMAC-SHA256 over
//!    `"{user_id}:{role}:{timestamp}"`.
//! 2. Access token from the `accessToken` cookie or `Authorization: Bearer`.
//!
//! Headers win when both are present. When a gateway secret is configured,
//! unsigned or badly signed headers are rejected outright rather than
//! falling through to the token path.

use super::cookies::read_cookie;
use super::jwt::{TokenError, TokenService};
use crate::error::AppError;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tourbook_core::{AppConfig, CookieConfig, Identity, IdentityConfig, Role};

type HmacSha256 = Hmac<Sha256>;

/// Identity resolution errors
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("No token supplied")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken(#[source] TokenError),

    #[error("Untrusted identity headers: {0}")]
    UntrustedHeaders(String),

    #[error("{0}")]
    Forbidden(String),
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Forbidden(msg) => AppError::Forbidden(msg),
            IdentityError::UntrustedHeaders(_) => {
                AppError::Unauthenticated("Invalid identity headers".to_string())
            }
            other => AppError::Unauthenticated(other.to_string()),
        }
    }
}

/// Which strategy produced the identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    TrustedHeaders,
    Token,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub identity: Identity,
    pub source: IdentitySource,
}

/// Role gate applied to a resolved identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy<'a> {
    /// Any USER or ADMIN
    Authenticated,
    AdminOnly,
    /// The resource owner, or any admin
    OwnerOrAdmin(&'a str),
}

impl AccessPolicy<'_> {
    pub fn check(&self, identity: &Identity) -> Result<(), IdentityError> {
        match self {
            AccessPolicy::Authenticated => Ok(()),
            AccessPolicy::AdminOnly if identity.is_admin() => Ok(()),
            AccessPolicy::AdminOnly => Err(IdentityError::Forbidden(
                "Admin role required".to_string(),
            )),
            AccessPolicy::OwnerOrAdmin(owner) if identity.can_act_for(owner) => Ok(()),
            AccessPolicy::OwnerOrAdmin(_) => Err(IdentityError::Forbidden(
                "Not allowed to access this resource".to_string(),
            )),
        }
    }

    /// Role named in audit records
    pub fn required_role(&self) -> Option<&'static str> {
        match self {
            AccessPolicy::Authenticated => None,
            AccessPolicy::AdminOnly => Some(Role::Admin.as_str()),
            AccessPolicy::OwnerOrAdmin(_) => Some("OWNER_OR_ADMIN"),
        }
    }
}

/// Access token from the session cookie, else from `Authorization: Bearer`
pub fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    read_cookie(headers, cookie_name).or_else(|| bearer_token(headers))
}

/// Token carried in `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn mac(secret: &str) -> Result<HmacSha256, IdentityError> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| IdentityError::UntrustedHeaders("unusable gateway secret".to_string()))
}

/// Hex HMAC-SHA256 over `"{user_id}:{role}:{timestamp}"`
pub fn sign_identity(
    secret: &str,
    user_id: &str,
    role: &str,
    timestamp: i64,
) -> Result<String, IdentityError> {
    let mut mac = mac(secret)?;
    mac.update(format!("{user_id}:{role}:{timestamp}").as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a signature produced by [`sign_identity`]
pub fn verify_identity_signature(
    secret: &str,
    user_id: &str,
    role: &str,
    timestamp: i64,
    signature: &str,
) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = mac(secret) else {
        return false;
    };
    mac.update(format!("{user_id}:{role}:{timestamp}").as_bytes());
    mac.verify_slice(&expected).is_ok()
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Resolves the caller of one request
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    tokens: TokenService,
    cookies: CookieConfig,
    config: IdentityConfig,
}

impl IdentityResolver {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            tokens: TokenService::new(&config.tokens),
            cookies: config.cookies.clone(),
            config: config.identity.clone(),
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Trusted headers first, then token verification
    pub fn resolve(&self, headers: &HeaderMap) -> Result<ResolvedIdentity, IdentityError> {
        if let Some(identity) = self.resolve_headers(headers)? {
            return Ok(ResolvedIdentity {
                identity,
                source: IdentitySource::TrustedHeaders,
            });
        }
        self.resolve_token(headers)
    }

    /// Token path only; the gateway never trusts incoming identity headers
    pub fn resolve_token(&self, headers: &HeaderMap) -> Result<ResolvedIdentity, IdentityError> {
        let token =
            extract_token(headers, &self.cookies.access_name).ok_or(IdentityError::MissingToken)?;
        let claims = self
            .tokens
            .verify_access(&token)
            .map_err(IdentityError::InvalidToken)?;

        Ok(ResolvedIdentity {
            identity: claims.identity(),
            source: IdentitySource::Token,
        })
    }

    /// `Ok(None)` when the identity header pair is not present
    fn resolve_headers(&self, headers: &HeaderMap) -> Result<Option<Identity>, IdentityError> {
        let (Some(user_id), Some(role)) = (
            header_str(headers, &self.config.user_id_header),
            header_str(headers, &self.config.role_header),
        ) else {
            return Ok(None);
        };

        if let Some(secret) = self.config.gateway_secret.as_deref() {
            let timestamp = header_str(headers, &self.config.timestamp_header)
                .ok_or_else(|| IdentityError::UntrustedHeaders("missing timestamp".to_string()))?
                .parse::<i64>()
                .map_err(|_| IdentityError::UntrustedHeaders("malformed timestamp".to_string()))?;
            let signature = header_str(headers, &self.config.signature_header)
                .ok_or_else(|| IdentityError::UntrustedHeaders("missing signature".to_string()))?;

            let skew = (Utc::now().timestamp() - timestamp).unsigned_abs();
            if skew > self.config.max_skew_secs {
                return Err(IdentityError::UntrustedHeaders(format!(
                    "timestamp skew {skew}s"
                )));
            }
            if !verify_identity_signature(secret, user_id, role, timestamp, signature) {
                return Err(IdentityError::UntrustedHeaders(
                    "signature mismatch".to_string(),
                ));
            }
        }

        let role: Role = role
            .parse()
            .map_err(|_| IdentityError::UntrustedHeaders(format!("unknown role {role}")))?;

        Ok(Some(Identity::new(user_id, role)))
    }

    /// Remove any identity headers a client tried to supply
    pub fn strip_identity_headers(&self, headers: &mut HeaderMap) {
        for name in [
            &self.config.user_id_header,
            &self.config.role_header,
            &self.config.timestamp_header,
            &self.config.signature_header,
        ] {
            headers.remove(name.as_str());
        }
    }

    /// Headers the gateway injects for a verified identity
    pub fn identity_headers(
        &self,
        identity: &Identity,
    ) -> Result<Vec<(HeaderName, HeaderValue)>, IdentityError> {
        let invalid = |e: String| IdentityError::UntrustedHeaders(e);
        let name = |n: &str| HeaderName::try_from(n).map_err(|e| invalid(e.to_string()));
        let value = |v: &str| HeaderValue::from_str(v).map_err(|e| invalid(e.to_string()));

        let role = identity.role.as_str();
        let mut out = vec![
            (
                name(&self.config.user_id_header)?,
                value(&identity.subject_id)?,
            ),
            (name(&self.config.role_header)?, value(role)?),
        ];

        if let Some(secret) = self.config.gateway_secret.as_deref() {
            let timestamp = Utc::now().timestamp();
            let signature = sign_identity(secret, &identity.subject_id, role, timestamp)?;
            out.push((
                name(&self.config.timestamp_header)?,
                value(&timestamp.to_string())?,
            ));
            out.push((name(&self.config.signature_header)?, value(&signature)?));
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(secret: Option<&str>) -> IdentityResolver {
        let mut config = AppConfig::default();
        config.identity.gateway_secret = secret.map(str::to_string);
        IdentityResolver::new(&config)
    }

    fn bearer(headers: &mut HeaderMap, token: &str) {
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
    }

    #[test]
    fn test_extract_prefers_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("accessToken=from-cookie"));
        bearer(&mut headers, "from-header");

        assert_eq!(
            extract_token(&headers, "accessToken").as_deref(),
            Some("from-cookie")
        );

        headers.remove(header::COOKIE);
        assert_eq!(
            extract_token(&headers, "accessToken").as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn test_extract_ignores_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpw"));
        assert!(extract_token(&headers, "accessToken").is_none());
    }

    #[test]
    fn test_resolve_missing_token() {
        let result = resolver(None).resolve(&HeaderMap::new());
        assert!(matches!(result, Err(IdentityError::MissingToken)));
        assert_eq!(
            result.unwrap_err().to_string(),
            "No token supplied"
        );
    }

    #[test]
    fn test_resolve_from_token() {
        let resolver = resolver(None);
        let token = resolver
            .tokens()
            .issue_access_token(&Identity::new("u-1", Role::User))
            .unwrap();
        let mut headers = HeaderMap::new();
        bearer(&mut headers, &token);

        let resolved = resolver.resolve(&headers).unwrap();
        assert_eq!(resolved.identity, Identity::new("u-1", Role::User));
        assert_eq!(resolved.source, IdentitySource::Token);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let resolver = resolver(None);
        let token = resolver
            .tokens()
            .issue_refresh_token(&Identity::new("u-1", Role::User))
            .unwrap();
        let mut headers = HeaderMap::new();
        bearer(&mut headers, &token);

        assert!(matches!(
            resolver.resolve(&headers),
            Err(IdentityError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_unsigned_headers_take_precedence() {
        let resolver = resolver(None);
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("u-9"));
        headers.insert("x-user-role", HeaderValue::from_static("ADMIN"));
        bearer(&mut headers, "garbage");

        let resolved = resolver.resolve(&headers).unwrap();
        assert_eq!(resolved.identity, Identity::new("u-9", Role::Admin));
        assert_eq!(resolved.source, IdentitySource::TrustedHeaders);
    }

    #[test]
    fn test_partial_headers_fall_back_to_token() {
        let resolver = resolver(None);
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("u-9"));

        assert!(matches!(
            resolver.resolve(&headers),
            Err(IdentityError::MissingToken)
        ));
    }

    #[test]
    fn test_signed_headers_round_trip() {
        let resolver = resolver(Some("hop-secret"));
        let mut headers = HeaderMap::new();
        for (name, value) in resolver
            .identity_headers(&Identity::new("u-3", Role::User))
            .unwrap()
        {
            headers.insert(name, value);
        }
        assert!(headers.contains_key("x-gateway-signature"));

        let resolved = resolver.resolve(&headers).unwrap();
        assert_eq!(resolved.identity, Identity::new("u-3", Role::User));
    }

    #[test]
    fn test_bad_signature_never_falls_back() {
        let resolver = resolver(Some("hop-secret"));
        let token = resolver
            .tokens()
            .issue_access_token(&Identity::new("u-1", Role::User))
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("u-1"));
        headers.insert("x-user-role", HeaderValue::from_static("ADMIN"));
        headers.insert(
            "x-gateway-timestamp",
            HeaderValue::from_str(&Utc::now().timestamp().to_string()).unwrap(),
        );
        headers.insert("x-gateway-signature", HeaderValue::from_static("deadbeef"));
        bearer(&mut headers, &token);

        assert!(matches!(
            resolver.resolve(&headers),
            Err(IdentityError::UntrustedHeaders(_))
        ));
    }

    #[test]
    fn test_stale_signature_rejected() {
        let resolver = resolver(Some("hop-secret"));
        let old = Utc::now().timestamp() - 3600;
        let signature = sign_identity("hop-secret", "u-1", "USER", old).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("u-1"));
        headers.insert("x-user-role", HeaderValue::from_static("USER"));
        headers.insert(
            "x-gateway-timestamp",
            HeaderValue::from_str(&old.to_string()).unwrap(),
        );
        headers.insert(
            "x-gateway-signature",
            HeaderValue::from_str(&signature).unwrap(),
        );

        assert!(matches!(
            resolver.resolve(&headers),
            Err(IdentityError::UntrustedHeaders(_))
        ));
    }

    #[test]
    fn test_signature_binds_role() {
        let ts = 1_700_000_000;
        let signature = sign_identity("k", "u-1", "USER", ts).unwrap();

        assert!(verify_identity_signature("k", "u-1", "USER", ts, &signature));
        assert!(!verify_identity_signature("k", "u-1", "ADMIN", ts, &signature));
        assert!(!verify_identity_signature("other", "u-1", "USER", ts, &signature));
        assert!(!verify_identity_signature("k", "u-1", "USER", ts, "not-hex"));
    }

    #[test]
    fn test_strip_identity_headers() {
        let resolver = resolver(None);
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("forged"));
        headers.insert("x-user-role", HeaderValue::from_static("ADMIN"));
        headers.insert("x-gateway-signature", HeaderValue::from_static("00"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));

        resolver.strip_identity_headers(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::ACCEPT));
    }

    #[test]
    fn test_access_policies() {
        let user = Identity::new("u-1", Role::User);
        let admin = Identity::new("a-1", Role::Admin);

        assert!(AccessPolicy::Authenticated.check(&user).is_ok());
        assert!(AccessPolicy::AdminOnly.check(&admin).is_ok());
        assert!(matches!(
            AccessPolicy::AdminOnly.check(&user),
            Err(IdentityError::Forbidden(_))
        ));
        assert!(AccessPolicy::OwnerOrAdmin("u-1").check(&user).is_ok());
        assert!(AccessPolicy::OwnerOrAdmin("u-2").check(&user).is_err());
        assert!(AccessPolicy::OwnerOrAdmin("u-2").check(&admin).is_ok());
    }
}
