//! Tourbook Configuration Management
//!
//! Every service builds one [`AppConfig`] at startup (defaults, optional TOML
//! file, environment overrides) and hands it to its components by reference.
//! Nothing below the binary entry point reads the environment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEV_ACCESS_SECRET: &str = "development-access-secret-change-in-production";
const DEV_REFRESH_SECRET: &str = "development-refresh-secret-change-in-production";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Token signing configuration
    pub tokens: TokenConfig,

    /// Session cookie attributes
    pub cookies: CookieConfig,

    /// Identity propagation between gateway and services
    pub identity: IdentityConfig,

    /// Base URLs of the individual services
    pub services: ServiceUrls,

    /// Outbound remote verification settings
    pub remote: RemoteConfig,

    /// Password hashing parameters
    pub password: PasswordConfig,

    /// Credential database
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables on top of defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Apply environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("API_PORT") {
            self.server.port = parse_env("API_PORT", port)?;
        }

        // Tokens
        if let Ok(secret) = std::env::var("SECRET_KEY_ACCESS_TOKEN") {
            self.tokens.access_secret = secret;
        }
        if let Ok(secret) = std::env::var("SECRET_KEY_REFRESH_TOKEN") {
            self.tokens.refresh_secret = secret;
        }
        if let Ok(ttl) = std::env::var("ACCESS_TOKEN_TTL_SECS") {
            self.tokens.access_ttl_secs = parse_env("ACCESS_TOKEN_TTL_SECS", ttl)?;
        }
        if let Ok(ttl) = std::env::var("REFRESH_TOKEN_TTL_SECS") {
            self.tokens.refresh_ttl_secs = parse_env("REFRESH_TOKEN_TTL_SECS", ttl)?;
        }

        // Cookies
        if let Ok(secure) = std::env::var("COOKIE_SECURE") {
            self.cookies.secure = parse_env("COOKIE_SECURE", secure)?;
        }
        if let Ok(domain) = std::env::var("COOKIE_DOMAIN") {
            self.cookies.domain = Some(domain).filter(|d| !d.is_empty());
        }

        // Identity propagation
        if let Ok(secret) = std::env::var("GATEWAY_SHARED_SECRET") {
            self.identity.gateway_secret = Some(secret).filter(|s| !s.is_empty());
        }

        // Service URLs
        if let Ok(url) = std::env::var("AUTH_SERVICE_URL") {
            self.services.auth = url;
        }
        if let Ok(url) = std::env::var("USER_SERVICE_URL") {
            self.services.user = url;
        }
        if let Ok(url) = std::env::var("TOUR_SERVICE_URL") {
            self.services.tour = url;
        }
        if let Ok(url) = std::env::var("REVIEW_SERVICE_URL") {
            self.services.review = url;
        }
        if let Ok(url) = std::env::var("BOOKING_SERVICE_URL") {
            self.services.booking = url;
        }

        // Remote verification
        if let Ok(timeout) = std::env::var("REMOTE_TIMEOUT_MS") {
            self.remote.timeout_ms = parse_env("REMOTE_TIMEOUT_MS", timeout)?;
        }

        // Database
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = Some(url).filter(|u| !u.is_empty());
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(json) = std::env::var("LOG_JSON") {
            self.logging.json_format = parse_env("LOG_JSON", json)?;
        }

        Ok(self)
    }

    /// True while either signing secret is still a built-in development key
    pub fn uses_development_secrets(&self) -> bool {
        self.tokens.access_secret == DEV_ACCESS_SECRET
            || self.tokens.refresh_secret == DEV_REFRESH_SECRET
    }

    /// Reject configurations that would break token separation
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.access_secret.is_empty() {
            return Err(ConfigError::MissingRequired(
                "SECRET_KEY_ACCESS_TOKEN".to_string(),
            ));
        }
        if self.tokens.refresh_secret.is_empty() {
            return Err(ConfigError::MissingRequired(
                "SECRET_KEY_REFRESH_TOKEN".to_string(),
            ));
        }
        if self.tokens.access_secret == self.tokens.refresh_secret {
            return Err(ConfigError::InvalidValue {
                key: "SECRET_KEY_REFRESH_TOKEN".to_string(),
                value: "<must differ from the access token secret>".to_string(),
            });
        }
        if self.tokens.access_ttl_secs >= self.tokens.refresh_ttl_secs {
            return Err(ConfigError::InvalidValue {
                key: "ACCESS_TOKEN_TTL_SECS".to_string(),
                value: self.tokens.access_ttl_secs.to_string(),
            });
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum forwarded/accepted body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Token signing configuration
///
/// Access and refresh tokens are signed with distinct secrets. Every service
/// in one deployment must share the same access secret and TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// HMAC secret for access tokens
    pub access_secret: String,

    /// HMAC secret for refresh tokens
    pub refresh_secret: String,

    /// Access token lifetime in seconds (default: 3600 = 1 hour)
    pub access_ttl_secs: u64,

    /// Refresh token lifetime in seconds (default: 7 days)
    pub refresh_ttl_secs: u64,

    /// Token issuer identifier
    pub issuer: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_secret: DEV_ACCESS_SECRET.to_string(),
            refresh_secret: DEV_REFRESH_SECRET.to_string(),
            access_ttl_secs: 3600,
            refresh_ttl_secs: 7 * 24 * 3600,
            issuer: "tourbook".to_string(),
        }
    }
}

/// Session cookie attributes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Cookie carrying the access token
    pub access_name: String,

    /// Cookie carrying the refresh token
    pub refresh_name: String,

    /// Set the `Secure` attribute
    pub secure: bool,

    /// Optional `Domain` attribute
    pub domain: Option<String>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            access_name: "accessToken".to_string(),
            refresh_name: "refreshToken".to_string(),
            secure: true,
            domain: None,
        }
    }
}

/// Identity propagation between the gateway and downstream services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Header carrying the verified subject id
    pub user_id_header: String,

    /// Header carrying the verified role
    pub role_header: String,

    /// Header carrying the signing timestamp (unix seconds)
    pub timestamp_header: String,

    /// Header carrying the hex HMAC-SHA256 signature
    pub signature_header: String,

    /// Shared gateway secret; when set, unsigned identity headers are rejected
    pub gateway_secret: Option<String>,

    /// Accepted clock skew for signed identity headers
    pub max_skew_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_id_header: "x-user-id".to_string(),
            role_header: "x-user-role".to_string(),
            timestamp_header: "x-gateway-timestamp".to_string(),
            signature_header: "x-gateway-signature".to_string(),
            gateway_secret: None,
            max_skew_secs: 60,
        }
    }
}

/// Base URLs of the individual services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceUrls {
    pub auth: String,
    pub user: String,
    pub tour: String,
    pub review: String,
    pub booking: String,
}

impl Default for ServiceUrls {
    fn default() -> Self {
        Self {
            auth: "http://localhost:4001".to_string(),
            user: "http://localhost:4001".to_string(),
            tour: "http://localhost:4003".to_string(),
            review: "http://localhost:4005".to_string(),
            booking: "http://localhost:4004".to_string(),
        }
    }
}

/// Outbound remote verification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

/// Argon2id parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Memory cost in KB (default: 65536 = 64 MB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism (threads, default: 4)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
            output_len: Some(32),
        }
    }
}

/// Credential database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; the in-memory store is used when unset
    pub url: Option<String>,

    /// PostgreSQL connection pool size
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 10,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
