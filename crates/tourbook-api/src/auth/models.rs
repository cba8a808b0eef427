//! Credential models and auth request/response types
//!
//! - CredentialRecord: stored account with hash and refresh-token slot
//! - UserView: what clients are allowed to see
//! - Request/response bodies for the auth and user routes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tourbook_core::{Identity, Role, UserStatus};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::password::validate_password_strength;

/// Stored credential record
///
/// `password_hash` and `refresh_token` are never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// UUID v4
    pub id: String,

    /// Trimmed, lower-cased, unique
    pub email: String,

    /// Trimmed, lower-cased, unique; used for login
    pub username: String,

    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub role: Role,

    pub status: UserStatus,

    /// Avatar URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,

    /// Current refresh token, empty when logged out
    #[serde(skip_serializing, default)]
    pub refresh_token: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    pub fn new(
        email: &str,
        username: &str,
        password_hash: String,
        role: Role,
        photo: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email: normalize(email),
            username: normalize(username),
            password_hash,
            role,
            status: UserStatus::Active,
            photo,
            refresh_token: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.id.clone(), self.role)
    }

    /// Sanitized representation for API responses
    pub fn to_view(&self) -> UserView {
        UserView {
            id: self.id.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            role: self.role,
            status: self.status,
            photo: self.photo.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Lookup form of an email or username
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Public user representation (safe for API responses)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub username: String,
    #[schema(value_type = String, example = "USER")]
    pub role: Role,
    #[schema(value_type = String, example = "Active")]
    pub status: UserStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn password_policy(password: &str) -> Result<(), ValidationError> {
    validate_password_strength(password).map_err(|message| {
        let mut err = ValidationError::new("password_policy");
        err.message = Some(message.into());
        err
    })
}

/// Registration request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 3, max = 50, message = "Username must be 3 to 50 characters"))]
    pub username: String,

    #[validate(custom(function = "password_policy"))]
    pub password: String,

    #[serde(default)]
    #[schema(value_type = Option<String>, example = "USER")]
    pub role: Option<Role>,

    #[serde(default)]
    #[validate(url(message = "Photo must be a URL"))]
    pub photo: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login response body; the same tokens are also set as cookies
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub user: UserView,
    pub access_token: String,
    pub refresh_token: String,
}

/// Optional body for `POST /auth/refresh-token`
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RefreshRequest {
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: Option<String>,
}

/// Refresh response body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Admin account update
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateAccountRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, example = "ADMIN")]
    pub role: Option<Role>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, example = "Suspended")]
    pub status: Option<UserStatus>,
}
