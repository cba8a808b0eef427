//! Authentication service layer
//!
//! Business logic for registration, login, token refresh, logout and the
//! admin account operations. Storage goes through [`CredentialStore`]; tokens
//! through [`TokenService`].
//!
//! Account lifecycle:
//! `register -> login (refresh slot = T) -> refresh (new access, slot still T)
//! -> logout (slot cleared)`.

use super::jwt::{TokenError, TokenPair, TokenService};
use super::models::{normalize, CredentialRecord, RegisterRequest, UserView};
use super::password::{hash_password, verify_password, PasswordError};
use super::repository::{CredentialStore, StoreError};
use crate::error::AppError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tourbook_core::{PasswordConfig, Role, UserStatus};
use validator::Validate;

/// Auth service errors
///
/// `InvalidCredentials` and `RefreshRejected` carry the real reason for the
/// audit log; their display text is what clients see.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    InvalidCredentials { reason: &'static str },

    #[error("Invalid refresh token")]
    RefreshRejected { reason: String },

    #[error("User not found")]
    UserNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::Conflict(msg) => AppError::Conflict(msg),
            err @ (AuthError::InvalidCredentials { .. } | AuthError::RefreshRejected { .. }) => {
                AppError::Unauthenticated(err.to_string())
            }
            AuthError::UserNotFound => AppError::NotFound("User".to_string()),
            AuthError::Store(StoreError::Database(msg)) => AppError::Database(msg),
            AuthError::Store(err) => AppError::Conflict(err.to_string()),
            AuthError::Token(err) => AppError::Internal(format!("Token signing failed: {err}")),
            AuthError::Password(err) => AppError::Internal(err.to_string()),
            AuthError::Task(msg) => AppError::Internal(msg),
        }
    }
}

/// Successful login result
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: UserView,
    pub tokens: TokenPair,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    tokens: TokenService,
    password: PasswordConfig,
    /// Hash verified against when the username is unknown
    dummy_hash: Arc<OnceCell<String>>,
    password_checks: Arc<AtomicU64>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: TokenService,
        password: PasswordConfig,
    ) -> Self {
        Self {
            store,
            tokens,
            password,
            dummy_hash: Arc::new(OnceCell::new()),
            password_checks: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Number of password hash verifications run by `login`
    pub fn password_checks(&self) -> u64 {
        self.password_checks.load(Ordering::Relaxed)
    }

    async fn dummy_hash(&self) -> Result<String, AuthError> {
        let config = self.password.clone();
        self.dummy_hash
            .get_or_try_init(|| async move {
                tokio::task::spawn_blocking(move || {
                    hash_password("tourbook-unknown-user", &config)
                })
                .await
                .map_err(|e| AuthError::Task(e.to_string()))?
                .map_err(AuthError::from)
            })
            .await
            .cloned()
    }

    async fn check_password(&self, candidate: &str, hash: String) -> Result<bool, AuthError> {
        self.password_checks.fetch_add(1, Ordering::Relaxed);
        let candidate = candidate.to_string();
        tokio::task::spawn_blocking(move || verify_password(&candidate, &hash))
            .await
            .map_err(|e| AuthError::Task(e.to_string()))?
            .map_err(AuthError::from)
    }

    /// Register a new account with status Active
    ///
    /// Role defaults to USER. Returns the sanitized view only.
    pub async fn register(&self, request: RegisterRequest) -> Result<UserView, AuthError> {
        request
            .validate()
            .map_err(|e| AuthError::Validation(e.to_string()))?;

        let email = normalize(&request.email);
        let username = normalize(&request.username);
        if username.chars().count() < 3 {
            return Err(AuthError::Validation(
                "Username must be 3 to 50 characters".to_string(),
            ));
        }

        let password = request.password;
        let config = self.password.clone();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, &config))
            .await
            .map_err(|e| AuthError::Task(e.to_string()))??;

        let record = CredentialRecord::new(
            &email,
            &username,
            password_hash,
            request.role.unwrap_or_default(),
            request.photo,
        );

        let created = self.store.insert(record).await.map_err(|e| match e {
            StoreError::EmailTaken | StoreError::UsernameTaken => {
                AuthError::Conflict(e.to_string())
            }
            other => AuthError::Store(other),
        })?;

        tracing::debug!(user_id = %created.id, "Account registered");
        Ok(created.to_view())
    }

    /// Verify credentials and issue a fresh token pair
    ///
    /// Unknown username, inactive account and wrong password all fail with
    /// the same `InvalidCredentials`, and each costs exactly one hash
    /// verification: an unknown username is checked against a dummy hash and
    /// the status check runs after the password check. The stored refresh
    /// token is overwritten, so any earlier session's refresh token stops
    /// working.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let record = self.store.find_by_username(username).await?;

        let hash = match &record {
            Some(record) => record.password_hash.clone(),
            None => self.dummy_hash().await?,
        };
        let matches = self.check_password(password, hash).await?;

        let Some(record) = record else {
            return Err(AuthError::InvalidCredentials {
                reason: "unknown username",
            });
        };
        if !matches {
            return Err(AuthError::InvalidCredentials {
                reason: "wrong password",
            });
        }
        if !record.status.is_active() {
            return Err(AuthError::InvalidCredentials {
                reason: "account not active",
            });
        }

        let tokens = self.tokens.issue_pair(&record.identity())?;
        self.store
            .set_refresh_token(&record.id, &tokens.refresh_token)
            .await?;

        Ok(LoginOutcome {
            user: record.to_view(),
            tokens,
        })
    }

    /// Clear the stored refresh token
    ///
    /// Idempotent; an unknown subject is not an error.
    pub async fn logout(&self, subject_id: &str) -> Result<(), AuthError> {
        if !self.store.set_refresh_token(subject_id, "").await? {
            tracing::debug!(subject_id = %subject_id, "Logout for unknown subject");
        }
        Ok(())
    }

    /// Exchange the current refresh token for a new access token
    ///
    /// The refresh token itself is not rotated and stays valid until the
    /// next login, logout or account suspension.
    pub async fn refresh(&self, subject_id: &str, presented: &str) -> Result<String, AuthError> {
        let reject = |reason: &str| AuthError::RefreshRejected {
            reason: reason.to_string(),
        };

        if presented.is_empty() {
            return Err(reject("no refresh token presented"));
        }

        let record = self
            .store
            .find_by_id(subject_id)
            .await?
            .ok_or_else(|| reject("unknown subject"))?;

        if record.refresh_token.is_empty() {
            return Err(reject("no active session"));
        }
        if record.refresh_token != presented {
            return Err(reject("token does not match stored session"));
        }

        let claims = self
            .tokens
            .verify_refresh(presented)
            .map_err(|e| reject(&e.to_string()))?;

        if claims.sub != record.id {
            return Err(reject("token subject mismatch"));
        }
        if !record.status.is_active() {
            return Err(reject("account not active"));
        }

        Ok(self.tokens.issue_access_token(&record.identity())?)
    }

    pub async fn get_user(&self, id: &str) -> Result<UserView, AuthError> {
        self.store
            .find_by_id(id)
            .await?
            .map(|r| r.to_view())
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn list_users(&self) -> Result<Vec<UserView>, AuthError> {
        Ok(self
            .store
            .list()
            .await?
            .iter()
            .map(CredentialRecord::to_view)
            .collect())
    }

    /// Change role and/or status; a non-Active status ends the session
    pub async fn update_account(
        &self,
        id: &str,
        role: Option<Role>,
        status: Option<UserStatus>,
    ) -> Result<UserView, AuthError> {
        if role.is_none() && status.is_none() {
            return Err(AuthError::Validation(
                "Nothing to update: provide role and/or status".to_string(),
            ));
        }

        self.store
            .update_account(id, role, status)
            .await?
            .map(|r| r.to_view())
            .ok_or(AuthError::UserNotFound)
    }
}
