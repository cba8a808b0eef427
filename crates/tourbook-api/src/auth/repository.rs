//! Credential storage
//!
//! [`CredentialStore`] is the only place credential records live. Two
//! backends are provided:
//! - [`InMemoryCredentialStore`] for local runs and tests
//! - [`PgCredentialStore`] for PostgreSQL, selected when `DATABASE_URL` is set
//!
//! Every refresh-token mutation is a single store update; the last write wins.

use super::models::{normalize, CredentialRecord};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tourbook_core::{DatabaseConfig, Role, UserStatus};

/// Repository errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Email already registered")]
    EmailTaken,

    #[error("Username already taken")]
    UsernameTaken,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new record; email and username must both be unused
    async fn insert(&self, record: CredentialRecord) -> Result<CredentialRecord, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<CredentialRecord>, StoreError>;

    /// Lookup by normalized username
    async fn find_by_username(&self, username: &str)
        -> Result<Option<CredentialRecord>, StoreError>;

    async fn list(&self) -> Result<Vec<CredentialRecord>, StoreError>;

    /// Overwrite the refresh-token slot; returns `false` if no such record
    async fn set_refresh_token(&self, id: &str, token: &str) -> Result<bool, StoreError>;

    /// Change role and/or status. A resulting non-Active status also clears
    /// the refresh token in the same update.
    async fn update_account(
        &self,
        id: &str,
        role: Option<Role>,
        status: Option<UserStatus>,
    ) -> Result<Option<CredentialRecord>, StoreError>;
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Default)]
pub struct InMemoryCredentialStore {
    records: RwLock<HashMap<String, CredentialRecord>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn insert(&self, record: CredentialRecord) -> Result<CredentialRecord, StoreError> {
        let mut records = self.records.write().await;

        if records.values().any(|r| r.email == record.email) {
            return Err(StoreError::EmailTaken);
        }
        if records.values().any(|r| r.username == record.username) {
            return Err(StoreError::UsernameTaken);
        }

        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        let username = normalize(username);
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.username == username)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<CredentialRecord>, StoreError> {
        let mut all: Vec<_> = self.records.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    async fn set_refresh_token(&self, id: &str, token: &str) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(id) {
            Some(record) => {
                record.refresh_token = token.to_string();
                record.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_account(
        &self,
        id: &str,
        role: Option<Role>,
        status: Option<UserStatus>,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(id) else {
            return Ok(None);
        };

        if let Some(role) = role {
            record.role = role;
        }
        if let Some(status) = status {
            record.status = status;
        }
        if !record.status.is_active() {
            record.refresh_token.clear();
        }
        record.updated_at = Utc::now();

        Ok(Some(record.clone()))
    }
}

// ============================================================================
// PostgreSQL store
// ============================================================================

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS credentials (
        id            TEXT PRIMARY KEY,
        email         TEXT NOT NULL UNIQUE,
        username      TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role          TEXT NOT NULL,
        status        TEXT NOT NULL,
        photo         TEXT,
        refresh_token TEXT NOT NULL DEFAULT '',
        created_at    TIMESTAMPTZ NOT NULL,
        updated_at    TIMESTAMPTZ NOT NULL
    )
"#;

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// Connect and make sure the `credentials` table exists
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| StoreError::Database("DATABASE_URL is not set".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect(url)
            .await?;

        sqlx::query(SCHEMA).execute(&pool).await?;
        tracing::info!("Credential store connected to PostgreSQL");

        Ok(Self { pool })
    }
}

fn record_from_row(row: &PgRow) -> Result<CredentialRecord, StoreError> {
    let role: String = row.try_get("role")?;
    let status: String = row.try_get("status")?;

    Ok(CredentialRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        role: role
            .parse()
            .map_err(|e: tourbook_core::TourbookError| StoreError::Database(e.to_string()))?,
        status: status
            .parse()
            .map_err(|e: tourbook_core::TourbookError| StoreError::Database(e.to_string()))?,
        photo: row.try_get("photo")?,
        refresh_token: row.try_get("refresh_token")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return match db_err.constraint() {
                Some(name) if name.contains("username") => StoreError::UsernameTaken,
                _ => StoreError::EmailTaken,
            };
        }
    }
    StoreError::from(err)
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert(&self, record: CredentialRecord) -> Result<CredentialRecord, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO credentials
                (id, email, username, password_hash, role, status, photo,
                 refresh_token, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&record.id)
        .bind(&record.email)
        .bind(&record.username)
        .bind(&record.password_hash)
        .bind(record.role.as_str())
        .bind(record.status.as_str())
        .bind(&record.photo)
        .bind(&record.refresh_token)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_insert_error)?;

        Ok(record)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM credentials WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM credentials WHERE username = $1")
            .bind(normalize(username))
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<CredentialRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM credentials ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn set_refresh_token(&self, id: &str, token: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE credentials SET refresh_token = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(token)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_account(
        &self,
        id: &str,
        role: Option<Role>,
        status: Option<UserStatus>,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE credentials SET
                role = COALESCE($2::TEXT, role),
                status = COALESCE($3::TEXT, status),
                refresh_token = CASE
                    WHEN COALESCE($3::TEXT, status) <> 'Active' THEN ''
                    ELSE refresh_token
                END,
                updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(role.map(|r| r.as_str()))
        .bind(status.map(|s| s.as_str()))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }
}
