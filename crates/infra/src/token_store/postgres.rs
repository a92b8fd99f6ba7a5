//! Postgres-backed reset-token store.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE reset_tokens (
//!     token       TEXT PRIMARY KEY,
//!     email       TEXT NOT NULL,
//!     issued_at   TIMESTAMPTZ NOT NULL,
//!     expires_at  TIMESTAMPTZ NOT NULL,
//!     consumed_at TIMESTAMPTZ,
//!     CHECK (expires_at > issued_at)
//! );
//! CREATE INDEX reset_tokens_email_issued_idx ON reset_tokens (email, issued_at DESC);
//! ```
//!
//! Consumption uses a conditional `UPDATE ... WHERE consumed_at IS NULL`,
//! so concurrency control is row-level and enforced by the database: of two
//! racing consumers exactly one update matches, and the loser is told apart
//! from an unknown token by a follow-up read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::instrument;

use storekeep_auth::ResetToken;
use storekeep_core::EmailAddress;

use super::r#trait::{ResetTokenStore, StoreError};

#[derive(Debug, Clone)]
pub struct PostgresResetTokenStore {
    pool: Arc<PgPool>,
}

impl PostgresResetTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn read_failed(e: sqlx::Error) -> StoreError {
    StoreError::ReadFailed(e.to_string())
}

fn write_failed(e: sqlx::Error) -> StoreError {
    StoreError::WriteFailed(e.to_string())
}

fn row_to_token(row: &sqlx::postgres::PgRow) -> Result<ResetToken, StoreError> {
    let email: String = row.try_get("email").map_err(read_failed)?;
    let email = EmailAddress::parse(&email)
        .map_err(|e| StoreError::ReadFailed(format!("stored email is malformed: {e}")))?;

    Ok(ResetToken {
        token: row.try_get("token").map_err(read_failed)?,
        email,
        issued_at: row.try_get("issued_at").map_err(read_failed)?,
        expires_at: row.try_get("expires_at").map_err(read_failed)?,
        consumed_at: row.try_get("consumed_at").map_err(read_failed)?,
    })
}

#[async_trait]
impl ResetTokenStore for PostgresResetTokenStore {
    #[instrument(skip(self, token), fields(email = %token.email), err)]
    async fn save(&self, token: ResetToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO reset_tokens (token, email, issued_at, expires_at, consumed_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (token) DO UPDATE SET
                email = EXCLUDED.email,
                issued_at = EXCLUDED.issued_at,
                expires_at = EXCLUDED.expires_at,
                consumed_at = EXCLUDED.consumed_at
            "#,
        )
        .bind(&token.token)
        .bind(token.email.as_str())
        .bind(token.issued_at)
        .bind(token.expires_at)
        .bind(token.consumed_at)
        .execute(&*self.pool)
        .await
        .map_err(write_failed)?;

        Ok(())
    }

    #[instrument(skip(self, token), err)]
    async fn find_by_token(&self, token: &str) -> Result<Option<ResetToken>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT token, email, issued_at, expires_at, consumed_at
            FROM reset_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&*self.pool)
        .await
        .map_err(read_failed)?;

        row.as_ref().map(row_to_token).transpose()
    }

    #[instrument(skip(self), fields(email = %email), err)]
    async fn find_latest_usable_by_email(
        &self,
        email: &EmailAddress,
        now: DateTime<Utc>,
    ) -> Result<Option<ResetToken>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT token, email, issued_at, expires_at, consumed_at
            FROM reset_tokens
            WHERE email = $1
              AND consumed_at IS NULL
              AND expires_at >= $2
            ORDER BY issued_at DESC
            LIMIT 1
            "#,
        )
        .bind(email.as_str())
        .bind(now)
        .fetch_optional(&*self.pool)
        .await
        .map_err(read_failed)?;

        row.as_ref().map(row_to_token).transpose()
    }

    #[instrument(skip(self, token), err)]
    async fn mark_consumed(
        &self,
        token: &str,
        consumed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE reset_tokens
            SET consumed_at = $2
            WHERE token = $1 AND consumed_at IS NULL
            "#,
        )
        .bind(token)
        .bind(consumed_at)
        .execute(&*self.pool)
        .await
        .map_err(write_failed)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // No row updated: either the token does not exist, or another
        // caller consumed it first.
        let exists = sqlx::query("SELECT 1 FROM reset_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(&*self.pool)
            .await
            .map_err(read_failed)?;

        match exists {
            Some(_) => Err(StoreError::AlreadyConsumed),
            None => Err(StoreError::UnknownToken),
        }
    }
}
