use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

use storekeep_auth::ResetToken;
use storekeep_core::EmailAddress;

/// Token store operation error.
///
/// These are **infrastructure errors** (storage, concurrency) as opposed to
/// domain errors (lifecycle, policy).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("token store write failed: {0}")]
    WriteFailed(String),

    #[error("token store read failed: {0}")]
    ReadFailed(String),

    /// The conditional consume found the token already consumed: the
    /// caller lost the race.
    #[error("token already consumed")]
    AlreadyConsumed,

    /// The conditional consume found no record at all.
    #[error("unknown token")]
    UnknownToken,

    /// The caller-supplied deadline elapsed before the store answered.
    #[error("token store operation timed out")]
    Timeout,
}

/// Indexed, transactional persistence for reset tokens.
///
/// Records are keyed by token value (unique) with a secondary index by
/// email. Records are never deleted: consumption sets `consumed_at`, and
/// spent/expired rows are retained for audit.
///
/// ## Consumption semantics
///
/// `mark_consumed` must be an atomic conditional update, linearizable per
/// token: when two callers race to consume the same token, exactly one
/// succeeds and the other observes [`StoreError::AlreadyConsumed`]. No
/// ordering guarantee exists across different tokens or emails, and
/// implementations must not serialize unrelated tokens behind one lock
/// beyond what a short in-process critical section requires.
#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    /// Insert or replace the record for `token.token`.
    async fn save(&self, token: ResetToken) -> Result<(), StoreError>;

    /// Look up a record by its token value.
    async fn find_by_token(&self, token: &str) -> Result<Option<ResetToken>, StoreError>;

    /// Most recently issued record for `email` that is still usable at
    /// `now`: unexpired **and** unconsumed. (The consumption check is a
    /// tightening over the old storefront behavior, which let a
    /// spent-but-unexpired token surface as "latest"; see DESIGN.md.)
    async fn find_latest_usable_by_email(
        &self,
        email: &EmailAddress,
        now: DateTime<Utc>,
    ) -> Result<Option<ResetToken>, StoreError>;

    /// Atomically set `consumed_at` iff it is not already set.
    async fn mark_consumed(
        &self,
        token: &str,
        consumed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> ResetTokenStore for Arc<S>
where
    S: ResetTokenStore + ?Sized,
{
    async fn save(&self, token: ResetToken) -> Result<(), StoreError> {
        (**self).save(token).await
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<ResetToken>, StoreError> {
        (**self).find_by_token(token).await
    }

    async fn find_latest_usable_by_email(
        &self,
        email: &EmailAddress,
        now: DateTime<Utc>,
    ) -> Result<Option<ResetToken>, StoreError> {
        (**self).find_latest_usable_by_email(email, now).await
    }

    async fn mark_consumed(
        &self,
        token: &str,
        consumed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        (**self).mark_consumed(token, consumed_at).await
    }
}
