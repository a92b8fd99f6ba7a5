use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use storekeep_auth::ResetToken;
use storekeep_core::EmailAddress;

use super::r#trait::{ResetTokenStore, StoreError};

/// In-memory reset-token store.
///
/// Intended for tests/dev. Consumption is atomic under the write lock,
/// which is held only for the single record mutation.
#[derive(Debug, Default)]
pub struct InMemoryResetTokenStore {
    records: RwLock<HashMap<String, ResetToken>>,
}

impl InMemoryResetTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResetTokenStore for InMemoryResetTokenStore {
    async fn save(&self, token: ResetToken) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".to_string()))?;

        records.insert(token.token.clone(), token);
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<ResetToken>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".to_string()))?;

        Ok(records.get(token).cloned())
    }

    async fn find_latest_usable_by_email(
        &self,
        email: &EmailAddress,
        now: DateTime<Utc>,
    ) -> Result<Option<ResetToken>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".to_string()))?;

        Ok(records
            .values()
            .filter(|r| r.email == *email && r.is_usable(now))
            .max_by_key(|r| r.issued_at)
            .cloned())
    }

    async fn mark_consumed(
        &self,
        token: &str,
        consumed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".to_string()))?;

        let record = records.get_mut(token).ok_or(StoreError::UnknownToken)?;

        if record.consumed_at.is_some() {
            return Err(StoreError::AlreadyConsumed);
        }

        record.consumed_at = Some(consumed_at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn email(addr: &str) -> EmailAddress {
        EmailAddress::parse(addr).unwrap()
    }

    fn issued(addr: &str, now: DateTime<Utc>) -> ResetToken {
        ResetToken::issue(email(addr), now, Duration::hours(1)).unwrap()
    }

    #[tokio::test]
    async fn save_and_find_by_token() {
        let store = InMemoryResetTokenStore::new();
        let now = Utc::now();
        let record = issued("user@example.com", now);

        store.save(record.clone()).await.unwrap();

        let found = store.find_by_token(&record.token).await.unwrap().unwrap();
        assert_eq!(found, record);
        assert!(store.find_by_token("no-such-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_usable_prefers_most_recent_issue() {
        let store = InMemoryResetTokenStore::new();
        let now = Utc::now();

        let older = issued("user@example.com", now - Duration::minutes(10));
        let newer = issued("user@example.com", now);
        let other = issued("other@example.com", now);

        store.save(older).await.unwrap();
        store.save(newer.clone()).await.unwrap();
        store.save(other).await.unwrap();

        let latest = store
            .find_latest_usable_by_email(&email("user@example.com"), now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.token, newer.token);
    }

    #[tokio::test]
    async fn latest_usable_skips_expired_and_consumed() {
        let store = InMemoryResetTokenStore::new();
        let now = Utc::now();

        let mut expired = issued("user@example.com", now - Duration::hours(3));
        expired.expires_at = now - Duration::hours(2);

        let mut consumed = issued("user@example.com", now);
        consumed.consumed_at = Some(now);

        store.save(expired).await.unwrap();
        store.save(consumed).await.unwrap();

        assert!(
            store
                .find_latest_usable_by_email(&email("user@example.com"), now)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn mark_consumed_is_exactly_once() {
        let store = InMemoryResetTokenStore::new();
        let now = Utc::now();
        let record = issued("user@example.com", now);
        store.save(record.clone()).await.unwrap();

        store.mark_consumed(&record.token, now).await.unwrap();

        assert_eq!(
            store.mark_consumed(&record.token, now).await,
            Err(StoreError::AlreadyConsumed)
        );
        assert_eq!(
            store.mark_consumed("no-such-token", now).await,
            Err(StoreError::UnknownToken)
        );

        // The record survives consumption (audit retention).
        let found = store.find_by_token(&record.token).await.unwrap().unwrap();
        assert_eq!(found.consumed_at, Some(now));
    }

    #[tokio::test]
    async fn concurrent_consume_yields_one_winner() {
        let store = Arc::new(InMemoryResetTokenStore::new());
        let now = Utc::now();
        let record = issued("user@example.com", now);
        store.save(record.clone()).await.unwrap();

        let a = tokio::spawn({
            let store = store.clone();
            let token = record.token.clone();
            async move { store.mark_consumed(&token, now).await }
        });
        let b = tokio::spawn({
            let store = store.clone();
            let token = record.token.clone();
            async move { store.mark_consumed(&token, now).await }
        });

        let (ra, rb) = (a.await.unwrap(), b.await.unwrap());
        let successes = [&ra, &rb].iter().filter(|r| r.is_ok()).count();
        let conflicts = [&ra, &rb]
            .iter()
            .filter(|r| matches!(r, Err(StoreError::AlreadyConsumed)))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(conflicts, 1);
    }
}
