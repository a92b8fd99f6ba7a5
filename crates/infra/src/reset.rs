//! Reset-token issuance, validation and consumption.
//!
//! Per-token state machine: `ISSUED` → usable while `now <= expires_at` →
//! `CONSUMED` or `EXPIRED`. The service orchestrates the token store, the
//! external user directory and the delivery collaborator; all outward
//! failure messages are generic so responses never become an oracle for
//! account existence or token state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use storekeep_auth::{
    CredentialHasher, CryptoError, PasswordHashString, PasswordPolicy, PolicyViolation,
    ResetToken, TokenStatus,
};
use storekeep_core::EmailAddress;

use crate::delivery::TokenDelivery;
use crate::token_store::{ResetTokenStore, StoreError};
use crate::user_directory::{DirectoryError, UserDirectory};

/// Uniform response to a reset request, account or not.
pub const RESET_REQUESTED_MESSAGE: &str =
    "If that address has an account, a password reset link is on its way.";

/// Uniform rejection for absent, expired and already-used tokens.
pub const RESET_LINK_INVALID_MESSAGE: &str =
    "This password reset link is invalid or has expired.";

const RESET_LINK_VALID_MESSAGE: &str = "Reset link verified.";

const READ_RETRY_BACKOFF: StdDuration = StdDuration::from_millis(50);

/// Reset operation failure.
///
/// The distinct token variants exist for tests and audit logging; the HTTP
/// layer collapses `InvalidToken`/`Expired`/`AlreadyUsed` into one generic
/// message. `WeakPassword` may stay specific; it carries no
/// security-sensitive signal.
#[derive(Debug, Error)]
pub enum ResetError {
    #[error("reset token is invalid")]
    InvalidToken,

    #[error("reset token has expired")]
    Expired,

    #[error("reset token was already used")]
    AlreadyUsed,

    #[error(transparent)]
    WeakPassword(#[from] PolicyViolation),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Outcome of a token lookup, shaped for the reset form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailAddress>,
    pub message: String,
}

impl TokenValidation {
    fn valid(email: EmailAddress) -> Self {
        Self {
            valid: true,
            email: Some(email),
            message: RESET_LINK_VALID_MESSAGE.to_string(),
        }
    }

    fn invalid() -> Self {
        Self {
            valid: false,
            email: None,
            message: RESET_LINK_INVALID_MESSAGE.to_string(),
        }
    }
}

/// Issues, validates and consumes password-reset tokens.
#[derive(Clone)]
pub struct ResetTokenService<S, U, D> {
    store: S,
    directory: U,
    delivery: D,
    hasher: CredentialHasher,
    policy: Arc<dyn PasswordPolicy>,
    token_ttl: Duration,
    op_deadline: StdDuration,
}

impl<S, U, D> ResetTokenService<S, U, D>
where
    S: ResetTokenStore,
    U: UserDirectory,
    D: TokenDelivery,
{
    pub fn new(
        store: S,
        directory: U,
        delivery: D,
        hasher: CredentialHasher,
        policy: Arc<dyn PasswordPolicy>,
    ) -> Self {
        Self {
            store,
            directory,
            delivery,
            hasher,
            policy,
            token_ttl: Duration::hours(1),
            op_deadline: StdDuration::from_secs(5),
        }
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn with_op_deadline(mut self, deadline: StdDuration) -> Self {
        self.op_deadline = deadline;
        self
    }

    /// Issue a reset token for `email` and hand it to the delivery
    /// collaborator.
    ///
    /// An unknown email skips issuance but still returns `Ok(())`: the
    /// outward response shape must not reveal account existence. Delivery
    /// failures are logged, not surfaced, for the same reason.
    pub async fn issue_for(
        &self,
        email: &EmailAddress,
        now: DateTime<Utc>,
    ) -> Result<(), ResetError> {
        self.deadline(self.issue_for_inner(email, now)).await
    }

    async fn issue_for_inner(
        &self,
        email: &EmailAddress,
        now: DateTime<Utc>,
    ) -> Result<(), ResetError> {
        if self.directory.find_user_by_email(email).await?.is_none() {
            tracing::debug!(email = %email, "reset requested for unknown email; nothing issued");
            return Ok(());
        }

        let record = ResetToken::issue(email.clone(), now, self.token_ttl)?;
        self.store.save(record.clone()).await?;

        if let Err(err) = self
            .delivery
            .deliver(&record.email, &record.token, record.expires_at)
            .await
        {
            tracing::warn!(%err, email = %email, "reset token delivery failed");
        }

        Ok(())
    }

    /// Look up a token for form pre-rendering.
    ///
    /// Absent, expired and consumed all come back as the same invalid
    /// shape with the same message.
    pub async fn validate(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenValidation, ResetError> {
        self.deadline(async {
            let record = retry_read(|| self.store.find_by_token(token)).await?;

            Ok(match record {
                Some(r) if r.is_usable(now) => TokenValidation::valid(r.email),
                _ => TokenValidation::invalid(),
            })
        })
        .await
    }

    /// Consume a token and set a new password.
    ///
    /// The check-to-use window closes at `mark_consumed`: the store's
    /// conditional update picks exactly one winner among racing callers,
    /// and only the winner writes the new hash to the user store.
    pub async fn reset(
        &self,
        token: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ResetError> {
        self.deadline(self.reset_inner(token, new_password, now)).await
    }

    async fn reset_inner(
        &self,
        token: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ResetError> {
        let record = retry_read(|| self.store.find_by_token(token))
            .await?
            .ok_or(ResetError::InvalidToken)?;

        match record.status(now) {
            TokenStatus::Expired => return Err(ResetError::Expired),
            TokenStatus::Consumed => return Err(ResetError::AlreadyUsed),
            TokenStatus::Usable => {}
        }

        self.policy.check(new_password)?;

        // Account deleted between issuance and reset: indistinguishable
        // from a bad token on purpose.
        let account = self
            .directory
            .find_user_by_email(&record.email)
            .await?
            .ok_or(ResetError::InvalidToken)?;

        let hash = self.hash_password(new_password).await?;

        match self.store.mark_consumed(token, now).await {
            Ok(()) => {}
            Err(StoreError::AlreadyConsumed) => return Err(ResetError::AlreadyUsed),
            Err(StoreError::UnknownToken) => return Err(ResetError::InvalidToken),
            Err(e) => return Err(e.into()),
        }

        self.directory.set_password_hash(account.user_id, hash).await?;

        tracing::info!(user_id = %account.user_id, "password reset completed");
        Ok(())
    }

    /// Most recent still-usable token for `email`, if any (admin support
    /// view; the HTTP layer redacts the token value itself).
    pub async fn latest_usable(
        &self,
        email: &EmailAddress,
        now: DateTime<Utc>,
    ) -> Result<Option<ResetToken>, ResetError> {
        self.deadline(async {
            Ok(retry_read(|| self.store.find_latest_usable_by_email(email, now)).await?)
        })
        .await
    }

    /// Hashing is CPU-bound: run it off the async workers, retrying once
    /// on crypto failure before surfacing.
    async fn hash_password(&self, password: &str) -> Result<PasswordHashString, CryptoError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || {
            hasher.hash(&password).or_else(|err| {
                tracing::warn!(%err, "password hashing failed; retrying once");
                hasher.hash(&password)
            })
        })
        .await
        .map_err(|e| CryptoError::Hash(format!("hashing task failed: {e}")))?
    }

    async fn deadline<T, F>(&self, fut: F) -> Result<T, ResetError>
    where
        F: Future<Output = Result<T, ResetError>>,
    {
        match tokio::time::timeout(self.op_deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(ResetError::Store(StoreError::Timeout)),
        }
    }
}

/// Retry a store read once with a short backoff; writes are never retried
/// (a duplicated write is worse than a surfaced failure).
async fn retry_read<T, F, Fut>(mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    match op().await {
        Err(StoreError::ReadFailed(reason)) => {
            tracing::warn!(%reason, "token store read failed; retrying once");
            tokio::time::sleep(READ_RETRY_BACKOFF).await;
            op().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use storekeep_auth::{DefaultPasswordPolicy, Role};

    use crate::delivery::RecordingTokenDelivery;
    use crate::token_store::InMemoryResetTokenStore;
    use crate::user_directory::InMemoryUserDirectory;

    type TestService = ResetTokenService<
        Arc<InMemoryResetTokenStore>,
        Arc<InMemoryUserDirectory>,
        Arc<RecordingTokenDelivery>,
    >;

    struct Harness {
        store: Arc<InMemoryResetTokenStore>,
        directory: Arc<InMemoryUserDirectory>,
        delivery: Arc<RecordingTokenDelivery>,
        service: TestService,
    }

    fn email(addr: &str) -> EmailAddress {
        EmailAddress::parse(addr).unwrap()
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryResetTokenStore::new());
        let directory = Arc::new(InMemoryUserDirectory::new());
        let delivery = Arc::new(RecordingTokenDelivery::new());

        let service = ResetTokenService::new(
            store.clone(),
            directory.clone(),
            delivery.clone(),
            CredentialHasher::new(),
            Arc::new(DefaultPasswordPolicy::default()),
        );

        Harness {
            store,
            directory,
            delivery,
            service,
        }
    }

    fn seed_user(h: &Harness, addr: &str, password: &str) {
        let hash = CredentialHasher::new().hash(password).unwrap();
        h.directory.insert_user(email(addr), hash, [Role::Customer]);
    }

    #[tokio::test]
    async fn issue_persists_and_delivers_a_usable_token() {
        let h = harness();
        seed_user(&h, "user@example.com", "OldPass123");
        let now = Utc::now();

        h.service.issue_for(&email("user@example.com"), now).await.unwrap();

        let token = h.delivery.last_token_for(&email("user@example.com")).unwrap();
        let record = h.store.find_by_token(&token).await.unwrap().unwrap();

        assert!(record.is_usable(now));
        assert_eq!(record.expires_at - record.issued_at, Duration::hours(1));
    }

    #[tokio::test]
    async fn unknown_email_issues_nothing_but_succeeds() {
        let h = harness();
        seed_user(&h, "known@example.com", "OldPass123");
        let now = Utc::now();

        // Same Ok(()) outcome for both; nothing stored or delivered for
        // the unknown address.
        h.service.issue_for(&email("known@example.com"), now).await.unwrap();
        h.service.issue_for(&email("ghost@example.com"), now).await.unwrap();

        assert!(h.delivery.last_token_for(&email("ghost@example.com")).is_none());
        assert!(
            h.store
                .find_latest_usable_by_email(&email("ghost@example.com"), now)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn validate_reports_email_for_usable_token_only() {
        let h = harness();
        seed_user(&h, "user@example.com", "OldPass123");
        let now = Utc::now();

        h.service.issue_for(&email("user@example.com"), now).await.unwrap();
        let token = h.delivery.last_token_for(&email("user@example.com")).unwrap();

        let validation = h.service.validate(&token, now).await.unwrap();
        assert!(validation.valid);
        assert_eq!(validation.email, Some(email("user@example.com")));
    }

    #[tokio::test]
    async fn invalid_cases_share_one_message() {
        let h = harness();
        seed_user(&h, "user@example.com", "OldPass123");
        let now = Utc::now();

        // Absent.
        let absent = h.service.validate("no-such-token", now).await.unwrap();

        // Expired.
        let mut expired = ResetToken::issue(email("user@example.com"), now, Duration::hours(1)).unwrap();
        expired.expires_at = now - Duration::seconds(1);
        h.store.save(expired.clone()).await.unwrap();
        let expired = h.service.validate(&expired.token, now).await.unwrap();

        // Consumed.
        let mut consumed = ResetToken::issue(email("user@example.com"), now, Duration::hours(1)).unwrap();
        consumed.consumed_at = Some(now);
        h.store.save(consumed.clone()).await.unwrap();
        let consumed = h.service.validate(&consumed.token, now).await.unwrap();

        for v in [&absent, &expired, &consumed] {
            assert!(!v.valid);
            assert!(v.email.is_none());
            assert_eq!(v.message, RESET_LINK_INVALID_MESSAGE);
        }
    }

    #[tokio::test]
    async fn reset_end_to_end() {
        let h = harness();
        seed_user(&h, "user@example.com", "OldPass123");
        let now = Utc::now();

        h.service.issue_for(&email("user@example.com"), now).await.unwrap();
        let token = h.delivery.last_token_for(&email("user@example.com")).unwrap();

        assert!(h.service.validate(&token, now).await.unwrap().valid);

        h.service.reset(&token, "NewPass123", now).await.unwrap();

        // Token is spent.
        assert!(!h.service.validate(&token, now).await.unwrap().valid);

        // New password took effect.
        let hasher = CredentialHasher::new();
        let record = h
            .directory
            .find_user_by_email(&email("user@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert!(hasher.verify("NewPass123", &record.password_hash).unwrap());
        assert!(!hasher.verify("OldPass123", &record.password_hash).unwrap());

        // Second consumption fails.
        assert!(matches!(
            h.service.reset(&token, "OtherPass456", now).await,
            Err(ResetError::AlreadyUsed)
        ));
    }

    #[tokio::test]
    async fn expired_token_cannot_reset() {
        let h = harness();
        seed_user(&h, "user@example.com", "OldPass123");
        let now = Utc::now();

        h.service.issue_for(&email("user@example.com"), now).await.unwrap();
        let token = h.delivery.last_token_for(&email("user@example.com")).unwrap();

        let later = now + Duration::hours(2);
        assert!(matches!(
            h.service.reset(&token, "NewPass123", later).await,
            Err(ResetError::Expired)
        ));
        assert!(!h.service.validate(&token, later).await.unwrap().valid);
    }

    #[tokio::test]
    async fn weak_password_is_rejected_and_token_stays_usable() {
        let h = harness();
        seed_user(&h, "user@example.com", "OldPass123");
        let now = Utc::now();

        h.service.issue_for(&email("user@example.com"), now).await.unwrap();
        let token = h.delivery.last_token_for(&email("user@example.com")).unwrap();

        assert!(matches!(
            h.service.reset(&token, "short", now).await,
            Err(ResetError::WeakPassword(_))
        ));

        // The failed attempt consumed nothing.
        assert!(h.service.validate(&token, now).await.unwrap().valid);
        h.service.reset(&token, "NewPass123", now).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_resets_have_exactly_one_winner() {
        let h = harness();
        seed_user(&h, "user@example.com", "OldPass123");
        let now = Utc::now();

        h.service.issue_for(&email("user@example.com"), now).await.unwrap();
        let token = h.delivery.last_token_for(&email("user@example.com")).unwrap();

        let service = Arc::new(h.service.clone());
        let a = tokio::spawn({
            let service = service.clone();
            let token = token.clone();
            async move { service.reset(&token, "WinnerPass1", now).await }
        });
        let b = tokio::spawn({
            let service = service.clone();
            let token = token.clone();
            async move { service.reset(&token, "WinnerPass2", now).await }
        });

        let (ra, rb) = (a.await.unwrap(), b.await.unwrap());

        let ok_count = [&ra, &rb].iter().filter(|r| r.is_ok()).count();
        let conflict_count = [&ra, &rb]
            .iter()
            .filter(|r| matches!(r, Err(ResetError::AlreadyUsed)))
            .count();
        assert_eq!(ok_count, 1);
        assert_eq!(conflict_count, 1);

        // Exactly one of the two candidate passwords is in effect.
        let hasher = CredentialHasher::new();
        let record = h
            .directory
            .find_user_by_email(&email("user@example.com"))
            .await
            .unwrap()
            .unwrap();
        let matches = ["WinnerPass1", "WinnerPass2"]
            .iter()
            .filter(|p| hasher.verify(p, &record.password_hash).unwrap())
            .count();
        assert_eq!(matches, 1);
    }

    #[tokio::test]
    async fn latest_usable_respects_consumption() {
        let h = harness();
        seed_user(&h, "user@example.com", "OldPass123");
        let now = Utc::now();

        h.service.issue_for(&email("user@example.com"), now).await.unwrap();
        let token = h.delivery.last_token_for(&email("user@example.com")).unwrap();

        assert!(
            h.service
                .latest_usable(&email("user@example.com"), now)
                .await
                .unwrap()
                .is_some()
        );

        h.service.reset(&token, "NewPass123", now).await.unwrap();

        assert!(
            h.service
                .latest_usable(&email("user@example.com"), now)
                .await
                .unwrap()
                .is_none()
        );
    }

    /// Store whose reads never complete; used to exercise the deadline.
    struct StalledStore;

    #[async_trait]
    impl ResetTokenStore for StalledStore {
        async fn save(&self, _token: ResetToken) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn find_by_token(&self, _token: &str) -> Result<Option<ResetToken>, StoreError> {
            std::future::pending().await
        }

        async fn find_latest_usable_by_email(
            &self,
            _email: &EmailAddress,
            _now: DateTime<Utc>,
        ) -> Result<Option<ResetToken>, StoreError> {
            std::future::pending().await
        }

        async fn mark_consumed(
            &self,
            _token: &str,
            _consumed_at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_store_surfaces_timeout() {
        let directory = Arc::new(InMemoryUserDirectory::new());
        let delivery = Arc::new(RecordingTokenDelivery::new());

        let service = ResetTokenService::new(
            StalledStore,
            directory,
            delivery,
            CredentialHasher::new(),
            Arc::new(DefaultPasswordPolicy::default()),
        )
        .with_op_deadline(StdDuration::from_millis(20));

        let result = service.validate("whatever", Utc::now()).await;
        assert!(matches!(result, Err(ResetError::Store(StoreError::Timeout))));
    }
}
