//! Session establishment and resolution.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use storekeep_auth::{AuthError, CredentialHasher, CryptoError, PasswordHashString, Session};
use storekeep_core::EmailAddress;

use crate::user_directory::{DirectoryError, UserDirectory};

/// How current a session's role claims must be.
///
/// `AtLogin` embeds roles in the session once, at authentication; a role
/// revoked mid-session stays effective until the session expires.
/// `PerRequest` re-reads roles from the user store on every resolution,
/// trading a directory round-trip per privileged request for immediate
/// revocation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RoleFreshness {
    #[default]
    AtLogin,
    PerRequest,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Establishes sessions from credentials and resolves them per request.
#[derive(Clone)]
pub struct SessionAuthority<U> {
    directory: U,
    hasher: CredentialHasher,
    session_ttl: Duration,
    role_freshness: RoleFreshness,
    // Verified instead of an early return when the email is unknown, so
    // both rejection paths cost one hash comparison.
    decoy_hash: PasswordHashString,
}

impl<U> SessionAuthority<U>
where
    U: UserDirectory,
{
    pub fn new(directory: U, hasher: CredentialHasher) -> Result<Self, CryptoError> {
        let decoy_hash = hasher.hash("storekeep-decoy-credential")?;

        Ok(Self {
            directory,
            hasher,
            session_ttl: Duration::hours(8),
            role_freshness: RoleFreshness::default(),
            decoy_hash,
        })
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_role_freshness(mut self, freshness: RoleFreshness) -> Self {
        self.role_freshness = freshness;
        self
    }

    /// Verify credentials and establish a session.
    ///
    /// Unknown email and wrong password both come back as
    /// [`AuthError::InvalidCredentials`]. Roles are read fresh from the
    /// directory at this point, never cached across logins.
    pub async fn authenticate(
        &self,
        email: &EmailAddress,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<Session, SessionError> {
        let record = self.directory.find_user_by_email(email).await?;

        let Some(record) = record else {
            let _ = self.verify_blocking(password, self.decoy_hash.clone()).await?;
            return Err(AuthError::InvalidCredentials.into());
        };

        let verified = self
            .verify_blocking(password, record.password_hash.clone())
            .await?;
        if !verified {
            tracing::info!(user_id = %record.user_id, "login rejected");
            return Err(AuthError::InvalidCredentials.into());
        }

        let roles = self.directory.find_roles_for_user(record.user_id).await?;

        tracing::info!(user_id = %record.user_id, "login accepted");
        Ok(Session {
            user_id: record.user_id,
            email: record.email,
            roles,
            created_at: now,
            expires_at: now + self.session_ttl,
        })
    }

    /// Resolve the session carried by the caller's context.
    ///
    /// Pure read: an expired session resolves to `None`; under
    /// [`RoleFreshness::PerRequest`] the role set is re-read from the
    /// directory first.
    pub async fn current(
        &self,
        session: Session,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, DirectoryError> {
        if session.is_expired(now) {
            return Ok(None);
        }

        match self.role_freshness {
            RoleFreshness::AtLogin => Ok(Some(session)),
            RoleFreshness::PerRequest => {
                let roles = self.directory.find_roles_for_user(session.user_id).await?;
                Ok(Some(Session { roles, ..session }))
            }
        }
    }

    async fn verify_blocking(
        &self,
        password: &str,
        hash: PasswordHashString,
    ) -> Result<bool, CryptoError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| CryptoError::Hash(format!("verification task failed: {e}")))?
    }
}
