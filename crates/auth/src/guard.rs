//! Role-based access decision.
//!
//! One decision function backs both page-level and API-level gating: the
//! HTTP layer injects it as shared middleware rather than re-implementing
//! the check per call site.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::roles::Role;
use crate::session::Session;

/// Authentication/authorization failure at the decision boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No session, or the session has expired.
    #[error("unauthenticated")]
    Unauthenticated,

    /// A session exists but lacks the required role.
    #[error("forbidden")]
    Forbidden,

    /// Login rejected. Deliberately does not distinguish unknown email from
    /// wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,
}

/// Admit or deny a session for an operation requiring `role`.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn require(
    session: Option<&Session>,
    role: Role,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    let session = session.ok_or(AuthError::Unauthenticated)?;

    if session.is_expired(now) {
        return Err(AuthError::Unauthenticated);
    }

    if session.has_role(role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use storekeep_core::{EmailAddress, UserId};

    fn session(roles: &[Role], now: DateTime<Utc>) -> Session {
        Session {
            user_id: UserId::new(),
            email: EmailAddress::parse("user@example.com").unwrap(),
            roles: roles.iter().copied().collect(),
            created_at: now,
            expires_at: now + Duration::hours(8),
        }
    }

    #[test]
    fn absent_session_is_unauthenticated() {
        let now = Utc::now();
        assert_eq!(
            require(None, Role::Admin, now),
            Err(AuthError::Unauthenticated)
        );
    }

    #[test]
    fn missing_role_is_forbidden() {
        let now = Utc::now();
        let s = session(&[Role::Customer], now);
        assert_eq!(
            require(Some(&s), Role::Admin, now),
            Err(AuthError::Forbidden)
        );
    }

    #[test]
    fn matching_role_is_admitted() {
        let now = Utc::now();
        let s = session(&[Role::Admin, Role::Customer], now);
        assert_eq!(require(Some(&s), Role::Admin, now), Ok(()));
        assert_eq!(require(Some(&s), Role::Customer, now), Ok(()));
    }

    #[test]
    fn expired_session_is_unauthenticated_not_forbidden() {
        let now = Utc::now();
        let s = session(&[Role::Admin], now - Duration::hours(10));
        let expired_now = s.expires_at + Duration::seconds(1);
        assert_eq!(
            require(Some(&s), Role::Admin, expired_now),
            Err(AuthError::Unauthenticated)
        );
    }
}
