//! Password-reset token record and lifecycle evaluation.
//!
//! A reset token is a single-use, time-bounded credential proving control of
//! an email address. The record itself is pure data; issuance, persistence
//! and consumption live in the infra layer.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use storekeep_core::EmailAddress;

use crate::password::CryptoError;

/// Bytes of entropy per token (256 bits, well above the 128-bit floor).
const TOKEN_ENTROPY_BYTES: usize = 32;

/// Where a token currently sits in its lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    /// Not consumed, not expired.
    Usable,
    /// Past `expires_at`.
    Expired,
    /// `consumed_at` is set; consumption is irreversible.
    Consumed,
}

/// A stored reset-token record.
///
/// # Invariants
/// - `token` is unique across all non-consumed records.
/// - `expires_at > issued_at`, fixed offset at issuance.
/// - `consumed_at` transitions from `None` to `Some` exactly once.
/// - Records are never deleted (retained for audit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetToken {
    pub token: String,
    pub email: EmailAddress,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl ResetToken {
    /// Build a fresh record for `email`, valid for `ttl` from `now`.
    pub fn issue(
        email: EmailAddress,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, CryptoError> {
        Ok(Self {
            token: generate_reset_token()?,
            email,
            issued_at: now,
            expires_at: now + ttl,
            consumed_at: None,
        })
    }

    pub fn status(&self, now: DateTime<Utc>) -> TokenStatus {
        if self.consumed_at.is_some() {
            TokenStatus::Consumed
        } else if now > self.expires_at {
            TokenStatus::Expired
        } else {
            TokenStatus::Usable
        }
    }

    /// A token is usable iff it is unconsumed and `now <= expires_at`.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status(now) == TokenStatus::Usable
    }
}

/// Generate a cryptographically random, URL-safe token value.
pub fn generate_reset_token() -> Result<String, CryptoError> {
    let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::Hash(format!("rng failure: {e}")))?;

    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> EmailAddress {
        EmailAddress::parse("user@example.com").unwrap()
    }

    #[test]
    fn issued_token_is_usable_until_expiry() {
        let now = Utc::now();
        let token = ResetToken::issue(email(), now, Duration::hours(1)).unwrap();

        assert_eq!(token.status(now), TokenStatus::Usable);
        // Boundary: exactly at expires_at is still usable.
        assert_eq!(token.status(token.expires_at), TokenStatus::Usable);
        assert_eq!(
            token.status(token.expires_at + Duration::seconds(1)),
            TokenStatus::Expired
        );
    }

    #[test]
    fn consumption_wins_over_expiry() {
        let now = Utc::now();
        let mut token = ResetToken::issue(email(), now, Duration::hours(1)).unwrap();
        token.consumed_at = Some(now + Duration::minutes(5));

        assert_eq!(token.status(now + Duration::hours(2)), TokenStatus::Consumed);
        assert!(!token.is_usable(now));
    }

    #[test]
    fn expires_at_is_fixed_offset_from_issuance() {
        let now = Utc::now();
        let token = ResetToken::issue(email(), now, Duration::hours(1)).unwrap();
        assert_eq!(token.expires_at - token.issued_at, Duration::hours(1));
    }

    #[test]
    fn generated_tokens_are_url_safe_and_distinct() {
        let a = generate_reset_token().unwrap();
        let b = generate_reset_token().unwrap();

        assert_ne!(a, b);
        // 32 bytes -> 43 base64url chars, no padding, no reserved chars.
        assert_eq!(a.len(), 43);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }
}
