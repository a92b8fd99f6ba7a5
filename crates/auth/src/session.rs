//! Session model and the signed-claims wire codec.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storekeep_core::{EmailAddress, UserId};

use crate::roles::Role;

/// An established authenticated session.
///
/// Owned by the request context for its lifetime; not persisted by this
/// subsystem. Roles are embedded at login time; see the session authority
/// for the freshness tunable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub email: EmailAddress,
    pub roles: BTreeSet<Role>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Signed claims carried by the session token.
///
/// Timestamps are unix seconds (`iat`/`exp`) as JWTs expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,
    pub email: EmailAddress,
    pub roles: Vec<Role>,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn from_session(session: &Session) -> Self {
        Self {
            sub: session.user_id,
            email: session.email.clone(),
            roles: session.roles.iter().copied().collect(),
            iat: session.created_at.timestamp(),
            exp: session.expires_at.timestamp(),
        }
    }

    pub fn into_session(self) -> Result<Session, SessionCodecError> {
        let created_at = DateTime::<Utc>::from_timestamp(self.iat, 0)
            .ok_or(SessionCodecError::InvalidClaims)?;
        let expires_at = DateTime::<Utc>::from_timestamp(self.exp, 0)
            .ok_or(SessionCodecError::InvalidClaims)?;

        if expires_at <= created_at {
            return Err(SessionCodecError::InvalidClaims);
        }

        Ok(Session {
            user_id: self.sub,
            email: self.email,
            roles: self.roles.into_iter().collect(),
            created_at,
            expires_at,
        })
    }
}

#[derive(Debug, Error)]
pub enum SessionCodecError {
    #[error("session token is invalid")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("session claims are invalid")]
    InvalidClaims,
}

/// Encode/decode sessions to an opaque wire token.
///
/// A trait so transports and tests can swap the signing scheme without
/// touching callers.
pub trait SessionCodec: Send + Sync {
    fn encode(&self, session: &Session) -> Result<String, SessionCodecError>;

    /// Decode and signature-check a token.
    ///
    /// Expiry is *not* checked here: callers hold `now` and decide via
    /// [`crate::guard::require`], keeping time explicit and testable.
    fn decode(&self, token: &str) -> Result<Session, SessionCodecError>;
}

impl<C> SessionCodec for std::sync::Arc<C>
where
    C: SessionCodec + ?Sized,
{
    fn encode(&self, session: &Session) -> Result<String, SessionCodecError> {
        (**self).encode(session)
    }

    fn decode(&self, token: &str) -> Result<Session, SessionCodecError> {
        (**self).decode(token)
    }
}

/// HS256-signed JWT session codec.
pub struct Hs256SessionCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Hs256SessionCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is enforced by the guard against an explicit `now`.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl SessionCodec for Hs256SessionCodec {
    fn encode(&self, session: &Session) -> Result<String, SessionCodecError> {
        let claims = SessionClaims::from_session(session);
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(token)
    }

    fn decode(&self, token: &str) -> Result<Session, SessionCodecError> {
        let data =
            jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)?;
        data.claims.into_session()
    }
}
