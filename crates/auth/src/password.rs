//! One-way password hashing and verification.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A PHC-formatted password hash string (algorithm, params, salt, digest).
///
/// Produced by [`CredentialHasher::hash`] and owned by the external user
/// store; this subsystem never persists it itself.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PasswordHashString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// Hashes are not secrets the way passwords are, but they have no business in
// log output either.
impl core::fmt::Debug for PasswordHashString {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PasswordHashString(..)")
    }
}

/// Hashing/RNG failure.
///
/// Never raised for "password does not match": that is an `Ok(false)` from
/// [`CredentialHasher::verify`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

/// Salted, adaptive one-way password hasher (Argon2id).
///
/// The default parameters are the `argon2` crate defaults, comparable in
/// cost to bcrypt at cost 10. Hashing is CPU-bound; callers that serve
/// requests should run it via `spawn_blocking` (see the infra services).
#[derive(Clone, Default)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl CredentialHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hasher with an explicit work factor (memory/iterations/parallelism).
    pub fn with_params(params: argon2::Params) -> Self {
        Self {
            argon2: Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params),
        }
    }

    /// Hash a raw password with a fresh random salt.
    ///
    /// Fails only on underlying RNG/algorithm failure, never on input
    /// content.
    pub fn hash(&self, password: &str) -> Result<PasswordHashString, CryptoError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CryptoError::Hash(e.to_string()))?;

        Ok(PasswordHashString(hash.to_string()))
    }

    /// Verify a raw password against a stored hash.
    ///
    /// Mismatch is `Ok(false)`; only a malformed stored hash or an internal
    /// algorithm failure is an error. The comparison runs in constant time
    /// within the underlying primitive.
    pub fn verify(&self, password: &str, hashed: &PasswordHashString) -> Result<bool, CryptoError> {
        let parsed = PasswordHash::new(hashed.as_str())
            .map_err(|e| CryptoError::MalformedHash(e.to_string()))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CryptoError::Hash(e.to_string())),
        }
    }
}

impl core::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("CredentialHasher")
    }
}
