//! `storekeep-auth` — pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: hashing,
//! token lifecycle evaluation and access decisions are deterministic
//! functions over explicit inputs (including `now`).

pub mod guard;
pub mod password;
pub mod policy;
pub mod reset;
pub mod roles;
pub mod session;

pub use guard::{AuthError, require};
pub use password::{CredentialHasher, CryptoError, PasswordHashString};
pub use policy::{DefaultPasswordPolicy, PasswordPolicy, PolicyViolation};
pub use reset::{ResetToken, TokenStatus, generate_reset_token};
pub use roles::{Role, UnknownRole};
pub use session::{Hs256SessionCodec, Session, SessionClaims, SessionCodec, SessionCodecError};
