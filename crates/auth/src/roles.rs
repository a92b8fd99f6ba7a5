//! Canonical role identifiers used for RBAC.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A role granted to a user account.
///
/// Roles are a closed set, not free-form strings: a typo in a role name is a
/// parse error, never a silently unprivileged (or silently privileged)
/// string comparison. Legacy spellings from the old storefront data
/// (`"ROLE_ADMIN"`, `"Admin"`) normalize to the canonical variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access to the admin surface.
    Admin,
    /// Regular storefront account.
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role: '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        let name = lowered.strip_prefix("role_").unwrap_or(&lowered);

        match name {
            "admin" => Ok(Role::Admin),
            "customer" | "user" => Ok(Role::Customer),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_spellings_normalize() {
        assert_eq!("ROLE_ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("ROLE_USER".parse::<Role>().unwrap(), Role::Customer);
        assert_eq!("Customer".parse::<Role>().unwrap(), Role::Customer);
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!("admn".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn serde_uses_canonical_names() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"customer\"").unwrap(),
            Role::Customer
        );
    }
}
