//! Interface to the external user/profile record store.
//!
//! The user store is an external collaborator: this subsystem reads
//! accounts and role grants, and writes exactly one field, the password
//! hash. Everything else about users belongs to the surrounding
//! application.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

use storekeep_auth::{PasswordHashString, Role};
use storekeep_core::{EmailAddress, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("user store lookup failed: {0}")]
    Lookup(String),

    #[error("user store write failed: {0}")]
    Write(String),
}

/// The slice of a user record this subsystem is allowed to see.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: UserId,
    pub email: EmailAddress,
    pub password_hash: PasswordHashString,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<UserRecord>, DirectoryError>;

    async fn find_roles_for_user(&self, user_id: UserId) -> Result<BTreeSet<Role>, DirectoryError>;

    async fn set_password_hash(
        &self,
        user_id: UserId,
        hash: PasswordHashString,
    ) -> Result<(), DirectoryError>;
}

#[async_trait]
impl<U> UserDirectory for Arc<U>
where
    U: UserDirectory + ?Sized,
{
    async fn find_user_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        (**self).find_user_by_email(email).await
    }

    async fn find_roles_for_user(&self, user_id: UserId) -> Result<BTreeSet<Role>, DirectoryError> {
        (**self).find_roles_for_user(user_id).await
    }

    async fn set_password_hash(
        &self,
        user_id: UserId,
        hash: PasswordHashString,
    ) -> Result<(), DirectoryError> {
        (**self).set_password_hash(user_id, hash).await
    }
}

/// In-memory user directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<UserId, (UserRecord, BTreeSet<Role>)>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(
        &self,
        email: EmailAddress,
        password_hash: PasswordHashString,
        roles: impl IntoIterator<Item = Role>,
    ) -> UserId {
        let user_id = UserId::new();
        let record = UserRecord {
            user_id,
            email,
            password_hash,
        };

        self.users
            .write()
            .expect("user directory lock poisoned")
            .insert(user_id, (record, roles.into_iter().collect()));

        user_id
    }

    pub fn set_roles(&self, user_id: UserId, roles: impl IntoIterator<Item = Role>) {
        if let Some((_, granted)) = self
            .users
            .write()
            .expect("user directory lock poisoned")
            .get_mut(&user_id)
        {
            *granted = roles.into_iter().collect();
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_user_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        let users = self
            .users
            .read()
            .map_err(|_| DirectoryError::Lookup("lock poisoned".to_string()))?;

        Ok(users
            .values()
            .find(|(record, _)| record.email == *email)
            .map(|(record, _)| record.clone()))
    }

    async fn find_roles_for_user(&self, user_id: UserId) -> Result<BTreeSet<Role>, DirectoryError> {
        let users = self
            .users
            .read()
            .map_err(|_| DirectoryError::Lookup("lock poisoned".to_string()))?;

        Ok(users
            .get(&user_id)
            .map(|(_, roles)| roles.clone())
            .unwrap_or_default())
    }

    async fn set_password_hash(
        &self,
        user_id: UserId,
        hash: PasswordHashString,
    ) -> Result<(), DirectoryError> {
        let mut users = self
            .users
            .write()
            .map_err(|_| DirectoryError::Write("lock poisoned".to_string()))?;

        let (record, _) = users
            .get_mut(&user_id)
            .ok_or_else(|| DirectoryError::Write(format!("unknown user {user_id}")))?;

        record.password_hash = hash;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(addr: &str) -> EmailAddress {
        EmailAddress::parse(addr).unwrap()
    }

    #[tokio::test]
    async fn lookup_by_email_and_roles() {
        let directory = InMemoryUserDirectory::new();
        let user_id = directory.insert_user(
            email("alice@example.com"),
            PasswordHashString::from("$argon2id$stub".to_string()),
            [Role::Admin],
        );

        let record = directory
            .find_user_by_email(&email("alice@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.user_id, user_id);

        let roles = directory.find_roles_for_user(user_id).await.unwrap();
        assert!(roles.contains(&Role::Admin));

        assert!(
            directory
                .find_user_by_email(&email("nobody@example.com"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn set_password_hash_replaces_credential() {
        let directory = InMemoryUserDirectory::new();
        let user_id = directory.insert_user(
            email("bob@example.com"),
            PasswordHashString::from("old".to_string()),
            [Role::Customer],
        );

        directory
            .set_password_hash(user_id, PasswordHashString::from("new".to_string()))
            .await
            .unwrap();

        let record = directory
            .find_user_by_email(&email("bob@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.password_hash.as_str(), "new");

        assert!(
            directory
                .set_password_hash(UserId::new(), PasswordHashString::from("x".to_string()))
                .await
                .is_err()
        );
    }
}
