//! Out-of-band delivery of issued reset tokens.
//!
//! Delivery (email, SMS) is an external collaborator; this module only
//! defines the handoff contract plus two local sinks. The tracing sink is
//! a debug-only side channel: the token store is the system of record,
//! never a log.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use storekeep_core::EmailAddress;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("token delivery failed: {0}")]
pub struct DeliveryError(pub String);

#[async_trait]
pub trait TokenDelivery: Send + Sync {
    async fn deliver(
        &self,
        email: &EmailAddress,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DeliveryError>;
}

#[async_trait]
impl<D> TokenDelivery for Arc<D>
where
    D: TokenDelivery + ?Sized,
{
    async fn deliver(
        &self,
        email: &EmailAddress,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DeliveryError> {
        (**self).deliver(email, token, expires_at).await
    }
}

/// Dev-only sink that writes the token to the log at debug level.
#[derive(Debug, Default)]
pub struct TracingTokenDelivery;

#[async_trait]
impl TokenDelivery for TracingTokenDelivery {
    async fn deliver(
        &self,
        email: &EmailAddress,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DeliveryError> {
        tracing::info!(email = %email, %expires_at, "password reset token issued");
        tracing::debug!(email = %email, %token, "reset token (dev delivery sink)");
        Ok(())
    }
}

/// A delivered token captured by [`RecordingTokenDelivery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredToken {
    pub email: EmailAddress,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Test sink that records every handoff.
#[derive(Debug, Default)]
pub struct RecordingTokenDelivery {
    inner: Mutex<Vec<DeliveredToken>>,
}

impl RecordingTokenDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<DeliveredToken> {
        self.inner.lock().expect("delivery lock poisoned").clone()
    }

    pub fn last_token_for(&self, email: &EmailAddress) -> Option<String> {
        self.delivered()
            .into_iter()
            .rev()
            .find(|d| d.email == *email)
            .map(|d| d.token)
    }
}

#[async_trait]
impl TokenDelivery for RecordingTokenDelivery {
    async fn deliver(
        &self,
        email: &EmailAddress,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DeliveryError> {
        self.inner
            .lock()
            .map_err(|_| DeliveryError("delivery lock poisoned".to_string()))?
            .push(DeliveredToken {
                email: email.clone(),
                token: token.to_string(),
                expires_at,
            });
        Ok(())
    }
}
