//! Request/response DTOs and JSON mapping helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storekeep_auth::{ResetToken, Role, Session};
use storekeep_core::{EmailAddress, UserId};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub user_id: UserId,
    pub email: EmailAddress,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionView {
    pub fn from_session(session: &Session) -> Self {
        Self {
            user_id: session.user_id,
            email: session.email.clone(),
            roles: session.roles.iter().copied().collect(),
            created_at: session.created_at,
            expires_at: session.expires_at,
        }
    }
}

/// Admin support view of a pending reset. The token value itself is
/// absent: knowing it would let the viewer take over the account.
#[derive(Debug, Serialize)]
pub struct PendingResetView {
    pub pending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl PendingResetView {
    pub fn from_record(record: Option<&ResetToken>) -> Self {
        match record {
            Some(r) => Self {
                pending: true,
                issued_at: Some(r.issued_at),
                expires_at: Some(r.expires_at),
            },
            None => Self {
                pending: false,
                issued_at: None,
                expires_at: None,
            },
        }
    }
}
