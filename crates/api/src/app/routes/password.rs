//! Password-reset endpoints.
//!
//! The forgot and reset responses are deliberately uniform: nothing in
//! status, shape or message distinguishes an unknown account, an expired
//! token or a spent token.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use storekeep_core::EmailAddress;
use storekeep_infra::reset::RESET_REQUESTED_MESSAGE;

use crate::app::dto::{ForgotPasswordRequest, MessageResponse, ResetPasswordRequest};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/forgot", post(forgot))
        .route("/reset", post(reset))
        .route("/reset/:token", get(validate))
}

/// POST /auth/password/forgot - request a reset link.
pub async fn forgot(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<ForgotPasswordRequest>,
) -> axum::response::Response {
    let accepted = (
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: RESET_REQUESTED_MESSAGE,
        }),
    );

    // Unparseable addresses get the same acceptance as unknown ones.
    let Ok(email) = EmailAddress::parse(&body.email) else {
        return accepted.into_response();
    };

    match services.resets.issue_for(&email, Utc::now()).await {
        Ok(()) => accepted.into_response(),
        Err(err) => errors::reset_error_to_response(err),
    }
}

/// GET /auth/password/reset/:token - pre-render check for the reset form.
pub async fn validate(
    Extension(services): Extension<Arc<AppServices>>,
    Path(token): Path<String>,
) -> axum::response::Response {
    match services.resets.validate(&token, Utc::now()).await {
        Ok(validation) => (StatusCode::OK, Json(validation)).into_response(),
        Err(err) => errors::reset_error_to_response(err),
    }
}

/// POST /auth/password/reset - consume a token and set a new password.
pub async fn reset(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<ResetPasswordRequest>,
) -> axum::response::Response {
    match services
        .resets
        .reset(&body.token, &body.new_password, Utc::now())
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => errors::reset_error_to_response(err),
    }
}
