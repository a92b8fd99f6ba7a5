use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use storekeep_auth::AuthError;
use storekeep_infra::{ResetError, SessionError, StoreError};

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn internal_error() -> axum::response::Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "something went wrong",
    )
}

pub fn auth_error_to_response(err: &AuthError) -> axum::response::Response {
    match err {
        AuthError::Unauthenticated => json_error(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "authentication required",
        ),
        AuthError::Forbidden => json_error(StatusCode::FORBIDDEN, "forbidden", "forbidden"),
        AuthError::InvalidCredentials => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid email or password",
        ),
    }
}

pub fn session_error_to_response(err: SessionError) -> axum::response::Response {
    match err {
        SessionError::Auth(e) => auth_error_to_response(&e),
        SessionError::Crypto(e) => {
            tracing::error!(%e, "crypto failure during authentication");
            internal_error()
        }
        SessionError::Directory(e) => {
            tracing::error!(%e, "user store failure during authentication");
            internal_error()
        }
    }
}

/// All token-state failures collapse to one generic message; only the
/// password-policy rejection stays specific.
pub fn reset_error_to_response(err: ResetError) -> axum::response::Response {
    match err {
        ResetError::InvalidToken | ResetError::Expired | ResetError::AlreadyUsed => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_reset_link",
            storekeep_infra::reset::RESET_LINK_INVALID_MESSAGE,
        ),
        ResetError::WeakPassword(violation) => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "weak_password",
            violation.to_string(),
        ),
        ResetError::Store(StoreError::Timeout) => json_error(
            StatusCode::GATEWAY_TIMEOUT,
            "store_timeout",
            "temporarily unavailable, try again",
        ),
        ResetError::Crypto(e) => {
            tracing::error!(%e, "crypto failure during password reset");
            internal_error()
        }
        ResetError::Store(e) => {
            tracing::error!(%e, "token store failure during password reset");
            internal_error()
        }
        ResetError::Directory(e) => {
            tracing::error!(%e, "user store failure during password reset");
            internal_error()
        }
    }
}
