//! Login, logout and session echo.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use storekeep_auth::AuthError;
use storekeep_core::EmailAddress;

use crate::app::dto::{LoginRequest, LoginResponse, SessionView};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/whoami", get(whoami))
        .nest("/password", super::password::router())
}

/// POST /auth/login - verify credentials and mint a session token.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<LoginRequest>,
) -> axum::response::Response {
    // A malformed email cannot name an account; same rejection as a wrong
    // password.
    let Ok(email) = EmailAddress::parse(&body.email) else {
        return errors::auth_error_to_response(&AuthError::InvalidCredentials);
    };

    let session = match services
        .sessions
        .authenticate(&email, &body.password, Utc::now())
        .await
    {
        Ok(session) => session,
        Err(err) => return errors::session_error_to_response(err),
    };

    let token = match services.codec.encode(&session) {
        Ok(token) => token,
        Err(err) => {
            tracing::error!(%err, "failed to encode session token");
            return errors::internal_error();
        }
    };

    (
        StatusCode::OK,
        Json(LoginResponse {
            token,
            expires_at: session.expires_at,
        }),
    )
        .into_response()
}

/// POST /auth/logout - end the session.
///
/// Sessions are client-held signed tokens; the server keeps no revocation
/// list, so logout is the client discarding its token. A stolen token
/// therefore stays valid until natural expiry (known hardening gap).
pub async fn logout(Extension(context): Extension<SessionContext>) -> axum::response::Response {
    if let Some(session) = context.session() {
        tracing::info!(user_id = %session.user_id, "logout");
    }

    StatusCode::NO_CONTENT.into_response()
}

/// GET /auth/whoami - echo the authenticated session.
pub async fn whoami(Extension(context): Extension<SessionContext>) -> axum::response::Response {
    match context.session() {
        Some(session) => {
            (StatusCode::OK, Json(SessionView::from_session(session))).into_response()
        }
        None => errors::auth_error_to_response(&AuthError::Unauthenticated),
    }
}
