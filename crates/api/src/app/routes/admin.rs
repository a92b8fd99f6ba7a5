//! Admin-only endpoints.
//!
//! Every route in this nest passes through the shared admin guard before
//! its body runs; handlers never re-implement the role check.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;

use storekeep_core::EmailAddress;

use crate::app::dto::{PendingResetView, SessionView};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::SessionContext;
use crate::middleware;

pub fn router() -> Router {
    Router::new()
        .route("/session", get(session))
        .route("/password-resets/:email", get(pending_reset))
        .route_layer(axum::middleware::from_fn(middleware::require_admin))
}

/// GET /admin/session - the guard already ran; echo the admitted session.
pub async fn session(Extension(context): Extension<SessionContext>) -> axum::response::Response {
    match context.session() {
        Some(session) => {
            (StatusCode::OK, Json(SessionView::from_session(session))).into_response()
        }
        // Unreachable behind the guard; kept as a response, not a panic.
        None => errors::internal_error(),
    }
}

/// GET /admin/password-resets/:email - support view: does this account
/// have a usable reset link outstanding?
pub async fn pending_reset(
    Extension(services): Extension<Arc<AppServices>>,
    Path(email): Path<String>,
) -> axum::response::Response {
    let email = match EmailAddress::parse(&email) {
        Ok(email) => email,
        Err(err) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_email", err.to_string());
        }
    };

    match services.resets.latest_usable(&email, Utc::now()).await {
        Ok(record) => (
            StatusCode::OK,
            Json(PendingResetView::from_record(record.as_ref())),
        )
            .into_response(),
        Err(err) => errors::reset_error_to_response(err),
    }
}
