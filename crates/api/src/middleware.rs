use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use storekeep_auth::{Role, SessionCodec, require};

use crate::app::errors;
use crate::app::services::Sessions;
use crate::context::SessionContext;

#[derive(Clone)]
pub struct AuthState {
    pub codec: std::sync::Arc<dyn SessionCodec>,
    pub sessions: Sessions,
}

/// Resolve the caller's session (if any) into a [`SessionContext`]
/// extension.
///
/// Anonymous requests and requests with tampered or expired tokens all
/// proceed with an anonymous context; denial is the guard's job, not the
/// resolver's.
pub async fn session_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let context = match extract_bearer(req.headers()) {
        Some(token) => match state.codec.decode(token) {
            Ok(session) => match state.sessions.current(session, Utc::now()).await {
                Ok(Some(session)) => SessionContext::authenticated(session),
                Ok(None) => SessionContext::anonymous(),
                Err(err) => {
                    tracing::error!(%err, "session resolution failed");
                    return Err(errors::internal_error());
                }
            },
            Err(_) => SessionContext::anonymous(),
        },
        None => SessionContext::anonymous(),
    };

    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}

/// Admission check for the admin surface.
///
/// The same [`require`] decision backs this route-level gate and any
/// handler-level check, so page gating and API gating cannot drift apart.
pub async fn require_admin(
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let context = req
        .extensions()
        .get::<SessionContext>()
        .cloned()
        .unwrap_or_default();

    if let Err(err) = require(context.session(), Role::Admin, Utc::now()) {
        return Err(errors::auth_error_to_response(&err));
    }

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();

    if token.is_empty() { None } else { Some(token) }
}
