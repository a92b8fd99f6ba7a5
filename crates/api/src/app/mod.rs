//! HTTP API application wiring (Axum router + service wiring).
//!
//! The folder is structured like:
//! - `services.rs`: infrastructure wiring (stores, services, codec)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router from pre-wired services.
///
/// The session middleware resolves a context for every route below it; the
/// `/admin` nest additionally passes through the role guard.
pub fn build_app(app_services: services::AppServices) -> Router {
    let auth_state = middleware::AuthState {
        codec: app_services.codec.clone(),
        sessions: app_services.sessions.clone(),
    };

    let session_scoped = Router::new()
        .nest("/auth", routes::auth::router())
        .nest("/admin", routes::admin::router())
        .layer(Extension(Arc::new(app_services)))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::session_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(session_scoped)
        .layer(ServiceBuilder::new())
}

/// Build the app from configuration (public entrypoint used by `main.rs`).
pub async fn build_default_app(config: &AppConfig) -> anyhow::Result<Router> {
    let app_services = services::build_services(config).await?;
    Ok(build_app(app_services))
}
