//! Environment-driven application configuration.

use chrono::Duration;

use storekeep_infra::RoleFreshness;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `STOREKEEP_BIND`, default `0.0.0.0:8080`.
    pub bind_addr: String,

    /// `SESSION_SECRET`. Falls back to an insecure dev default with a
    /// warning, as nothing signed with it should ever face the internet.
    pub session_secret: String,

    /// `SESSION_TTL_SECS`, default 8 hours.
    pub session_ttl: Duration,

    /// `RESET_TOKEN_TTL_SECS`, default 1 hour.
    pub reset_token_ttl: Duration,

    /// `ROLE_FRESHNESS`: `at_login` (default) or `per_request`.
    pub role_freshness: RoleFreshness,

    /// `DATABASE_URL` for the Postgres reset-token store; in-memory when
    /// unset.
    pub database_url: Option<String>,

    /// `DEV_ADMIN_EMAIL` / `DEV_ADMIN_PASSWORD`: seed one admin account
    /// into the in-memory user directory (dev only; the real user store
    /// is an external collaborator).
    pub dev_admin_email: Option<String>,
    pub dev_admin_password: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let session_secret = std::env::var("SESSION_SECRET").unwrap_or_else(|_| {
            tracing::warn!("SESSION_SECRET not set; using insecure dev default");
            "dev-secret".to_string()
        });

        let role_freshness = match std::env::var("ROLE_FRESHNESS").as_deref() {
            Ok("per_request") => RoleFreshness::PerRequest,
            _ => RoleFreshness::AtLogin,
        };

        Self {
            bind_addr: std::env::var("STOREKEEP_BIND")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            session_secret,
            session_ttl: env_secs("SESSION_TTL_SECS").unwrap_or_else(|| Duration::hours(8)),
            reset_token_ttl: env_secs("RESET_TOKEN_TTL_SECS")
                .unwrap_or_else(|| Duration::hours(1)),
            role_freshness,
            database_url: std::env::var("DATABASE_URL").ok(),
            dev_admin_email: std::env::var("DEV_ADMIN_EMAIL").ok(),
            dev_admin_password: std::env::var("DEV_ADMIN_PASSWORD").ok(),
        }
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<i64>() {
        Ok(secs) if secs > 0 => Some(Duration::seconds(secs)),
        _ => {
            tracing::warn!(%name, %raw, "ignoring unparseable duration");
            None
        }
    }
}
