//! Service wiring for the HTTP application.

use std::sync::Arc;

use sqlx::PgPool;

use storekeep_auth::{
    CredentialHasher, CryptoError, DefaultPasswordPolicy, Hs256SessionCodec, Role, SessionCodec,
};
use storekeep_core::EmailAddress;
use storekeep_infra::{
    InMemoryResetTokenStore, InMemoryUserDirectory, PostgresResetTokenStore, ResetTokenService,
    ResetTokenStore, SessionAuthority, TokenDelivery, TracingTokenDelivery, UserDirectory,
};

use crate::config::AppConfig;

pub type SharedTokenStore = Arc<dyn ResetTokenStore>;
pub type SharedDirectory = Arc<dyn UserDirectory>;
pub type SharedDelivery = Arc<dyn TokenDelivery>;

pub type Resets = ResetTokenService<SharedTokenStore, SharedDirectory, SharedDelivery>;
pub type Sessions = SessionAuthority<SharedDirectory>;

#[derive(Clone)]
pub struct AppServices {
    pub resets: Resets,
    pub sessions: Sessions,
    pub codec: Arc<dyn SessionCodec>,
}

/// Wire services from explicit collaborators (used directly by tests).
pub fn build_services_with(
    store: SharedTokenStore,
    directory: SharedDirectory,
    delivery: SharedDelivery,
    config: &AppConfig,
) -> Result<AppServices, CryptoError> {
    let hasher = CredentialHasher::new();

    let resets = ResetTokenService::new(
        store,
        directory.clone(),
        delivery,
        hasher.clone(),
        Arc::new(DefaultPasswordPolicy::default()),
    )
    .with_token_ttl(config.reset_token_ttl);

    let sessions = SessionAuthority::new(directory, hasher)?
        .with_session_ttl(config.session_ttl)
        .with_role_freshness(config.role_freshness);

    let codec: Arc<dyn SessionCodec> =
        Arc::new(Hs256SessionCodec::new(config.session_secret.as_bytes()));

    Ok(AppServices {
        resets,
        sessions,
        codec,
    })
}

/// Wire services from configuration.
///
/// The reset-token store is Postgres when `DATABASE_URL` is set, in-memory
/// otherwise. The user directory is an external collaborator; the
/// in-memory stand-in here is for dev, optionally seeded with one admin
/// account.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: SharedTokenStore = match &config.database_url {
        Some(url) => Arc::new(PostgresResetTokenStore::new(PgPool::connect(url).await?)),
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory reset-token store");
            Arc::new(InMemoryResetTokenStore::new())
        }
    };

    let directory = Arc::new(InMemoryUserDirectory::new());
    seed_dev_admin(&directory, config)?;

    let delivery: SharedDelivery = Arc::new(TracingTokenDelivery);

    Ok(build_services_with(store, directory, delivery, config)?)
}

fn seed_dev_admin(directory: &InMemoryUserDirectory, config: &AppConfig) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (&config.dev_admin_email, &config.dev_admin_password)
    else {
        return Ok(());
    };

    let email = EmailAddress::parse(email)?;
    let hash = CredentialHasher::new().hash(password)?;
    let user_id = directory.insert_user(email.clone(), hash, [Role::Admin, Role::Customer]);

    tracing::info!(%user_id, %email, "seeded dev admin account");
    Ok(())
}
