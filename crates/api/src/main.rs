#[tokio::main]
async fn main() -> anyhow::Result<()> {
    storekeep_observability::init();

    let config = storekeep_api::config::AppConfig::from_env();
    let app = storekeep_api::app::build_default_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
