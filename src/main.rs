//! Storefront backend server

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::app::{build_state, Components};
use storefront::config::AppConfig;
use storefront::http::router;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let components = Components::from_config(&config).await?;
    let app = router(build_state(&config, components)?);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("storefront listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
