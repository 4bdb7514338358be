use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use canape_relay::{
    config::AppConfig,
    routes::{self, AppState},
};

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env();
    if config.replicate_token.is_none() {
        warn!("REPLICATE_API_TOKEN is not set, generation and upload requests will fail");
    }
    info!(?config, "configuration loaded");

    let bind_address = config.bind_address();
    let state = Arc::new(AppState::new(config)?);
    let router = routes::router(state);
    let tcp_listener = tokio::net::TcpListener::bind(&bind_address).await?;

    info!("canape relay listening on http://{bind_address}");

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
