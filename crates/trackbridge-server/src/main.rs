//! Trackbridge — session bridge between the fleet dashboard and the
//! third-party GPS tracking application.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

mod resolver;
mod routes;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = trackbridge_core::BridgeConfig::from_env()?;
    let port = config.port;

    info!("Upstream origin: {}", config.upstream_origin);
    info!("Bridge mounted at {}", config.mount_path);

    let state = Arc::new(AppState::new(config)?);
    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Trackbridge listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
