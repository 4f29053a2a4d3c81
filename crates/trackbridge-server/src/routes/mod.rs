//! HTTP routes for the bridge surface.

pub mod bridge;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mount = state.config.mount_path.clone();
    Router::new()
        .merge(bridge::routes(&mount))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
