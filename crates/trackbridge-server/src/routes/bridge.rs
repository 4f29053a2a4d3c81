//! Bridge routes — login trigger, proxy entry, session status.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::state::AppState;
use trackbridge_session::SessionStatus;
use trackbridge_upstream::{BridgeReply, ProxiedResponse};

/// Header the host front-proxy sets to identify the authenticated user on
/// proxied navigation requests.
const USER_HEADER: &str = "x-bridge-user";

// ---------------------------------------------------------------
// Route builder
// ---------------------------------------------------------------

pub fn routes(mount: &str) -> Router<Arc<AppState>> {
    Router::new()
        // Login trigger & session management
        .route(&format!("{}/login", mount), post(login))
        .route(&format!("{}/status", mount), get(session_status))
        .route(&format!("{}/session", mount), delete(clear_session))
        // Proxy entry
        .route(mount, get(proxy_root))
        .route(&format!("{}/{{*path}}", mount), get(proxy_path))
}

// ---------------------------------------------------------------
// Query / Body types
// ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody {
    user_id: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    ok: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserQuery {
    user_id: String,
}

// ---------------------------------------------------------------
// Login & session handlers
// ---------------------------------------------------------------

async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginBody>,
) -> Json<LoginResponse> {
    let Some(username) = state.resolver.resolve(&body.user_id) else {
        warn!("Login requested for unknown user {}", body.user_id);
        return Json(LoginResponse { ok: false });
    };

    let ok = state
        .login
        .login(&body.user_id, &username, &body.password)
        .await;
    Json(LoginResponse { ok })
}

async fn session_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Json<SessionStatus> {
    Json(state.sessions.status(&query.user_id))
}

async fn clear_session(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Json<serde_json::Value> {
    if state.sessions.clear(&query.user_id) {
        Json(serde_json::json!({ "success": true }))
    } else {
        Json(serde_json::json!({ "success": true, "message": "No session to clear" }))
    }
}

// ---------------------------------------------------------------
// Proxy handlers
// ---------------------------------------------------------------

async fn proxy_root(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    proxy(state, headers, String::new(), query).await
}

async fn proxy_path(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    proxy(state, headers, path, query).await
}

async fn proxy(
    state: Arc<AppState>,
    headers: HeaderMap,
    path: String,
    query: Option<String>,
) -> Response {
    // The host front-proxy identifies the user; without it, fail closed.
    let user_id = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let Some(user_id) = user_id else {
        return reauth_redirect(&state);
    };

    let mut target = format!("/{}", path);
    if let Some(query) = query {
        target.push('?');
        target.push_str(&query);
    }

    match state.gateway.handle(&user_id, &target).await {
        BridgeReply::AuthNeeded => reauth_redirect(&state),
        BridgeReply::Upstream(proxied) => upstream_response(proxied),
        BridgeReply::UpstreamError(e) => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({
                "error": format!("Upstream unavailable: {}", e)
            })),
        )
            .into_response(),
    }
}

/// Bounce the browser to the host's re-authentication page. The query
/// marker lets the host detect the bounce and re-trigger the login flow.
fn reauth_redirect(state: &AppState) -> Response {
    let target = format!("{}?auth=needed", state.config.reauth_path);
    Redirect::temporary(&target).into_response()
}

fn upstream_response(proxied: ProxiedResponse) -> Response {
    let status = StatusCode::from_u16(proxied.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);
    if let Some(content_type) = &proxied.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    if let Some(location) = &proxied.location {
        builder = builder.header(header::LOCATION, location);
    }
    builder
        .body(Body::from(proxied.body))
        .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
}
