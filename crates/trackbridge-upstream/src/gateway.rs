//! Per-request reverse proxy to the upstream tracking application.
//!
//! The gateway reads the session store, never writes it; only the login
//! flow creates sessions. A request without a stored session fails closed,
//! and a stale session is detected mid-flight from the upstream's own
//! login redirects and rendered login pages.

use std::sync::Arc;

use tracing::{debug, info};

use trackbridge_core::BridgeConfig;
use trackbridge_detect::is_login_page;
use trackbridge_session::SessionStore;

use crate::fetch::{FetchOutcome, UpstreamClient};
use crate::rewrite::{rewrite_html, rewrite_location};

/// Response handed back to the browser, rewritten where needed.
#[derive(Debug, Clone)]
pub struct ProxiedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    /// Rewritten redirect target, when the upstream redirected.
    pub location: Option<String>,
    pub body: Vec<u8>,
}

/// Outcome of one proxied request.
pub enum BridgeReply {
    /// No usable session; the browser must re-run the login flow.
    AuthNeeded,
    /// Upstream content, rewritten where needed.
    Upstream(ProxiedResponse),
    /// Upstream unreachable or failed mid-exchange.
    UpstreamError(String),
}

pub struct BridgeGateway {
    config: BridgeConfig,
    client: Arc<UpstreamClient>,
    sessions: Arc<SessionStore>,
}

impl BridgeGateway {
    pub fn new(
        config: BridgeConfig,
        client: Arc<UpstreamClient>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            config,
            client,
            sessions,
        }
    }

    /// Proxy one browser request to the upstream.
    ///
    /// `path_and_query` is the upstream path (with query) after the mount
    /// prefix has been stripped.
    pub async fn handle(&self, user_id: &str, path_and_query: &str) -> BridgeReply {
        // Fail closed: no session, no upstream call.
        let Some(cookie) = self.sessions.get(user_id) else {
            debug!("No session for user {}; bouncing to re-auth", user_id);
            return BridgeReply::AuthNeeded;
        };

        let path = normalize(path_and_query);
        let outcome = match self.client.get(&path, Some(&cookie)).await {
            Ok(outcome) => outcome,
            Err(e) => return BridgeReply::UpstreamError(e.to_string()),
        };

        let reply = classify_upstream(outcome, &self.config);
        if matches!(reply, BridgeReply::AuthNeeded) {
            // Stale session. The entry stays in place; a concurrent login
            // may already be replacing it.
            info!("Upstream demanded login for user {}; session stale", user_id);
        }
        reply
    }
}

/// Turn an upstream response into the reply the browser receives.
///
/// Pure with respect to the network: redirects to the login path and
/// rendered login pages bounce to re-auth, other redirects get their
/// `Location` folded into the bridge prefix, HTML bodies are rewritten,
/// and everything else passes through unmodified.
pub fn classify_upstream(outcome: FetchOutcome, config: &BridgeConfig) -> BridgeReply {
    let origin = &config.upstream_origin;
    let mount = &config.mount_path;
    let login_path = &config.login_path;

    if outcome.is_redirect() {
        if outcome.redirects_to(login_path) {
            return BridgeReply::AuthNeeded;
        }
        let location = outcome.location.clone().unwrap_or_default();
        return BridgeReply::Upstream(ProxiedResponse {
            status: outcome.status,
            content_type: outcome.content_type,
            location: Some(rewrite_location(&location, origin, mount)),
            body: outcome.body,
        });
    }

    if outcome.is_html() {
        let text = outcome.body_text();
        // The upstream sometimes renders its login page with a 200.
        if is_login_page(&text, outcome.location.as_deref(), login_path) {
            return BridgeReply::AuthNeeded;
        }
        let rewritten = rewrite_html(&text, origin, mount);
        return BridgeReply::Upstream(ProxiedResponse {
            status: outcome.status,
            content_type: outcome.content_type,
            location: None,
            body: rewritten.into_bytes(),
        });
    }

    // Non-HTML, non-redirect: pass through unmodified.
    BridgeReply::Upstream(ProxiedResponse {
        status: outcome.status,
        content_type: outcome.content_type,
        location: None,
        body: outcome.body,
    })
}

fn normalize(path_and_query: &str) -> String {
    if path_and_query.is_empty() {
        "/".to_string()
    } else if path_and_query.starts_with('/') {
        path_and_query.to_string()
    } else {
        format!("/{}", path_and_query)
    }
}
