//! Shared application state.

use std::sync::Arc;

use trackbridge_core::BridgeConfig;
use trackbridge_session::SessionStore;
use trackbridge_upstream::{BridgeGateway, LoginService, UpstreamClient};

use crate::resolver::{StaticResolver, UsernameResolver};

/// Shared application state accessible from all route handlers.
///
/// The session store is the single piece of process-wide mutable state; it
/// is injected into both the login service (the only writer) and the
/// gateway (a reader).
pub struct AppState {
    pub config: BridgeConfig,
    pub sessions: Arc<SessionStore>,
    pub login: LoginService,
    pub gateway: BridgeGateway,
    pub resolver: Arc<dyn UsernameResolver>,
}

impl AppState {
    pub fn new(config: BridgeConfig) -> trackbridge_core::Result<Self> {
        let sessions = Arc::new(SessionStore::new());
        let client = Arc::new(UpstreamClient::new(
            &config.upstream_origin,
            config.timeout_secs,
        )?);
        let resolver: Arc<dyn UsernameResolver> =
            Arc::new(StaticResolver::from_pairs(&config.users));

        let login = LoginService::new(config.clone(), client.clone(), sessions.clone());
        let gateway = BridgeGateway::new(config.clone(), client, sessions.clone());

        Ok(Self {
            config,
            sessions,
            login,
            gateway,
            resolver,
        })
    }
}
