//! Bridge configuration from environment variables.

use serde::{Deserialize, Serialize};

/// Top-level bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// HTTP server port.
    pub port: u16,
    /// The single upstream tracking origin, scheme + host, no trailing slash
    /// (e.g. `https://gps.trackassist.net`).
    pub upstream_origin: String,
    /// Path of the upstream's HTML login form.
    pub login_path: String,
    /// Path the upstream redirects to after a successful login.
    pub landing_path: String,
    /// Path prefix the bridge is mounted under in the host application.
    pub mount_path: String,
    /// Host page the browser is bounced to when re-authentication is needed.
    pub reauth_path: String,
    /// Upstream request timeout in seconds.
    pub timeout_secs: u64,
    /// Seed for the user-id → upstream-username resolver, as
    /// comma-separated `userId=username` pairs.
    pub users: Vec<(String, String)>,
}

impl BridgeConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env() -> crate::Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3004);

        let upstream_origin = std::env::var("TRACKBRIDGE_UPSTREAM_ORIGIN")
            .unwrap_or_else(|_| "https://gps.trackassist.net".to_string());
        let upstream_origin = upstream_origin.trim_end_matches('/').to_string();
        if !upstream_origin.starts_with("http://") && !upstream_origin.starts_with("https://") {
            return Err(crate::Error::Config(format!(
                "TRACKBRIDGE_UPSTREAM_ORIGIN must include a scheme: {}",
                upstream_origin
            )));
        }

        let users = std::env::var("TRACKBRIDGE_USERS")
            .map(|raw| parse_user_pairs(&raw))
            .unwrap_or_default();

        Ok(Self {
            port,
            upstream_origin,
            login_path: env_path("TRACKBRIDGE_LOGIN_PATH", "/Account/Login"),
            landing_path: env_path("TRACKBRIDGE_LANDING_PATH", "/"),
            mount_path: env_path("TRACKBRIDGE_MOUNT_PATH", "/bridge"),
            reauth_path: env_path("TRACKBRIDGE_REAUTH_PATH", "/reconnect"),
            timeout_secs: std::env::var("TRACKBRIDGE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            users,
        })
    }

    /// Absolute upstream URL for a path (path must start with `/`).
    pub fn upstream_url(&self, path: &str) -> String {
        format!("{}{}", self.upstream_origin, path)
    }
}

fn env_path(var: &str, default: &str) -> String {
    let value = std::env::var(var).unwrap_or_else(|_| default.to_string());
    if value.starts_with('/') {
        value
    } else {
        format!("/{}", value)
    }
}

fn parse_user_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let (id, name) = pair.split_once('=')?;
            let id = id.trim();
            let name = name.trim();
            if id.is_empty() || name.is_empty() {
                None
            } else {
                Some((id.to_string(), name.to_string()))
            }
        })
        .collect()
}
