//! Trackbridge Session — process-wide cookie jar store.
//!
//! Maps an internal user id to the raw upstream cookie header representing
//! that user's authenticated tracking session. In-memory only; entries live
//! until overwritten by a fresh login, explicitly cleared, or the process
//! exits.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

/// One user's upstream session.
#[derive(Debug, Clone)]
struct BridgeSession {
    cookie_header: String,
    connected_at: String,
}

/// Connection state reported to the host dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub connected: bool,
    #[serde(rename = "connectedAt", skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<String>,
}

/// Keyed store of upstream sessions, one per user, last-write-wins.
///
/// Safe for concurrent access from in-flight proxied requests; a page
/// loading several sub-resources reads the same entry simultaneously.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, BridgeSession>>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the cookie header for a user, replacing any previous session.
    pub fn put(&self, user_id: &str, cookie_header: impl Into<String>) {
        if user_id.is_empty() {
            return;
        }
        let session = BridgeSession {
            cookie_header: cookie_header.into(),
            connected_at: chrono::Utc::now().to_rfc3339(),
        };
        self.sessions.write().insert(user_id.to_string(), session);
        info!("Upstream session stored for user {}", user_id);
    }

    /// Get the stored cookie header for a user.
    pub fn get(&self, user_id: &str) -> Option<String> {
        self.sessions
            .read()
            .get(user_id)
            .map(|s| s.cookie_header.clone())
    }

    /// Remove a user's session. Returns true if an entry existed.
    pub fn clear(&self, user_id: &str) -> bool {
        let removed = self.sessions.write().remove(user_id).is_some();
        if removed {
            info!("Upstream session cleared for user {}", user_id);
        }
        removed
    }

    /// Connection state for a user.
    pub fn status(&self, user_id: &str) -> SessionStatus {
        match self.sessions.read().get(user_id) {
            Some(session) => SessionStatus {
                connected: true,
                connected_at: Some(session.connected_at.clone()),
            },
            None => SessionStatus {
                connected: false,
                connected_at: None,
            },
        }
    }
}
