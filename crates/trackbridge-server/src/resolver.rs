//! User-id to upstream-username resolution.
//!
//! The host application owns its user records; the bridge only ever sees
//! an opaque user id and asks the resolver for the upstream-facing
//! username at login time. The binary seeds a static resolver from the
//! `TRACKBRIDGE_USERS` environment variable.

use std::collections::HashMap;

/// Maps an internal user id to the upstream-facing username.
pub trait UsernameResolver: Send + Sync {
    fn resolve(&self, user_id: &str) -> Option<String>;
}

/// Fixed in-memory mapping seeded from configuration.
pub struct StaticResolver {
    users: HashMap<String, String>,
}

impl StaticResolver {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            users: pairs.iter().cloned().collect(),
        }
    }
}

impl UsernameResolver for StaticResolver {
    fn resolve(&self, user_id: &str) -> Option<String> {
        self.users.get(user_id).cloned()
    }
}
