//! Trackbridge Upstream — HTTP plumbing against the tracking provider.
//!
//! The upstream exposes no API, only an HTML login form and session
//! cookies. This crate performs the scripted login, proxies authenticated
//! navigation, and rewrites responses so the browser never escapes the
//! bridge's path space.

pub mod fetch;
pub mod gateway;
pub mod login;
pub mod rewrite;

pub use fetch::{merge_set_cookies, FetchOutcome, UpstreamClient};
pub use gateway::{BridgeGateway, BridgeReply, ProxiedResponse};
pub use login::LoginService;
