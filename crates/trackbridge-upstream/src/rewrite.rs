//! Response rewriting.
//!
//! Upstream pages are written against the upstream origin; served as-is
//! they would walk the browser straight out of the bridge. Every reference
//! that could trigger navigation — markup attributes, script assignments,
//! meta refresh, redirect `Location` headers — is folded into the bridge's
//! mount path instead.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(href|src|action)(\s*=\s*)(["'])(/[^"']*)"#).unwrap()
});

// location / location.href / window.location / document.location
// assignments, and location.replace(...) calls.
static SCRIPT_NAV_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)((?:window\.|document\.|top\.)?location(?:\.href)?\s*=\s*|location\.replace\(\s*)(["'])(/[^"']*)"#,
    )
    .unwrap()
});

static META_REFRESH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(<meta[^>]*http-equiv\s*=\s*["']?refresh["']?[^>]*?url\s*=\s*)(/[^"'>\s]*)"#)
        .unwrap()
});

/// Rewrite an HTML body so all upstream references stay inside the bridge.
///
/// - absolute references to the upstream origin become bridge-relative,
///   preserving path and query;
/// - root-relative `href`/`src`/`action` values are prefixed with the
///   bridge mount path (protocol-relative `//…` values are left alone);
/// - script-based navigation assignments and meta-refresh targets are
///   rewritten the same way.
///
/// A body with no upstream references comes back unchanged.
pub fn rewrite_html(body: &str, origin: &str, mount: &str) -> String {
    // Absolute origin references first; the passes below then see them as
    // already-mounted paths and leave them alone.
    let out = body.replace(origin, mount);

    let out = ATTR_RE.replace_all(&out, |caps: &Captures| {
        match prefix_root_relative(&caps[4], mount) {
            Some(path) => format!("{}{}{}{}", &caps[1], &caps[2], &caps[3], path),
            None => caps[0].to_string(),
        }
    });

    let out = SCRIPT_NAV_RE.replace_all(&out, |caps: &Captures| {
        match prefix_root_relative(&caps[3], mount) {
            Some(path) => format!("{}{}{}", &caps[1], &caps[2], path),
            None => caps[0].to_string(),
        }
    });

    let out = META_REFRESH_RE.replace_all(&out, |caps: &Captures| {
        match prefix_root_relative(&caps[2], mount) {
            Some(path) => format!("{}{}", &caps[1], path),
            None => caps[0].to_string(),
        }
    });

    out.into_owned()
}

/// Rewrite a redirect `Location` value to stay inside the bridge.
pub fn rewrite_location(location: &str, origin: &str, mount: &str) -> String {
    if let Some(rest) = location.strip_prefix(origin) {
        if rest.is_empty() {
            return mount.to_string();
        }
        if rest.starts_with('/') || rest.starts_with('?') {
            return format!("{}{}", mount, rest);
        }
        // Origin prefix without a path boundary (e.g. a longer hostname).
        return location.to_string();
    }

    match prefix_root_relative(location, mount) {
        Some(rewritten) => rewritten,
        None => location.to_string(),
    }
}

/// Prefix a root-relative path with the mount path.
///
/// Returns `None` for values that must not be touched: non-root-relative
/// targets, protocol-relative URLs, and paths already inside the mount.
fn prefix_root_relative(path: &str, mount: &str) -> Option<String> {
    if !path.starts_with('/') || path.starts_with("//") {
        return None;
    }
    if path == mount || path.starts_with(&format!("{}/", mount)) || path.starts_with(&format!("{}?", mount)) {
        return None;
    }
    Some(format!("{}{}", mount, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://gps.trackassist.net";
    const MOUNT: &str = "/bridge";

    #[test]
    fn test_absolute_and_root_relative_converge() {
        let body = r#"<a href="/Config">a</a> <a href="https://gps.trackassist.net/Config">b</a>"#;
        let out = rewrite_html(body, ORIGIN, MOUNT);
        assert_eq!(
            out,
            r#"<a href="/bridge/Config">a</a> <a href="/bridge/Config">b</a>"#
        );
    }

    #[test]
    fn test_no_references_byte_identical() {
        let body = r#"<html><body><p>Odometer report for unit 88.</p></body></html>"#;
        assert_eq!(rewrite_html(body, ORIGIN, MOUNT), body);
    }

    #[test]
    fn test_query_preserved() {
        let body = r#"<a href="/Reports/Daily?vehicle=12&day=3">r</a>"#;
        let out = rewrite_html(body, ORIGIN, MOUNT);
        assert_eq!(out, r#"<a href="/bridge/Reports/Daily?vehicle=12&day=3">r</a>"#);
    }

    #[test]
    fn test_src_and_action() {
        let body = r#"<img src="/img/pin.png"><form action="/Vehicles/Filter">"#;
        let out = rewrite_html(body, ORIGIN, MOUNT);
        assert_eq!(
            out,
            r#"<img src="/bridge/img/pin.png"><form action="/bridge/Vehicles/Filter">"#
        );
    }

    #[test]
    fn test_protocol_relative_untouched() {
        let body = r#"<script src="//cdn.maptiles.example/lib.js"></script>"#;
        assert_eq!(rewrite_html(body, ORIGIN, MOUNT), body);
    }

    #[test]
    fn test_other_host_untouched() {
        let body = r#"<a href="https://support.example.com/help">help</a>"#;
        assert_eq!(rewrite_html(body, ORIGIN, MOUNT), body);
    }

    #[test]
    fn test_script_navigation_root_relative() {
        let body = r#"<script>window.location.href = '/Live/Map';</script>"#;
        let out = rewrite_html(body, ORIGIN, MOUNT);
        assert_eq!(out, r#"<script>window.location.href = '/bridge/Live/Map';</script>"#);
    }

    #[test]
    fn test_script_navigation_absolute() {
        let body = r#"<script>location.replace("https://gps.trackassist.net/Account/Login");</script>"#;
        let out = rewrite_html(body, ORIGIN, MOUNT);
        assert_eq!(
            out,
            r#"<script>location.replace("/bridge/Account/Login");</script>"#
        );
    }

    #[test]
    fn test_script_comparison_untouched() {
        let body = r#"<script>if (location.pathname == '/Live') { poll(); }</script>"#;
        assert_eq!(rewrite_html(body, ORIGIN, MOUNT), body);
    }

    #[test]
    fn test_meta_refresh() {
        let body = r#"<meta http-equiv="refresh" content="0;url=/Account/Login">"#;
        let out = rewrite_html(body, ORIGIN, MOUNT);
        assert_eq!(
            out,
            r#"<meta http-equiv="refresh" content="0;url=/bridge/Account/Login">"#
        );
    }

    #[test]
    fn test_no_double_prefix() {
        let body = r#"<a href="https://gps.trackassist.net/Config">x</a>"#;
        let once = rewrite_html(body, ORIGIN, MOUNT);
        assert_eq!(rewrite_html(&once, ORIGIN, MOUNT), once);
    }

    #[test]
    fn test_rewrite_location_absolute() {
        assert_eq!(
            rewrite_location("https://gps.trackassist.net/Vehicles/Map?f=2", ORIGIN, MOUNT),
            "/bridge/Vehicles/Map?f=2"
        );
        assert_eq!(rewrite_location("https://gps.trackassist.net", ORIGIN, MOUNT), "/bridge");
    }

    #[test]
    fn test_rewrite_location_root_relative() {
        assert_eq!(rewrite_location("/Vehicles/Map", ORIGIN, MOUNT), "/bridge/Vehicles/Map");
    }

    #[test]
    fn test_rewrite_location_external_unchanged() {
        assert_eq!(
            rewrite_location("https://sso.example.com/next", ORIGIN, MOUNT),
            "https://sso.example.com/next"
        );
    }

    #[test]
    fn test_rewrite_location_longer_hostname_unchanged() {
        assert_eq!(
            rewrite_location("https://gps.trackassist.net.evil.example/x", ORIGIN, MOUNT),
            "https://gps.trackassist.net.evil.example/x"
        );
    }
}
