//! Login-page detection.
//!
//! The upstream sometimes renders its login page with a 200 status instead
//! of redirecting, so the bridge classifies bodies as well as redirect
//! targets. The check is deliberately permissive (an OR of weak signals):
//! proxying a login page to the browser as authenticated content is the
//! failure mode to avoid.

use once_cell::sync::Lazy;
use regex::Regex;

/// Phrases the upstream's login page has been observed to contain,
/// matched case-insensitively.
const LOGIN_PHRASES: &[&str] = &[
    "log in to your account",
    "please log in",
    "please sign in",
    "sign in to continue",
    "enter your username and password",
    "your session has expired",
];

static PASSWORD_INPUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<input[^>]*type\s*=\s*["']?password"#).unwrap());
static SUBMIT_INPUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<input\b[^>]*type\s*=\s*["']?submit[^>]*>"#).unwrap());
static BUTTON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<button\b[^>]*>(.*?)</button>").unwrap());
static LOGON_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)log\s?[io]n|sign\s?in").unwrap());

/// Decide whether a response is the upstream's login page.
///
/// True when any of the following holds:
/// - the redirect target matches the known login path,
/// - the body contains a known login-prompt phrase,
/// - the body contains both a password input and a logon-labelled submit
///   control.
pub fn is_login_page(body: &str, redirect_location: Option<&str>, login_path: &str) -> bool {
    if let Some(location) = redirect_location {
        if matches_path(location, login_path) {
            return true;
        }
    }

    let lowered = body.to_lowercase();
    if LOGIN_PHRASES.iter().any(|p| lowered.contains(p)) {
        return true;
    }

    PASSWORD_INPUT_RE.is_match(body) && has_logon_submit(body)
}

fn has_logon_submit(body: &str) -> bool {
    for tag in SUBMIT_INPUT_RE.find_iter(body) {
        if LOGON_LABEL_RE.is_match(tag.as_str()) {
            return true;
        }
    }
    for caps in BUTTON_RE.captures_iter(body) {
        if let Some(inner) = caps.get(1) {
            if LOGON_LABEL_RE.is_match(inner.as_str()) {
                return true;
            }
        }
    }
    false
}

/// Compare a redirect `Location` value against a known path.
///
/// Location values from the upstream are inconsistent: absolute URLs,
/// root-relative paths, and `~/`-style app-relative paths have all been
/// observed. Matching is done on the path component alone, ignoring the
/// query string, case-insensitively.
pub fn matches_path(location: &str, path: &str) -> bool {
    let loc = location_path(location);
    let want = path.trim_end_matches('/');
    let got = loc.trim_end_matches('/');
    if want.is_empty() {
        return got.is_empty();
    }
    got.eq_ignore_ascii_case(want)
}

/// Reduce a `Location` value to its path component.
fn location_path(location: &str) -> &str {
    let location = location.trim();
    let without_query = location
        .split_once('?')
        .map(|(p, _)| p)
        .unwrap_or(location);

    // Absolute URL: skip scheme and authority.
    if let Some(scheme_end) = without_query.find("://") {
        let after_authority = &without_query[scheme_end + 3..];
        return match after_authority.find('/') {
            Some(idx) => &after_authority[idx..],
            None => "",
        };
    }

    // App-relative (`~/...`) collapses onto the root.
    if without_query.starts_with("~/") {
        return &without_query[1..];
    }

    without_query
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_PATH: &str = "/Account/Login";

    #[test]
    fn test_redirect_to_login_path() {
        assert!(is_login_page("", Some("/Account/Login"), LOGIN_PATH));
        assert!(is_login_page(
            "",
            Some("https://gps.trackassist.net/Account/Login?ReturnUrl=%2F"),
            LOGIN_PATH
        ));
        assert!(is_login_page("", Some("~/Account/Login"), LOGIN_PATH));
    }

    #[test]
    fn test_redirect_elsewhere_is_not_login() {
        assert!(!is_login_page("", Some("/Vehicles/Map"), LOGIN_PATH));
    }

    #[test]
    fn test_login_phrase() {
        let body = "<html><body><h2>Please log in</h2></body></html>";
        assert!(is_login_page(body, None, LOGIN_PATH));
    }

    #[test]
    fn test_phrase_case_insensitive() {
        let body = "<p>SIGN IN TO CONTINUE</p>";
        assert!(is_login_page(body, None, LOGIN_PATH));
    }

    #[test]
    fn test_password_and_submit_structure() {
        let body = r#"
            <form method="post">
              <input type="text" name="Username">
              <input type="password" name="Password">
              <input type="submit" value="Log in">
            </form>"#;
        assert!(is_login_page(body, None, LOGIN_PATH));
    }

    #[test]
    fn test_password_with_logon_button() {
        let body = r#"
            <form>
              <input type="password" name="pwd">
              <button class="btn primary">Sign in</button>
            </form>"#;
        assert!(is_login_page(body, None, LOGIN_PATH));
    }

    #[test]
    fn test_password_without_logon_submit_is_not_login() {
        // Password-change form on an authenticated settings page.
        let body = r#"
            <input type="password" name="NewPassword">
            <input type="submit" value="Save changes">"#;
        assert!(!is_login_page(body, None, LOGIN_PATH));
    }

    #[test]
    fn test_ordinary_page_is_not_login() {
        let body = r#"<html><body><h1>Fleet overview</h1>
            <table><tr><td>Vehicle 12</td></tr></table></body></html>"#;
        assert!(!is_login_page(body, None, LOGIN_PATH));
    }

    #[test]
    fn test_matches_path_trailing_slash_and_case() {
        assert!(matches_path("/account/login/", "/Account/Login"));
        assert!(matches_path("/Account/Login?x=1", "/Account/Login"));
        assert!(!matches_path("/Account/LoginHelp", "/Account/Login"));
    }

    #[test]
    fn test_matches_path_absolute_without_path() {
        assert!(matches_path("https://gps.trackassist.net", "/"));
        assert!(!matches_path("https://gps.trackassist.net", "/Account/Login"));
    }
}
