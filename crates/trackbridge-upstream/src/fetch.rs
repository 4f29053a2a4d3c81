//! Fetch with manual redirect handling.
//!
//! Both the credential exchange and the gateway need the same thing from
//! the upstream: issue one request, never follow redirects, and hand back
//! a tagged outcome that can be classified without touching the network
//! again. This module is that single helper.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use tracing::debug;

use trackbridge_core::{Error, Result};
use trackbridge_detect::matches_path;

/// One upstream response, captured for classification.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub status: u16,
    /// Raw `Location` header, if any.
    pub location: Option<String>,
    /// Raw `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Raw `Set-Cookie` header values, in response order.
    pub set_cookies: Vec<String>,
    pub body: Vec<u8>,
}

impl FetchOutcome {
    /// Whether this is a redirect the browser would have followed.
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.location.is_some()
    }

    /// Whether this redirects to the given upstream path.
    pub fn redirects_to(&self, path: &str) -> bool {
        self.is_redirect()
            && self
                .location
                .as_deref()
                .map(|loc| matches_path(loc, path))
                .unwrap_or(false)
    }

    /// Whether the response body is HTML.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
            .unwrap_or(false)
    }

    /// Body as text. Upstream pages are not guaranteed valid UTF-8.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP client against the single upstream origin.
///
/// Redirects are never followed automatically; every caller classifies the
/// `Location` itself. All requests carry the configured bounded timeout.
pub struct UpstreamClient {
    client: reqwest::Client,
    origin: String,
}

impl UpstreamClient {
    pub fn new(origin: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
            .build()
            .map_err(|e| Error::Upstream(format!("client build failed: {}", e)))?;

        Ok(Self {
            client,
            origin: origin.trim_end_matches('/').to_string(),
        })
    }

    /// GET an upstream path (with query), optionally attaching a cookie
    /// header.
    pub async fn get(&self, path_and_query: &str, cookie: Option<&str>) -> Result<FetchOutcome> {
        let mut request = self.client.get(self.url(path_and_query));
        if let Some(cookie) = cookie.filter(|c| !c.is_empty()) {
            request = request.header(COOKIE, cookie);
        }
        self.execute(request).await
    }

    /// POST a form-encoded body to an upstream path.
    pub async fn post_form(
        &self,
        path_and_query: &str,
        cookie: Option<&str>,
        form: &[(String, String)],
    ) -> Result<FetchOutcome> {
        let mut request = self.client.post(self.url(path_and_query)).form(form);
        if let Some(cookie) = cookie.filter(|c| !c.is_empty()) {
            request = request.header(COOKIE, cookie);
        }
        self.execute(request).await
    }

    fn url(&self, path_and_query: &str) -> String {
        if path_and_query.starts_with('/') {
            format!("{}{}", self.origin, path_and_query)
        } else {
            format!("{}/{}", self.origin, path_and_query)
        }
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<FetchOutcome> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;

        let status = response.status().as_u16();
        let location = header_string(response.headers().get(LOCATION));
        let content_type = header_string(response.headers().get(CONTENT_TYPE));
        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?
            .to_vec();

        debug!(
            "upstream {} -> {} ({} bytes)",
            status,
            location.as_deref().unwrap_or("-"),
            body.len()
        );

        Ok(FetchOutcome {
            status,
            location,
            content_type,
            set_cookies,
            body,
        })
    }
}

fn header_string(value: Option<&reqwest::header::HeaderValue>) -> Option<String> {
    value.and_then(|v| v.to_str().ok()).map(str::to_string)
}

/// Merge raw `Set-Cookie` header values into one `Cookie` header.
///
/// Only the leading `name=value` pair of each header is kept; attributes
/// like `Path` and `HttpOnly` are replay noise for a single-origin bridge.
/// Order of first appearance is preserved, last value wins per name.
pub fn merge_set_cookies<'a, I>(headers: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut order: Vec<String> = Vec::new();
    let mut values: HashMap<String, String> = HashMap::new();

    for header in headers {
        let pair = header.split(';').next().unwrap_or("").trim();
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        if !values.contains_key(name) {
            order.push(name.to_string());
        }
        values.insert(name.to_string(), value.trim().to_string());
    }

    order
        .iter()
        .map(|name| format!("{}={}", name, values[name]))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: u16, location: Option<&str>) -> FetchOutcome {
        FetchOutcome {
            status,
            location: location.map(str::to_string),
            content_type: None,
            set_cookies: Vec::new(),
            body: Vec::new(),
        }
    }

    #[test]
    fn test_merge_single_cookie() {
        let merged = merge_set_cookies(["ASP.NET_SessionId=abc123; path=/; HttpOnly"]);
        assert_eq!(merged, "ASP.NET_SessionId=abc123");
    }

    #[test]
    fn test_merge_preserves_order() {
        let merged = merge_set_cookies([
            "ASP.NET_SessionId=abc; path=/",
            ".TRACKAUTH=token1; HttpOnly",
        ]);
        assert_eq!(merged, "ASP.NET_SessionId=abc; .TRACKAUTH=token1");
    }

    #[test]
    fn test_merge_last_value_wins() {
        let merged = merge_set_cookies([
            "ASP.NET_SessionId=first; path=/",
            ".TRACKAUTH=t1",
            "ASP.NET_SessionId=second",
        ]);
        assert_eq!(merged, "ASP.NET_SessionId=second; .TRACKAUTH=t1");
    }

    #[test]
    fn test_merge_skips_malformed() {
        let merged = merge_set_cookies(["notacookie", "=orphan", "good=1"]);
        assert_eq!(merged, "good=1");
    }

    #[test]
    fn test_merge_empty() {
        assert_eq!(merge_set_cookies(std::iter::empty::<&str>()), "");
    }

    #[test]
    fn test_redirects_to_relative_and_absolute() {
        assert!(outcome(302, Some("/Account/Login")).redirects_to("/Account/Login"));
        assert!(outcome(
            302,
            Some("https://gps.trackassist.net/Account/Login?ReturnUrl=%2F")
        )
        .redirects_to("/Account/Login"));
        assert!(!outcome(302, Some("/Vehicles/Map")).redirects_to("/Account/Login"));
    }

    #[test]
    fn test_status_200_is_not_redirect() {
        assert!(!outcome(200, Some("/Account/Login")).is_redirect());
        assert!(!outcome(200, Some("/Account/Login")).redirects_to("/Account/Login"));
    }

    #[test]
    fn test_redirect_without_location() {
        assert!(!outcome(302, None).is_redirect());
    }

    #[test]
    fn test_is_html() {
        let mut o = outcome(200, None);
        o.content_type = Some("text/html; charset=utf-8".into());
        assert!(o.is_html());

        o.content_type = Some("application/json".into());
        assert!(!o.is_html());

        o.content_type = None;
        assert!(!o.is_html());
    }
}
