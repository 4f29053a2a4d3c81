//! Anti-forgery token extraction.
//!
//! The upstream may or may not embed a per-page verification token in its
//! login form, and the exact markup varies between releases. Strategies are
//! tried in priority order; the first token-shaped match wins.

use once_cell::sync::Lazy;
use regex::Regex;

/// Field name the upstream has been observed to use most often.
pub const CANONICAL_TOKEN_FIELD: &str = "__RequestVerificationToken";

/// Known-equivalent token field names, compared case-insensitively.
const TOKEN_FIELD_VARIANTS: &[&str] = &[
    "__RequestVerificationToken",
    "RequestVerificationToken",
    "csrf_token",
    "_csrf",
    "authenticity_token",
];

/// Minimum length of a plausible token value.
const MIN_TOKEN_LEN: usize = 11;

// Hidden input carrying the canonical field, name before value.
static NAME_THEN_VALUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)<input[^>]*name\s*=\s*["']__RequestVerificationToken["'][^>]*value\s*=\s*["']([^"']+)["']"#,
    )
    .unwrap()
});

// Same field with the attributes in the opposite order.
static VALUE_THEN_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)<input[^>]*value\s*=\s*["']([^"']+)["'][^>]*name\s*=\s*["']__RequestVerificationToken["']"#,
    )
    .unwrap()
});

static INPUT_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<input\b[^>]*>").unwrap());
static NAME_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)name\s*=\s*["']([^"']+)["']"#).unwrap());
static VALUE_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)value\s*=\s*["']([^"']*)["']"#).unwrap());

static CANONICAL_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)__RequestVerificationToken").unwrap());
static TOKEN_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9+/=_-]{11,}").unwrap());

/// Extract an anti-forgery token value from arbitrary HTML.
///
/// Strategies, in precedence order:
/// 1. direct regex for a hidden input named `__RequestVerificationToken`,
///    in either attribute order;
/// 2. a scan of all input tags against the known field-name variants;
/// 3. a proximity search for a token-shaped value near any occurrence of
///    the canonical field name.
///
/// Returns `None` when no strategy produces a value longer than 10
/// characters. Never fails.
pub fn extract_token(html: &str) -> Option<String> {
    direct_match(html)
        .or_else(|| scan_inputs(html))
        .or_else(|| proximity_search(html))
}

fn direct_match(html: &str) -> Option<String> {
    for re in [&*NAME_THEN_VALUE_RE, &*VALUE_THEN_NAME_RE] {
        if let Some(caps) = re.captures(html) {
            let value = caps.get(1).map(|m| m.as_str().to_string())?;
            if value.len() >= MIN_TOKEN_LEN {
                return Some(value);
            }
        }
    }
    None
}

fn scan_inputs(html: &str) -> Option<String> {
    for tag in INPUT_TAG_RE.find_iter(html) {
        let tag = tag.as_str();
        let name = match NAME_ATTR_RE.captures(tag) {
            Some(caps) => caps.get(1).map(|m| m.as_str())?,
            None => continue,
        };
        if !is_token_field(name) {
            continue;
        }
        if let Some(caps) = VALUE_ATTR_RE.captures(tag) {
            let value = caps.get(1).map(|m| m.as_str())?;
            if value.len() >= MIN_TOKEN_LEN {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn proximity_search(html: &str) -> Option<String> {
    for occurrence in CANONICAL_FIELD_RE.find_iter(html) {
        let window = char_window(html, occurrence.end(), 300);
        for candidate in TOKEN_SHAPE_RE.find_iter(window) {
            let value = candidate.as_str();
            if is_token_field(value) {
                continue;
            }
            if value.len() >= MIN_TOKEN_LEN {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn is_token_field(name: &str) -> bool {
    TOKEN_FIELD_VARIANTS
        .iter()
        .any(|v| v.eq_ignore_ascii_case(name))
}

/// Slice `len` bytes starting at `start`, clamped to char boundaries.
fn char_window(text: &str, start: usize, len: usize) -> &str {
    let mut end = (start + len).min(text.len());
    while end < text.len() && !text.is_char_boundary(end) {
        end += 1;
    }
    &text[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "CfDJ8NrAkvJt5y1BqmwPZig4L7X0k3mD";

    #[test]
    fn test_name_before_value() {
        let html = format!(
            r#"<form><input name="__RequestVerificationToken" type="hidden" value="{}" /></form>"#,
            TOKEN
        );
        assert_eq!(extract_token(&html).as_deref(), Some(TOKEN));
    }

    #[test]
    fn test_value_before_name() {
        let html = format!(
            r#"<input type="hidden" value="{}" name="__RequestVerificationToken">"#,
            TOKEN
        );
        assert_eq!(extract_token(&html).as_deref(), Some(TOKEN));
    }

    #[test]
    fn test_single_quoted_attributes() {
        let html = format!(
            r#"<input name='__RequestVerificationToken' value='{}'>"#,
            TOKEN
        );
        assert_eq!(extract_token(&html).as_deref(), Some(TOKEN));
    }

    #[test]
    fn test_variant_field_name() {
        let html = format!(r#"<input name="csrf_token" value="{}">"#, TOKEN);
        assert_eq!(extract_token(&html).as_deref(), Some(TOKEN));
    }

    #[test]
    fn test_variant_case_insensitive() {
        let html = format!(r#"<input name="AUTHENTICITY_TOKEN" value="{}">"#, TOKEN);
        assert_eq!(extract_token(&html).as_deref(), Some(TOKEN));
    }

    #[test]
    fn test_proximity_fallback() {
        // Broken markup the direct strategies cannot parse.
        let html = format!(
            "var antiForgery = {{ field: '__RequestVerificationToken', data: {} }};",
            TOKEN
        );
        assert_eq!(extract_token(&html).as_deref(), Some(TOKEN));
    }

    #[test]
    fn test_direct_takes_precedence_over_scan() {
        let html = format!(
            r#"<input name="csrf_token" value="variantValue12345">
               <input name="__RequestVerificationToken" value="{}">"#,
            TOKEN
        );
        assert_eq!(extract_token(&html).as_deref(), Some(TOKEN));
    }

    #[test]
    fn test_short_value_rejected() {
        let html = r#"<input name="__RequestVerificationToken" value="short">"#;
        assert_eq!(extract_token(html), None);
    }

    #[test]
    fn test_no_token_returns_none() {
        let html = r#"<html><body><input name="Username" value=""><p>Fleet map</p></body></html>"#;
        assert_eq!(extract_token(html), None);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(extract_token(""), None);
    }
}
