//! Scripted login against the upstream's HTML form.
//!
//! The upstream's real field names are unknown and have varied between
//! releases, so the exchange iterates over candidate field mappings until
//! one is confirmed. A confirmed login writes the merged cookie header
//! into the session store; exhaustion leaves the store untouched.

use std::sync::Arc;

use tracing::{debug, info, warn};

use trackbridge_core::BridgeConfig;
use trackbridge_detect::{extract_token, is_login_page, token::CANONICAL_TOKEN_FIELD};
use trackbridge_session::SessionStore;

use crate::fetch::{merge_set_cookies, FetchOutcome, UpstreamClient};

/// Candidate login field mappings, tried in priority order.
const FIELD_SCHEMES: &[(&str, &str)] = &[
    ("Username", "Password"),
    ("UserName", "Password"),
    ("username", "password"),
    ("Login", "Password"),
    ("Email", "Password"),
];

/// One scripted login try. Transient; lives only for the duration of a
/// `login` call.
struct LoginAttempt<'a> {
    user_field: &'a str,
    pass_field: &'a str,
    anti_forgery_token: Option<&'a str>,
    initial_cookies: &'a [String],
}

/// Classification of the login POST response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostClass {
    /// Redirected back to the login form: this mapping failed.
    LoginRedirect,
    /// Redirected to the post-login landing path.
    LandingRedirect,
    /// Anything else; only the confirmation probe can decide.
    Ambiguous,
}

/// Classify a login POST response against the known paths.
pub fn classify_post(outcome: &FetchOutcome, login_path: &str, landing_path: &str) -> PostClass {
    if outcome.redirects_to(login_path) {
        PostClass::LoginRedirect
    } else if outcome.redirects_to(landing_path) {
        PostClass::LandingRedirect
    } else {
        PostClass::Ambiguous
    }
}

enum CandidateOutcome {
    /// Confirmed; carries the merged cookie header to store.
    Confirmed(String),
    Rejected,
}

/// Orchestrates the scripted login: fetch, extract, submit, follow,
/// confirm. The only component allowed to write the session store.
pub struct LoginService {
    config: BridgeConfig,
    client: Arc<UpstreamClient>,
    sessions: Arc<SessionStore>,
}

impl LoginService {
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

    /// Perform the scripted login for a user.
    ///
    /// Returns `true` once one candidate mapping is confirmed and the
    /// cookie header is stored. `false` means every candidate was
    /// exhausted; callers should ask the user to retry, nothing fatal
    /// happened.
    pub async fn login(&self, user_id: &str, username: &str, password: &str) -> bool {
        let login_path = self.config.login_path.clone();

        // Step 1: fetch the login form with no cookies.
        let initial = match self.client.get(&login_path, None).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Login form fetch failed: {}", e);
                return false;
            }
        };
        let token = extract_token(&initial.body_text());
        if token.is_none() {
            debug!("No anti-forgery token on login form; posting without one");
        }

        for (user_field, pass_field) in FIELD_SCHEMES {
            let attempt = LoginAttempt {
                user_field,
                pass_field,
                anti_forgery_token: token.as_deref(),
                initial_cookies: &initial.set_cookies,
            };

            match self.try_candidate(&attempt, username, password).await {
                Ok(CandidateOutcome::Confirmed(cookies)) => {
                    info!(
                        "Login confirmed for user {} via field scheme {}/{}",
                        user_id, user_field, pass_field
                    );
                    self.sessions.put(user_id, cookies);
                    return true;
                }
                Ok(CandidateOutcome::Rejected) => {
                    debug!("Field scheme {}/{} rejected", user_field, pass_field);
                }
                Err(e) => {
                    // A network failure abandons this candidate only.
                    warn!("Field scheme {}/{} aborted: {}", user_field, pass_field, e);
                }
            }
        }

        info!("Login exhausted all field schemes for user {}", user_id);
        false
    }

    async fn try_candidate(
        &self,
        attempt: &LoginAttempt<'_>,
        username: &str,
        password: &str,
    ) -> trackbridge_core::Result<CandidateOutcome> {
        let login_path = &self.config.login_path;
        let landing_path = &self.config.landing_path;

        // Step 2: POST the credentials under this candidate mapping.
        let mut form: Vec<(String, String)> = vec![
            (attempt.user_field.to_string(), username.to_string()),
            (attempt.pass_field.to_string(), password.to_string()),
            ("RememberMe".to_string(), "false".to_string()),
            ("ReturnUrl".to_string(), landing_path.clone()),
        ];
        if let Some(token) = attempt.anti_forgery_token {
            form.push((CANONICAL_TOKEN_FIELD.to_string(), token.to_string()));
        }

        let initial_cookie_header =
            merge_set_cookies(attempt.initial_cookies.iter().map(String::as_str));
        let post = self
            .client
            .post_form(login_path, Some(&initial_cookie_header), &form)
            .await?;

        // Step 3: classify the POST response.
        let class = classify_post(&post, login_path, landing_path);
        debug!(
            "POST {} -> {} ({:?}, {} cookies)",
            login_path,
            post.status,
            class,
            post.set_cookies.len()
        );
        if class == PostClass::LoginRedirect {
            return Ok(CandidateOutcome::Rejected);
        }

        // Step 4: confirm with a GET to the landing path using the merged
        // cookies. Last value wins per cookie name.
        let merged = merge_set_cookies(
            attempt
                .initial_cookies
                .iter()
                .chain(post.set_cookies.iter())
                .map(String::as_str),
        );

        match self.client.get(landing_path, Some(&merged)).await {
            Ok(confirm) => {
                let looks_login =
                    is_login_page(&confirm.body_text(), confirm.location.as_deref(), login_path);
                let status_ok = confirm.status == 200
                    || (confirm.is_redirect() && !confirm.redirects_to(login_path));
                if !looks_login && status_ok {
                    return Ok(CandidateOutcome::Confirmed(merged));
                }
            }
            Err(e) => {
                debug!("Confirmation probe failed: {}", e);
            }
        }

        // The probe was inconclusive. An unambiguous redirect to the
        // landing path is still trusted: the probe can miss a cookie only
        // usable same-request without reflecting the true login outcome.
        if class == PostClass::LandingRedirect {
            warn!("Confirmation probe inconclusive; trusting landing redirect");
            return Ok(CandidateOutcome::Confirmed(merged));
        }

        Ok(CandidateOutcome::Rejected)
    }
}
