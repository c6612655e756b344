// Portal login handshake
//
// GET the login page, scrape the anti-forgery token, POST the form, then
// classify where the redirects left us. The portal has no API contract
// for any of this; the markers below are the whole of what is known.

use std::sync::OnceLock;

use regex::Regex;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::client::{truncate_for_log, CloudClient, LOGIN_PATH};
use crate::error::Error;
use crate::session::Credentials;
use crate::state::DeviceId;

// ── Scraping ────────────────────────────────────────────────────────

fn token_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"name="__RequestVerificationToken"[^>]*value="([^"]+)""#).ok())
        .as_ref()
}

fn device_id_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/Device/Control/(\d+)").ok())
        .as_ref()
}

/// Pull the `__RequestVerificationToken` hidden input out of the login page.
pub fn extract_verification_token(html: &str) -> Option<String> {
    token_regex()?
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_owned())
}

/// Device id embedded in a post-login landing URL such as
/// `/portal/Device/Control/2246437`.
pub fn extract_device_id(url: &str) -> Option<DeviceId> {
    device_id_regex()?
        .captures(url)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .map(DeviceId)
}

// ── Classification ──────────────────────────────────────────────────

/// Result of inspecting the login POST's final response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    RateLimited { detail: String },
    InvalidCredentials,
    Unexpected,
}

const LOCKOUT_URL_MARKERS: &[&str] = &["toomanyattempts", "lockout", "lockedout"];
const LOCKOUT_BODY_MARKERS: &[&str] = &["too many attempts", "too many login attempts", "account is locked"];
const INVALID_BODY_MARKERS: &[&str] = &["login failed", "invalid", "incorrect"];
const SESSION_BODY_MARKERS: &[&str] = &["LogoutLink", "SignOut", "Welcome"];

/// Whether the final URL is inside the portal proper, i.e. past the
/// login form and not on an error page.
fn landed_in_app(final_url: &str) -> bool {
    let Ok(url) = url::Url::parse(final_url) else {
        return false;
    };
    let path = url.path().trim_end_matches('/');
    path.starts_with(LOGIN_PATH)
        && path != LOGIN_PATH
        && !path.contains("Login")
        && !path.contains("/Error")
}

/// Classify a login response by final URL and body.
///
/// Lockout wins over everything else; a landing inside the portal wins
/// over body text; explicit failure markers beat the weaker session
/// markers a login page may also carry.
pub fn classify_login(status: StatusCode, final_url: &str, body: &str) -> LoginOutcome {
    let url_lower = final_url.to_ascii_lowercase();
    let body_lower = body.to_ascii_lowercase();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return LoginOutcome::RateLimited {
            detail: "HTTP 429".into(),
        };
    }
    if let Some(marker) = LOCKOUT_URL_MARKERS.iter().find(|m| url_lower.contains(*m)) {
        return LoginOutcome::RateLimited {
            detail: format!("redirected to lockout page ({marker})"),
        };
    }
    if let Some(marker) = LOCKOUT_BODY_MARKERS.iter().find(|m| body_lower.contains(*m)) {
        return LoginOutcome::RateLimited {
            detail: format!("portal reported '{marker}'"),
        };
    }

    if !status.is_success() {
        return LoginOutcome::Unexpected;
    }
    if landed_in_app(final_url) {
        return LoginOutcome::Success;
    }
    if INVALID_BODY_MARKERS.iter().any(|m| body_lower.contains(m)) {
        return LoginOutcome::InvalidCredentials;
    }
    if SESSION_BODY_MARKERS.iter().any(|m| body.contains(m)) {
        return LoginOutcome::Success;
    }
    LoginOutcome::Unexpected
}

// ── Flow ────────────────────────────────────────────────────────────

impl CloudClient {
    /// Run the form-based login handshake.
    ///
    /// Fails with `CredentialsMissing` before any network traffic when the
    /// username or password is missing. On success the session is marked
    /// authenticated and any device id in the landing URL is remembered.
    pub async fn login(&self) -> Result<(), Error> {
        let creds = self
            .session()
            .credentials()
            .filter(Credentials::is_complete)
            .ok_or(Error::CredentialsMissing)?;

        let url = self.endpoint(LOGIN_PATH)?;
        let http = self.session().client();

        self.limiter().acquire().await;
        debug!(%url, "fetching login page");
        let page = http.get(url.clone()).send().await?.text().await?;

        let token = extract_verification_token(&page);
        if token.is_none() {
            debug!("login page carries no verification token");
        }

        let mut form: Vec<(&str, &str)> = vec![
            ("UserName", creds.username.as_str()),
            ("Password", creds.password.expose_secret()),
            ("RememberMe", "false"),
        ];
        if let Some(t) = token.as_deref() {
            form.push(("__RequestVerificationToken", t));
        }

        self.limiter().acquire().await;
        let resp = http.post(url).form(&form).send().await?;

        let status = resp.status();
        let final_url = resp.url().to_string();
        let body = resp.text().await?;
        debug!(%status, %final_url, "login response");

        match classify_login(status, &final_url, &body) {
            LoginOutcome::Success => {
                if let Some(id) = extract_device_id(&final_url) {
                    debug!(device_id = %id, "device id from login redirect");
                    self.session().set_last_device_id(id);
                }
                self.session().mark_authenticated();
                info!("logged in to portal");
                Ok(())
            }
            LoginOutcome::RateLimited { detail } => {
                warn!(%detail, "login rate limited");
                Err(Error::LoginRateLimited { detail })
            }
            LoginOutcome::InvalidCredentials => {
                warn!("login rejected: invalid credentials");
                Err(Error::LoginInvalidCredentials)
            }
            LoginOutcome::Unexpected => {
                debug!(body = %truncate_for_log(&body), "unclassified login response");
                Err(Error::LoginUnexpectedResponse {
                    status: status.as_u16(),
                    url: final_url,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const BASE: &str = "https://mytotalconnectcomfort.com";

    #[test]
    fn token_is_scraped_from_hidden_input() {
        let html = r#"<form><input name="__RequestVerificationToken" type="hidden" value="abc-123_XYZ" /></form>"#;
        assert_eq!(extract_verification_token(html).as_deref(), Some("abc-123_XYZ"));
    }

    #[test]
    fn missing_token_is_tolerated() {
        assert_eq!(extract_verification_token("<form></form>"), None);
    }

    #[test]
    fn device_id_from_landing_url() {
        let url = format!("{BASE}/portal/Device/Control/2246437?page=1");
        assert_eq!(extract_device_id(&url), Some(DeviceId(2_246_437)));
        assert_eq!(extract_device_id(&format!("{BASE}/portal/")), None);
    }

    #[test]
    fn lockout_url_is_rate_limited() {
        let url = format!("{BASE}/portal/Error/TooManyAttempts");
        assert!(matches!(
            classify_login(StatusCode::OK, &url, "<html></html>"),
            LoginOutcome::RateLimited { .. }
        ));
    }

    #[test]
    fn lockout_body_is_rate_limited() {
        let url = format!("{BASE}/portal");
        assert!(matches!(
            classify_login(StatusCode::OK, &url, "You have made too many attempts. Try later."),
            LoginOutcome::RateLimited { .. }
        ));
    }

    #[test]
    fn http_429_is_rate_limited() {
        assert!(matches!(
            classify_login(StatusCode::TOO_MANY_REQUESTS, BASE, ""),
            LoginOutcome::RateLimited { .. }
        ));
    }

    #[test]
    fn invalid_marker_without_landing_is_invalid_credentials() {
        let url = format!("{BASE}/portal");
        assert_eq!(
            classify_login(StatusCode::OK, &url, "<div>Login failed. Invalid username or password.</div><a>Welcome</a>"),
            LoginOutcome::InvalidCredentials
        );
    }

    #[test]
    fn landing_inside_portal_is_success() {
        let url = format!("{BASE}/portal/Device/Control/123");
        assert_eq!(classify_login(StatusCode::OK, &url, "invalid"), LoginOutcome::Success);
        let url = format!("{BASE}/portal/Locations");
        assert_eq!(classify_login(StatusCode::OK, &url, ""), LoginOutcome::Success);
    }

    #[test]
    fn session_markers_without_landing_are_success() {
        let url = format!("{BASE}/portal");
        assert_eq!(
            classify_login(StatusCode::OK, &url, r#"<a id="LogoutLink">Log out</a>"#),
            LoginOutcome::Success
        );
    }

    #[test]
    fn error_pages_never_count_as_landing() {
        let url = format!("{BASE}/portal/Error/Unknown");
        assert_eq!(classify_login(StatusCode::OK, &url, ""), LoginOutcome::Unexpected);
        let url = format!("{BASE}/portal/Account/Login");
        assert_eq!(classify_login(StatusCode::OK, &url, ""), LoginOutcome::Unexpected);
    }

    #[test]
    fn server_errors_are_unexpected() {
        let url = format!("{BASE}/portal/Device/Control/1");
        assert_eq!(
            classify_login(StatusCode::INTERNAL_SERVER_ERROR, &url, "oops"),
            LoginOutcome::Unexpected
        );
    }
}
