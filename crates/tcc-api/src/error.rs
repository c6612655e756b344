use thiserror::Error;

use crate::state::SystemMode;

/// Top-level error type for the `tcc-api` crate.
///
/// Covers every failure mode of the cloud portal and the protocol bridge:
/// login classification, session expiry, control submission, transport,
/// and the bridge's HTTP/WebSocket surface. `tcc-core` maps these into
/// its own taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// No username/password has been set on the session.
    #[error("Cloud credentials are not set")]
    CredentialsMissing,

    /// The portal reported a lockout / too-many-attempts condition.
    #[error("Login rate limited by the portal: {detail}")]
    LoginRateLimited { detail: String },

    /// The portal rejected the username/password pair.
    #[error("Login failed: invalid credentials")]
    LoginInvalidCredentials,

    /// The login response matched none of the known outcomes.
    #[error("Login failed: unexpected response (HTTP {status}) at {url}")]
    LoginUnexpectedResponse { status: u16, url: String },

    /// Session cookie expired or was revoked (HTTP 401).
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Control ─────────────────────────────────────────────────────
    /// The control endpoint answered with a non-success status.
    #[error("Control submission failed (HTTP {status}): {body}")]
    ControlSubmit { status: u16, body: String },

    /// The requested mode has no vendor code and cannot be submitted.
    #[error("System mode '{0}' cannot be submitted to the portal")]
    UnsupportedMode(SystemMode),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Failure while building the HTTP client.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Bridge ──────────────────────────────────────────────────────
    /// The protocol bridge answered with a non-success status.
    #[error("Bridge request failed (HTTP {status}): {message}")]
    Bridge { status: u16, message: String },

    /// WebSocket connection to the bridge failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON (de)serialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the portal throttled or locked out the account.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::LoginRateLimited { .. } => true,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS),
            _ => false,
        }
    }

    /// Returns `true` for connection-level failures (timeouts, refused
    /// connections, DNS) as opposed to protocol-level rejections.
    pub fn is_network(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::WebSocketConnect(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if re-authenticating might resolve the error.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns `true` if the credentials themselves are the problem.
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, Self::CredentialsMissing | Self::LoginInvalidCredentials)
    }
}
