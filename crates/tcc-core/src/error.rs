// ── Core error types ──
//
// The sync engine's failure taxonomy. Consumers see login, session and
// control failures as distinct variants; transport details are folded in
// by the `From<tcc_api::Error>` impl.

use serde::Serialize;
use thiserror::Error;

use tcc_api::SystemMode;

/// Coarse classification used to tag log records and error events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    Network,
    Credentials,
    Other,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Login ────────────────────────────────────────────────────────
    #[error("Cloud credentials are not configured")]
    CredentialsMissing,

    #[error("Login rate limited by the cloud service: {detail}")]
    LoginRateLimited { detail: String },

    #[error("Login failed: invalid credentials")]
    LoginInvalidCredentials,

    #[error("Cannot reach the cloud service: {reason}")]
    LoginNetworkError { reason: String },

    #[error("Login failed: unexpected response (HTTP {status}) at {url}")]
    LoginUnexpectedResponse { status: u16, url: String },

    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Requests ─────────────────────────────────────────────────────
    #[error("Cloud request failed: {reason}")]
    Network { reason: String },

    #[error("Control change rejected (HTTP {status}): {body}")]
    ControlSubmitFailure { status: u16, body: String },

    // ── Commands ─────────────────────────────────────────────────────
    #[error("Unrecognized command: {action}")]
    UnrecognizedCommand { action: String },

    #[error("Invalid value for {action}: {reason}")]
    InvalidCommandValue { action: String, reason: String },

    #[error("Mode '{mode}' cannot be set on the thermostat")]
    UnsupportedMode { mode: SystemMode },

    #[error("No thermostat is known yet")]
    NoDevices,

    // ── Collaborators ────────────────────────────────────────────────
    #[error("State store error: {message}")]
    Persistence { message: String },

    #[error("Protocol bridge error: {message}")]
    Protocol { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Map an error raised while logging in. Transport failures become
    /// `LoginNetworkError` rather than the generic `Network`.
    pub fn from_login(err: tcc_api::Error) -> Self {
        if err.is_network() {
            return Self::LoginNetworkError {
                reason: err.to_string(),
            };
        }
        err.into()
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::LoginRateLimited { .. } => FailureKind::RateLimited,
            Self::LoginNetworkError { .. } | Self::Network { .. } => FailureKind::Network,
            Self::CredentialsMissing | Self::LoginInvalidCredentials => FailureKind::Credentials,
            _ => FailureKind::Other,
        }
    }

    /// Message safe to hand back to an interactive caller. The detailed
    /// error is logged where it occurred.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::CredentialsMissing => "Cloud credentials are not configured",
            Self::LoginInvalidCredentials => "The cloud service rejected the username or password",
            Self::LoginRateLimited { .. } => {
                "The cloud service is rate limiting logins; try again in a few minutes"
            }
            Self::LoginNetworkError { .. } | Self::Network { .. } => {
                "Cannot reach the cloud service"
            }
            Self::UnrecognizedCommand { .. }
            | Self::InvalidCommandValue { .. }
            | Self::UnsupportedMode { .. } => "The requested change is not supported",
            Self::NoDevices => "No thermostat has been discovered yet",
            _ => "The thermostat could not be updated",
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<tcc_api::Error> for CoreError {
    fn from(err: tcc_api::Error) -> Self {
        match err {
            tcc_api::Error::CredentialsMissing => Self::CredentialsMissing,
            tcc_api::Error::LoginRateLimited { detail } => Self::LoginRateLimited { detail },
            tcc_api::Error::LoginInvalidCredentials => Self::LoginInvalidCredentials,
            tcc_api::Error::LoginUnexpectedResponse { status, url } => {
                Self::LoginUnexpectedResponse { status, url }
            }
            tcc_api::Error::SessionExpired => Self::SessionExpired,
            tcc_api::Error::ControlSubmit { status, body } => {
                Self::ControlSubmitFailure { status, body }
            }
            tcc_api::Error::UnsupportedMode(mode) => Self::UnsupportedMode { mode },
            tcc_api::Error::Transport(_) if err.is_rate_limited() => Self::LoginRateLimited {
                detail: err.to_string(),
            },
            tcc_api::Error::Transport(_) => Self::Network {
                reason: err.to_string(),
            },
            tcc_api::Error::WebSocketConnect(reason) => Self::Network { reason },
            tcc_api::Error::InvalidUrl(e) => Self::Config {
                message: format!("Invalid URL: {e}"),
            },
            tcc_api::Error::Tls(message) => Self::Config { message },
            tcc_api::Error::Bridge { status, message } => Self::Protocol {
                message: format!("HTTP {status}: {message}"),
            },
            tcc_api::Error::Deserialization { message, body: _ } => {
                Self::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
