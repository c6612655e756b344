//! CLI error types with miette diagnostics.
//!
//! Core errors are reduced to their user-facing message here; the detail
//! has already been logged where the failure happened.

use miette::Diagnostic;
use thiserror::Error;

use tcc_config::ConfigError;
use tcc_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONFIG: i32 = 4;
    pub const RATE_LIMITED: i32 = 5;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    #[diagnostic(code(tcc::config), help("Check the config file at {path}"))]
    Config { message: String, path: String },

    #[error("No cloud credentials configured")]
    #[diagnostic(
        code(tcc::no_credentials),
        help(
            "Set [credentials] username in {path}, and provide the password via\n\
             password_env, the system keyring (service \"tcc-bridge\"), or plaintext."
        )
    )]
    NoCredentials { path: String },

    // ── Cloud ────────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(tcc::auth_failed),
        help("Verify the username and password with: tcc-bridge test-credentials")
    )]
    AuthFailed { message: String },

    #[error("{message}")]
    #[diagnostic(
        code(tcc::rate_limited),
        help("The portal locks accounts after repeated logins. Wait a few minutes before retrying.")
    )]
    RateLimited { message: String },

    #[error("{message}")]
    #[diagnostic(code(tcc::connection_failed), help("Check network access to the portal."))]
    ConnectionFailed { message: String },

    #[error("{message}")]
    #[diagnostic(code(tcc::rejected), help("Run with -vv to see the portal's response."))]
    Rejected { message: String },

    #[error("No thermostat found on this account")]
    #[diagnostic(code(tcc::no_devices))]
    NoDevices,

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tcc::validation))]
    Validation { field: String, reason: String },

    // ── Runtime ──────────────────────────────────────────────────────
    #[error("Internal error: {message}")]
    #[diagnostic(code(tcc::internal))]
    Internal { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::NoCredentials { .. } => exit_code::CONFIG,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::RateLimited { .. } => exit_code::RATE_LIMITED,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

fn config_path_display() -> String {
    tcc_config::config_path().display().to_string()
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Config {
                message: format!("invalid {field}: {reason}"),
                path: config_path_display(),
            },
            ConfigError::NoCredentials | ConfigError::NoPassword { .. } => Self::NoCredentials {
                path: config_path_display(),
            },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config {
                message: other.to_string(),
                path: config_path_display(),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.user_message().to_owned();
        match err {
            CoreError::CredentialsMissing => Self::NoCredentials {
                path: config_path_display(),
            },
            CoreError::LoginInvalidCredentials
            | CoreError::LoginUnexpectedResponse { .. }
            | CoreError::SessionExpired => Self::AuthFailed { message },
            CoreError::LoginRateLimited { .. } => Self::RateLimited { message },
            CoreError::LoginNetworkError { .. } | CoreError::Network { .. } => {
                Self::ConnectionFailed { message }
            }
            CoreError::ControlSubmitFailure { .. } | CoreError::Protocol { .. } => {
                Self::Rejected { message }
            }
            CoreError::UnrecognizedCommand { action } => Self::Validation {
                field: "command".into(),
                reason: format!("unrecognized action '{action}'"),
            },
            CoreError::InvalidCommandValue { action, reason } => Self::Validation {
                field: action,
                reason,
            },
            CoreError::UnsupportedMode { mode } => Self::Validation {
                field: "mode".into(),
                reason: format!("'{mode}' cannot be set"),
            },
            CoreError::NoDevices => Self::NoDevices,
            CoreError::Config { message } => Self::Config {
                message,
                path: config_path_display(),
            },
            CoreError::Persistence { message } | CoreError::Internal(message) => {
                Self::Internal { message }
            }
        }
    }
}

impl From<tcc_api::Error> for CliError {
    fn from(err: tcc_api::Error) -> Self {
        CoreError::from(err).into()
    }
}
