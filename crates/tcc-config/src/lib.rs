//! Configuration for the thermostat bridge.
//!
//! A TOML file at the platform config path, overlaid with `TCC_`-prefixed
//! environment variables, resolved into the runtime types `tcc-api`
//! and `tcc-core` consume. Passwords come from an environment variable,
//! the system keyring, or plaintext, in that order.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use tcc_api::bridge::DEFAULT_BRIDGE_URL;
use tcc_api::{CloudConfig, DEFAULT_BASE_URL, TlsMode, TransportConfig};

/// Keyring service name; entries are keyed by username.
pub const KEYRING_SERVICE: &str = "tcc-bridge";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no cloud credentials configured")]
    NoCredentials,

    #[error("no password found for '{username}' (env, keyring or config)")]
    NoPassword { username: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cloud: CloudSection,

    #[serde(default)]
    pub credentials: CredentialsSection,

    #[serde(default)]
    pub bridge: BridgeSection,
}

/// `[cloud]`: the thermostat portal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CloudSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Seconds between engine poll ticks.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_session_expiry")]
    pub session_expiry_secs: u64,

    /// Device-list reads inside this window are served from cache.
    #[serde(default = "default_poll_interval")]
    pub min_poll_interval_secs: u64,

    /// PEM bundle to trust instead of the system roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    #[serde(default)]
    pub rate_limit: RateLimitSection,
}

impl Default for CloudSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval_secs: default_poll_interval(),
            timeout_secs: default_timeout(),
            session_expiry_secs: default_session_expiry(),
            min_poll_interval_secs: default_poll_interval(),
            ca_cert: None,
            rate_limit: RateLimitSection::default(),
        }
    }
}

/// `[cloud.rate_limit]`: outbound token bucket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimitSection {
    #[serde(default = "default_refill_interval")]
    pub refill_interval_secs: u64,

    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            refill_interval_secs: default_refill_interval(),
            burst: default_burst(),
        }
    }
}

/// `[credentials]`: portal login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CredentialsSection {
    pub username: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Plaintext password (prefer the keyring or `password_env`).
    pub password: Option<String>,
}

/// `[bridge]`: the local protocol bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BridgeSection {
    #[serde(default = "default_bridge_url")]
    pub url: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            url: default_bridge_url(),
            enabled: true,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}
fn default_poll_interval() -> u64 {
    600
}
fn default_timeout() -> u64 {
    30
}
fn default_session_expiry() -> u64 {
    1800
}
fn default_refill_interval() -> u64 {
    60
}
fn default_burst() -> u32 {
    5
}
fn default_bridge_url() -> String {
    DEFAULT_BRIDGE_URL.into()
}
fn default_true() -> bool {
    true
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "tcc-bridge", "tcc-bridge").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("tcc-bridge");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Loading and saving ──────────────────────────────────────────────

/// Load from the canonical path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Defaults, then `path` (if it exists), then `TCC_*` variables.
/// Nested keys use a double underscore: `TCC_CLOUD__POLL_INTERVAL_SECS`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TCC_").split("__"))
        .extract()?;
    config.validate()?;
    Ok(config)
}

/// Parse a TOML document over the defaults, without touching the
/// environment.
pub fn parse_config(toml_src: &str) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::string(toml_src))
        .extract()?;
    config.validate()?;
    Ok(config)
}

/// Write `cfg` as pretty TOML to the canonical path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

// ── Validation and translation ──────────────────────────────────────

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

fn non_zero(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_url("cloud.base_url", &self.cloud.base_url)?;
        non_zero("cloud.poll_interval_secs", self.cloud.poll_interval_secs)?;
        non_zero("cloud.timeout_secs", self.cloud.timeout_secs)?;
        non_zero("cloud.session_expiry_secs", self.cloud.session_expiry_secs)?;
        non_zero("cloud.min_poll_interval_secs", self.cloud.min_poll_interval_secs)?;
        non_zero(
            "cloud.rate_limit.refill_interval_secs",
            self.cloud.rate_limit.refill_interval_secs,
        )?;
        non_zero("cloud.rate_limit.burst", u64::from(self.cloud.rate_limit.burst))?;
        if self.bridge.enabled {
            parse_url("bridge.url", &self.bridge.url)?;
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.cloud.poll_interval_secs)
    }

    /// Transport settings shared by the portal and bridge clients.
    pub fn transport(&self) -> TransportConfig {
        let tls = self
            .cloud
            .ca_cert
            .clone()
            .map_or(TlsMode::System, TlsMode::CustomCa);
        TransportConfig {
            tls,
            timeout: Duration::from_secs(self.cloud.timeout_secs),
            ..TransportConfig::default()
        }
    }

    pub fn cloud_config(&self) -> Result<CloudConfig, ConfigError> {
        let mut cloud = CloudConfig::new(parse_url("cloud.base_url", &self.cloud.base_url)?);
        cloud.transport = self.transport();
        cloud.session_expiry = Duration::from_secs(self.cloud.session_expiry_secs);
        cloud.refill_interval = Duration::from_secs(self.cloud.rate_limit.refill_interval_secs);
        cloud.burst = self.cloud.rate_limit.burst;
        cloud.min_poll_interval = Duration::from_secs(self.cloud.min_poll_interval_secs);
        Ok(cloud)
    }

    /// Bridge base URL, or `None` when the bridge is disabled.
    pub fn bridge_url(&self) -> Result<Option<Url>, ConfigError> {
        if !self.bridge.enabled {
            return Ok(None);
        }
        parse_url("bridge.url", &self.bridge.url).map(Some)
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the portal username and password.
pub fn resolve_credentials(
    creds: &CredentialsSection,
) -> Result<(String, SecretString), ConfigError> {
    let username = creds
        .username
        .clone()
        .filter(|u| !u.trim().is_empty())
        .ok_or(ConfigError::NoCredentials)?;

    // 1. Named env var
    if let Some(ref env_name) = creds.password_env {
        if let Ok(pw) = std::env::var(env_name) {
            return Ok((username, SecretString::from(pw)));
        }
    }

    // 2. Keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &username) {
        if let Ok(pw) = entry.get_password() {
            return Ok((username, SecretString::from(pw)));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = creds.password {
        return Ok((username, SecretString::from(pw.clone())));
    }

    Err(ConfigError::NoPassword { username })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cloud.base_url, "https://mytotalconnectcomfort.com");
        assert_eq!(config.poll_interval(), Duration::from_secs(600));
        assert_eq!(config.bridge.url, "http://localhost:5540");
        assert!(config.bridge.enabled);
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse_config(
            r#"
            [cloud]
            poll_interval_secs = 300
            timeout_secs = 10

            [cloud.rate_limit]
            burst = 2

            [credentials]
            username = "me@example.com"

            [bridge]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.cloud.poll_interval_secs, 300);
        assert_eq!(config.cloud.rate_limit.burst, 2);
        assert_eq!(config.cloud.rate_limit.refill_interval_secs, 60);
        assert_eq!(config.credentials.username.as_deref(), Some("me@example.com"));
        assert_eq!(config.bridge_url().unwrap(), None);

        let cloud = config.cloud_config().unwrap();
        assert_eq!(cloud.burst, 2);
        assert_eq!(cloud.transport.timeout, Duration::from_secs(10));
        assert_eq!(cloud.min_poll_interval, Duration::from_secs(600));
    }

    #[test]
    fn invalid_values_name_the_field() {
        let err = parse_config("[cloud]\npoll_interval_secs = 0\n").unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation { ref field, .. } if field == "cloud.poll_interval_secs")
        );

        let err = parse_config("[cloud]\nbase_url = \"not a url\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "cloud.base_url"));

        let err = parse_config("[cloud.rate_limit]\nburst = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn throttle_gates_cannot_be_disabled() {
        let err = parse_config("[cloud]\nmin_poll_interval_secs = 0\n").unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation { ref field, .. } if field == "cloud.min_poll_interval_secs")
        );

        let err = parse_config("[cloud.rate_limit]\nrefill_interval_secs = 0\n").unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation { ref field, .. } if field == "cloud.rate_limit.refill_interval_secs")
        );

        let err = parse_config("[cloud]\nsession_expiry_secs = 0\n").unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation { ref field, .. } if field == "cloud.session_expiry_secs")
        );
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.credentials.username = Some("me@example.com".into());
        config.cloud.poll_interval_secs = 120;

        save_config_to(&config, &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(parse_config(&written).unwrap(), config);
    }

    #[test]
    fn credentials_need_a_username() {
        let err = resolve_credentials(&CredentialsSection::default()).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials));
    }

    #[test]
    fn plaintext_password_is_the_last_resort() {
        let creds = CredentialsSection {
            username: Some("tcc-config-test-user@example.invalid".into()),
            password_env: Some("TCC_CONFIG_TEST_UNSET_VARIABLE".into()),
            password: Some("hunter2".into()),
        };
        let (username, password) = resolve_credentials(&creds).unwrap();
        assert_eq!(username, "tcc-config-test-user@example.invalid");
        assert_eq!(password.expose_secret(), "hunter2");
    }
}
