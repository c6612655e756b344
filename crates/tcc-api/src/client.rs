// Cloud portal client
//
// Facade over the session, rate limiter, poll cache, login flow and
// response parser. Every outbound request takes a limiter token first;
// device-list reads are answered from the poll cache when it is fresh.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use secrecy::SecretString;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Error;
use crate::models::ControlCommand;
use crate::parser::{parse_device_detail, parse_device_list};
use crate::session::{Session, DEFAULT_SESSION_EXPIRY};
use crate::state::{DeviceId, DeviceState, SystemMode};
use crate::throttle::{
    PollCache, TokenBucket, DEFAULT_BURST, DEFAULT_MIN_POLL_INTERVAL, DEFAULT_REFILL_INTERVAL,
};
use crate::transport::TransportConfig;

pub const DEFAULT_BASE_URL: &str = "https://mytotalconnectcomfort.com";

// ── Portal paths ────────────────────────────────────────────────────

pub(crate) const LOGIN_PATH: &str = "/portal";
const LOCATIONS_PATH: &str = "/portal/Location/GetLocationListData";
const ZONE_LIST_PATH: &str = "/portal/Device/GetZoneListData";
const DEVICE_DATA_PATH: &str = "/portal/Device/CheckDataSession";
const CONTROL_PATH: &str = "/portal/Device/SubmitControlScreenChanges";

/// List endpoints in the order they are tried.
const LIST_ENDPOINTS: [&str; 2] = [LOCATIONS_PATH, ZONE_LIST_PATH];

const LOG_BODY_LIMIT: usize = 500;
const JSON_ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";

/// Cut a response body down to something fit for a log line.
pub(crate) fn truncate_for_log(body: &str) -> String {
    match body.char_indices().nth(LOG_BODY_LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_owned(),
    }
}

// ── Configuration ───────────────────────────────────────────────────

/// Everything needed to construct a [`CloudClient`].
#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub base_url: Url,
    pub transport: TransportConfig,
    pub session_expiry: Duration,
    pub refill_interval: Duration,
    pub burst: u32,
    pub min_poll_interval: Duration,
}

impl CloudConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            transport: TransportConfig::default(),
            session_expiry: DEFAULT_SESSION_EXPIRY,
            refill_interval: DEFAULT_REFILL_INTERVAL,
            burst: DEFAULT_BURST,
            min_poll_interval: DEFAULT_MIN_POLL_INTERVAL,
        }
    }
}

// ── Client ──────────────────────────────────────────────────────────

/// Async client for the thermostat cloud portal.
///
/// Created once per process; all methods take `&self` and may run
/// concurrently from the poll loop and interactive handlers.
pub struct CloudClient {
    base_url: Url,
    session: Session,
    limiter: TokenBucket,
    cache: PollCache,
}

impl CloudClient {
    pub fn new(config: CloudConfig) -> Result<Self, Error> {
        let session = Session::new(config.transport, config.session_expiry)?;
        Ok(Self {
            base_url: config.base_url,
            session,
            limiter: TokenBucket::new(config.refill_interval, config.burst),
            cache: PollCache::new(config.min_poll_interval),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn limiter(&self) -> &TokenBucket {
        &self.limiter
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── Session passthrough ─────────────────────────────────────────

    pub fn set_credentials(&self, username: impl Into<String>, password: SecretString) {
        self.session.set_credentials(username, password);
    }

    pub fn has_credentials(&self) -> bool {
        self.session.has_credentials()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// When the device list was last fetched live, if ever (or since the
    /// last control submission).
    pub fn last_poll(&self) -> Option<Instant> {
        self.cache.last_poll()
    }

    async fn ensure_authenticated(&self) -> Result<(), Error> {
        if self.session.is_authenticated() {
            return Ok(());
        }
        debug!("session not authenticated, logging in");
        self.login().await
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// All thermostats on the account.
    ///
    /// Served from the poll cache when a non-empty list was fetched within
    /// the minimum poll interval; otherwise tries each list endpoint, then
    /// the device id remembered from login.
    pub async fn get_devices(&self) -> Result<Vec<DeviceState>, Error> {
        self.ensure_authenticated().await?;

        if let Some(cached) = self.cache.fresh() {
            debug!(devices = cached.len(), "serving device list from poll cache");
            return Ok(cached);
        }

        let http = self.session.client();
        let mut devices = Vec::new();
        let mut reached_portal = false;
        let mut transport_failure = None;

        for path in LIST_ENDPOINTS {
            let url = self.endpoint(path)?;
            self.limiter.acquire().await;

            let resp = match http
                .get(url)
                .header(ACCEPT, JSON_ACCEPT)
                .header("X-Requested-With", "XMLHttpRequest")
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    debug!(endpoint = path, error = %e, "list endpoint failed");
                    transport_failure = Some(e);
                    continue;
                }
            };

            reached_portal = true;
            let status = resp.status();
            let final_url = resp.url().to_string();
            let body = match resp.bytes().await {
                Ok(b) => b,
                Err(e) => {
                    debug!(endpoint = path, error = %e, "list body unreadable");
                    transport_failure = Some(e);
                    continue;
                }
            };
            debug!(
                endpoint = path,
                %status,
                %final_url,
                body = %truncate_for_log(&String::from_utf8_lossy(&body)),
                "list response"
            );

            if final_url.contains("Error") || final_url.contains("Login") {
                debug!(endpoint = path, "redirected to error or login page");
                continue;
            }

            devices = parse_device_list(&body);
            if !devices.is_empty() {
                debug!(endpoint = path, devices = devices.len(), "device list parsed");
                break;
            }
        }

        if devices.is_empty() {
            if let Some(id) = self.session.last_device_id() {
                debug!(device_id = %id, "list endpoints empty, fetching remembered device");
                match self.fetch_detail(id).await {
                    Ok(Some(device)) => devices.push(device),
                    Ok(None) => {}
                    Err(e) => debug!(device_id = %id, error = %e, "remembered device fetch failed"),
                }
            }
        }

        // Nothing answered at all: surface the network failure instead of
        // reporting an empty account.
        if devices.is_empty() && !reached_portal {
            if let Some(e) = transport_failure {
                return Err(Error::Transport(e));
            }
        }

        self.cache.store(devices.clone());
        self.session.refresh();
        Ok(devices)
    }

    /// Live detail for one device. `Ok(None)` when the portal answered
    /// with something that is not a detail payload.
    pub async fn get_device_data(&self, id: DeviceId) -> Result<Option<DeviceState>, Error> {
        self.ensure_authenticated().await?;
        self.fetch_detail(id).await
    }

    async fn fetch_detail(&self, id: DeviceId) -> Result<Option<DeviceState>, Error> {
        let url = self.endpoint(&format!("{DEVICE_DATA_PATH}/{id}"))?;
        self.limiter.acquire().await;

        let resp = self
            .session
            .client()
            .get(url)
            .header(ACCEPT, JSON_ACCEPT)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!(device_id = %id, "detail request unauthorized, session expired");
            self.session.mark_unauthenticated();
            return Err(Error::SessionExpired);
        }

        let body = resp.bytes().await?;
        let Some(mut device) = parse_device_detail(&body, id) else {
            debug!(
                device_id = %id,
                body = %truncate_for_log(&String::from_utf8_lossy(&body)),
                "no detail data"
            );
            return Ok(None);
        };
        if let Some(name) = self.cache.name_of(id) {
            device.name = name;
        }

        self.session.refresh();
        Ok(Some(device))
    }

    // ── Control ─────────────────────────────────────────────────────

    pub async fn set_heat_setpoint(&self, id: DeviceId, temp: f64) -> Result<(), Error> {
        self.submit_control(&ControlCommand::heat_setpoint(id, temp))
            .await
    }

    pub async fn set_cool_setpoint(&self, id: DeviceId, temp: f64) -> Result<(), Error> {
        self.submit_control(&ControlCommand::cool_setpoint(id, temp))
            .await
    }

    pub async fn set_system_mode(&self, id: DeviceId, mode: SystemMode) -> Result<(), Error> {
        self.submit_control(&ControlCommand::system_mode(id, mode)?)
            .await
    }

    /// Submit a sparse control command. Success invalidates the poll
    /// cache so the next read reflects the change.
    pub async fn submit_control(&self, command: &ControlCommand) -> Result<(), Error> {
        self.ensure_authenticated().await?;

        let url = self.endpoint(CONTROL_PATH)?;
        self.limiter.acquire().await;
        debug!(device_id = %command.device_id, ?command, "submitting control");

        let resp = self
            .session
            .client()
            .post(url)
            .header(ACCEPT, JSON_ACCEPT)
            .header(CONTENT_TYPE, "application/json")
            .json(command)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!(device_id = %command.device_id, "control request unauthorized, session expired");
            self.session.mark_unauthenticated();
            return Err(Error::SessionExpired);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(
                device_id = %command.device_id,
                status = status.as_u16(),
                body = %truncate_for_log(&body),
                "control request rejected"
            );
            return Err(Error::ControlSubmit {
                status: status.as_u16(),
                body,
            });
        }

        self.session.refresh();
        self.cache.invalidate();
        info!(device_id = %command.device_id, "control change accepted");
        Ok(())
    }

    // ── Credential check ────────────────────────────────────────────

    /// Drop the session, log in fresh and fetch the device list live, so
    /// neither a cached session nor a cached list can mask bad credentials.
    pub async fn test_connection(&self) -> Result<Vec<DeviceState>, Error> {
        self.session.clear()?;
        self.cache.invalidate();
        self.login().await?;
        self.get_devices().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(600);
        let cut = truncate_for_log(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), LOG_BODY_LIMIT + 3);
        assert_eq!(truncate_for_log("short"), "short");
    }

    #[tokio::test]
    async fn login_without_credentials_makes_no_request() {
        // Port 9 (discard) is never contacted: the check happens first.
        let url = Url::parse("http://127.0.0.1:9").unwrap();
        let client = CloudClient::new(CloudConfig::new(url)).unwrap();
        let err = client.login().await.unwrap_err();
        assert!(matches!(err, Error::CredentialsMissing));
        assert!(err.is_credential_failure());
    }

    #[test]
    fn endpoints_join_onto_base() {
        let url = Url::parse("https://portal.example.com").unwrap();
        let client = CloudClient::new(CloudConfig::new(url)).unwrap();
        assert_eq!(
            client.endpoint(CONTROL_PATH).unwrap().as_str(),
            "https://portal.example.com/portal/Device/SubmitControlScreenChanges"
        );
    }
}
