// Bridge HTTP client
//
// Plain JSON over HTTP to the local protocol bridge. No cookies, no
// rate limiting: the bridge is a sibling process on the same host.

use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use super::models::{BridgeStatus, ProtocolState};
use crate::client::truncate_for_log;
use crate::error::Error;
use crate::transport::TransportConfig;

pub const DEFAULT_BRIDGE_URL: &str = "http://localhost:5540";

/// HTTP client for the protocol bridge's control surface.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BridgeClient {
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `ws://` (or `wss://`) URL of the bridge's event stream.
    pub fn events_url(&self) -> Result<Url, Error> {
        let mut url = self.base_url.join("/events")?;
        let scheme = if self.base_url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| Error::WebSocketConnect(format!("cannot derive WebSocket URL from {}", self.base_url)))?;
        Ok(url)
    }

    /// Push one device's state. Idempotent on the bridge side.
    pub async fn update_state(&self, state: &ProtocolState) -> Result<(), Error> {
        let url = self.base_url.join("/state")?;
        debug!(
            device_id = state.device_id,
            generation = state.generation,
            current_temp = state.current_temp,
            mode = %state.system_mode,
            "pushing state to bridge"
        );

        let resp = self.http.post(url).json(state).send().await?;
        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Bridge {
                status: status.as_u16(),
                message: truncate_for_log(&body),
            });
        }
        Ok(())
    }

    /// Bridge runtime status.
    pub async fn status(&self) -> Result<BridgeStatus, Error> {
        let url = self.base_url.join("/status")?;
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Bridge {
                status: status.as_u16(),
                message: truncate_for_log(&body),
            });
        }
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}
