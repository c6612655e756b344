// Bridge wire types
//
// The bridge speaks camelCase JSON in protocol units (Celsius).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::SystemMode;

/// State pushed to `POST /state`.
///
/// `generation` identifies the push; the bridge echoes it back on any
/// command its own reactive state produced as a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolState {
    pub device_id: i64,
    pub name: String,
    pub current_temp: f64,
    pub heat_setpoint: f64,
    pub cool_setpoint: f64,
    pub system_mode: SystemMode,
    pub humidity: u8,
    pub is_heating: bool,
    pub is_cooling: bool,
    pub generation: u64,
}

/// Frame received on the `/events` WebSocket.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Command the protocol side relays from the ecosystem.
///
/// `value` stays untyped: a mode string for `setSystemMode`, a Celsius
/// number for the setpoint actions. The engine validates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeCommand {
    pub action: String,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
}

/// `GET /status` response. Unlike the state and command payloads, the
/// bridge reports status with snake_case keys (`connected_peers`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BridgeStatus {
    pub running: bool,
    pub commissioned: bool,
    pub connected_peers: u32,
    pub uptime: i64,
}
