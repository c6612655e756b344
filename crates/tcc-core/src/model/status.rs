// ── Engine status snapshot ──

use chrono::{DateTime, Utc};
use serde::Serialize;

use tcc_api::DeviceState;

use crate::error::FailureKind;

/// Most recent failure seen by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastError {
    pub message: String,
    pub kind: FailureKind,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub authenticated: bool,
    pub last_poll: Option<DateTime<Utc>>,
    pub last_error: Option<LastError>,
    pub device_count: usize,
}

/// What one poll tick did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollReport {
    pub devices: Vec<DeviceState>,
    /// Devices whose state changed and was pushed to the bridge.
    pub forwarded: usize,
}
