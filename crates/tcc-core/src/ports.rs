// ── Collaborator contracts ──
//
// The engine depends on these traits rather than on concrete clients, so
// tests can swap in fakes. Implementations for the real cloud and bridge
// clients live at the bottom of this file.

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::Value;

use tcc_api::bridge::{BridgeClient, ProtocolState};
use tcc_api::{CloudClient, DeviceId, DeviceState, SystemMode};

use crate::error::CoreError;
use crate::model::{EventSource, EventType};

/// The cloud portal operations the engine drives.
#[async_trait]
pub trait CloudApi: Send + Sync {
    fn is_authenticated(&self) -> bool;
    fn set_credentials(&self, username: String, password: SecretString);
    async fn login(&self) -> Result<(), tcc_api::Error>;
    async fn get_devices(&self) -> Result<Vec<DeviceState>, tcc_api::Error>;
    async fn get_device_data(&self, id: DeviceId) -> Result<Option<DeviceState>, tcc_api::Error>;
    async fn set_heat_setpoint(&self, id: DeviceId, temp: f64) -> Result<(), tcc_api::Error>;
    async fn set_cool_setpoint(&self, id: DeviceId, temp: f64) -> Result<(), tcc_api::Error>;
    async fn set_system_mode(&self, id: DeviceId, mode: SystemMode) -> Result<(), tcc_api::Error>;
    async fn test_connection(&self) -> Result<Vec<DeviceState>, tcc_api::Error>;
}

/// Persistence for the last known state per device and the event log.
///
/// Authoritative for change detection: the engine keeps no history of
/// its own.
pub trait StateStore: Send + Sync {
    fn save_state(&self, state: &DeviceState) -> Result<(), CoreError>;
    fn get_state(&self, id: DeviceId) -> Result<Option<DeviceState>, CoreError>;
    /// All known devices, ordered by device id.
    fn all_states(&self) -> Result<Vec<DeviceState>, CoreError>;
    fn log_event(
        &self,
        source: EventSource,
        event_type: EventType,
        message: &str,
        details: Option<Value>,
    ) -> Result<(), CoreError>;
}

/// Receiver of state pushes in protocol units.
#[async_trait]
pub trait ProtocolSink: Send + Sync {
    async fn update_state(&self, state: &ProtocolState) -> Result<(), CoreError>;
}

/// Sink used when no bridge is configured. Accepts and drops every push.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSink;

#[async_trait]
impl ProtocolSink for DisabledSink {
    async fn update_state(&self, state: &ProtocolState) -> Result<(), CoreError> {
        tracing::trace!(device_id = state.device_id, "bridge disabled, dropping push");
        Ok(())
    }
}

// ── Real clients ────────────────────────────────────────────────────

#[async_trait]
impl CloudApi for CloudClient {
    fn is_authenticated(&self) -> bool {
        CloudClient::is_authenticated(self)
    }

    fn set_credentials(&self, username: String, password: SecretString) {
        CloudClient::set_credentials(self, username, password);
    }

    async fn login(&self) -> Result<(), tcc_api::Error> {
        CloudClient::login(self).await
    }

    async fn get_devices(&self) -> Result<Vec<DeviceState>, tcc_api::Error> {
        CloudClient::get_devices(self).await
    }

    async fn get_device_data(&self, id: DeviceId) -> Result<Option<DeviceState>, tcc_api::Error> {
        CloudClient::get_device_data(self, id).await
    }

    async fn set_heat_setpoint(&self, id: DeviceId, temp: f64) -> Result<(), tcc_api::Error> {
        CloudClient::set_heat_setpoint(self, id, temp).await
    }

    async fn set_cool_setpoint(&self, id: DeviceId, temp: f64) -> Result<(), tcc_api::Error> {
        CloudClient::set_cool_setpoint(self, id, temp).await
    }

    async fn set_system_mode(&self, id: DeviceId, mode: SystemMode) -> Result<(), tcc_api::Error> {
        CloudClient::set_system_mode(self, id, mode).await
    }

    async fn test_connection(&self) -> Result<Vec<DeviceState>, tcc_api::Error> {
        CloudClient::test_connection(self).await
    }
}

#[async_trait]
impl ProtocolSink for BridgeClient {
    async fn update_state(&self, state: &ProtocolState) -> Result<(), CoreError> {
        Ok(BridgeClient::update_state(self, state).await?)
    }
}
