// ── Inbound commands ──

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tcc_api::bridge::BridgeCommand;
use tcc_api::{DeviceId, DeviceState};

/// A change request from the bridge or an interactive caller.
///
/// `action` stays a raw string so unknown actions can be reported by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundCommand {
    pub action: String,
    pub value: Value,
    #[serde(default)]
    pub device_id: Option<DeviceId>,
    /// Push generation that caused this notification, when the bridge
    /// raised it while applying one of our own pushes.
    #[serde(default)]
    pub generation: Option<u64>,
}

impl InboundCommand {
    pub fn new(action: impl Into<String>, value: Value) -> Self {
        Self {
            action: action.into(),
            value,
            device_id: None,
            generation: None,
        }
    }

    pub fn for_device(mut self, id: DeviceId) -> Self {
        self.device_id = Some(id);
        self
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }
}

impl From<BridgeCommand> for InboundCommand {
    fn from(cmd: BridgeCommand) -> Self {
        Self {
            action: cmd.action,
            value: cmd.value,
            device_id: cmd.device_id.map(DeviceId),
            generation: cmd.generation,
        }
    }
}

/// The actions the bridge may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum CommandAction {
    #[strum(serialize = "setSystemMode")]
    SetSystemMode,
    #[strum(serialize = "setHeatingSetpoint")]
    SetHeatingSetpoint,
    #[strum(serialize = "setCoolingSetpoint")]
    SetCoolingSetpoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SetpointKind {
    Heat,
    Cool,
}

impl SetpointKind {
    /// Current value of this setpoint on `state`.
    pub fn read(self, state: &DeviceState) -> f64 {
        match self {
            Self::Heat => state.heat_setpoint,
            Self::Cool => state.cool_setpoint,
        }
    }

    /// The bridge action that changes this setpoint.
    pub fn action(self) -> CommandAction {
        match self {
            Self::Heat => CommandAction::SetHeatingSetpoint,
            Self::Cool => CommandAction::SetCoolingSetpoint,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Heat => "Heat",
            Self::Cool => "Cool",
        }
    }
}

/// Result of handling a command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// Submitted to the portal. `device` is the refetched state, if the
    /// refetch produced one.
    Applied { device: Option<DeviceState> },
    /// Recognised as an echo of one of our own pushes and dropped.
    Suppressed,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn actions_parse_by_wire_name() {
        assert_eq!(
            "setHeatingSetpoint".parse::<CommandAction>().ok(),
            Some(CommandAction::SetHeatingSetpoint)
        );
        assert!("setFanMode".parse::<CommandAction>().is_err());
        assert_eq!(CommandAction::SetSystemMode.to_string(), "setSystemMode");
    }

    #[test]
    fn bridge_commands_keep_target_and_generation() {
        let cmd: InboundCommand = BridgeCommand {
            action: "setSystemMode".into(),
            value: json!("cool"),
            device_id: Some(42),
            generation: Some(7),
        }
        .into();
        assert_eq!(cmd.device_id, Some(DeviceId(42)));
        assert_eq!(cmd.generation, Some(7));
    }
}
