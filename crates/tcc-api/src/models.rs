// Portal wire types
//
// Field names follow the portal's PascalCase JSON. Numeric readings are
// optional because the portal sends `null` for sensors a device lacks.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::state::{DeviceId, SystemMode};

// ── List endpoints ──────────────────────────────────────────────────

/// One thermostat zone as returned by the list endpoints.
///
/// `DeviceID` is required: a payload of location records does not
/// decode as zones, which is what lets the parser tell the two apart.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ZoneRecord {
    #[serde(rename = "DeviceID")]
    pub device_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub disp_temperature: Option<f64>,
    #[serde(default)]
    pub heat_setpoint: Option<f64>,
    #[serde(default)]
    pub cool_setpoint: Option<f64>,
    #[serde(default)]
    pub indoor_humidity: Option<f64>,
    #[serde(default)]
    pub system_switch_position: Option<i64>,
    #[serde(default)]
    pub equipment_output_status: Option<i64>,
    #[serde(default)]
    pub is_fan_running: Option<bool>,
    #[serde(default)]
    pub display_units: Option<String>,
}

/// A location and the zones it contains.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocationRecord {
    #[serde(rename = "LocationID", default)]
    pub location_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub zones: Vec<ZoneRecord>,
}

// ── Detail endpoint ─────────────────────────────────────────────────

/// `CheckDataSession/{id}` response: `{ latestData: { uiData: {...} } }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDetail {
    pub latest_data: LatestData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestData {
    pub ui_data: UiData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UiData {
    pub disp_temperature: f64,
    #[serde(default)]
    pub heat_setpoint: Option<f64>,
    #[serde(default)]
    pub cool_setpoint: Option<f64>,
    #[serde(default)]
    pub indoor_humidity: Option<f64>,
    #[serde(default)]
    pub outdoor_temperature: Option<f64>,
    #[serde(default)]
    pub outdoor_temperature_available: Option<bool>,
    #[serde(default)]
    pub outdoor_humidity: Option<f64>,
    #[serde(default)]
    pub outdoor_humidity_available: Option<bool>,
    #[serde(default)]
    pub system_switch_position: Option<i64>,
    #[serde(default)]
    pub equipment_output_status: Option<i64>,
    #[serde(default)]
    pub is_fan_running: Option<bool>,
    #[serde(default)]
    pub display_units: Option<String>,
    #[serde(default)]
    pub status_heat: Option<i64>,
    #[serde(default)]
    pub status_cool: Option<i64>,
    #[serde(rename = "DeviceID", default)]
    pub device_id: Option<i64>,
}

// ── Control endpoint ────────────────────────────────────────────────

/// Hold the setpoint until changed instead of following the schedule.
const STATUS_HOLD: i32 = 1;

/// Sparse body for `SubmitControlScreenChanges`.
///
/// Only the fields of a single concern are set; the rest are omitted
/// from the JSON so the portal leaves them untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ControlCommand {
    #[serde(rename = "DeviceID")]
    pub device_id: DeviceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_switch: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heat_setpoint: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cool_setpoint: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heat_next_period: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cool_next_period: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_heat: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_cool: Option<i32>,
}

impl ControlCommand {
    fn empty(device_id: DeviceId) -> Self {
        Self {
            device_id,
            system_switch: None,
            heat_setpoint: None,
            cool_setpoint: None,
            heat_next_period: None,
            cool_next_period: None,
            status_heat: None,
            status_cool: None,
        }
    }

    /// Heat setpoint with a permanent hold.
    pub fn heat_setpoint(device_id: DeviceId, temp: f64) -> Self {
        Self {
            heat_setpoint: Some(temp),
            status_heat: Some(STATUS_HOLD),
            heat_next_period: Some(0),
            ..Self::empty(device_id)
        }
    }

    /// Cool setpoint with a permanent hold.
    pub fn cool_setpoint(device_id: DeviceId, temp: f64) -> Self {
        Self {
            cool_setpoint: Some(temp),
            status_cool: Some(STATUS_HOLD),
            cool_next_period: Some(0),
            ..Self::empty(device_id)
        }
    }

    /// Mode-only change. `Unknown` has no vendor code and is refused.
    pub fn system_mode(device_id: DeviceId, mode: SystemMode) -> Result<Self, Error> {
        let code = mode.vendor_code().ok_or(Error::UnsupportedMode(mode))?;
        Ok(Self {
            system_switch: Some(code),
            ..Self::empty(device_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn heat_setpoint_sets_hold_only() {
        let cmd = ControlCommand::heat_setpoint(DeviceId(2_246_437), 69.8);
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            json!({
                "DeviceID": 2_246_437,
                "HeatSetpoint": 69.8,
                "StatusHeat": 1,
                "HeatNextPeriod": 0,
            })
        );
    }

    #[test]
    fn cool_setpoint_sets_hold_only() {
        let cmd = ControlCommand::cool_setpoint(DeviceId(5), 76.0);
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            json!({
                "DeviceID": 5,
                "CoolSetpoint": 76.0,
                "StatusCool": 1,
                "CoolNextPeriod": 0,
            })
        );
    }

    #[test]
    fn mode_change_is_sparse() {
        let cmd = ControlCommand::system_mode(DeviceId(5), SystemMode::Cool).unwrap();
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            json!({ "DeviceID": 5, "SystemSwitch": 3 })
        );
    }

    #[test]
    fn unknown_mode_is_refused() {
        let err = ControlCommand::system_mode(DeviceId(5), SystemMode::Unknown).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMode(SystemMode::Unknown)));
    }

    #[test]
    fn zone_requires_device_id() {
        let raw = r#"[{"LocationID": 9, "Name": "Home", "Zones": []}]"#;
        assert!(serde_json::from_str::<Vec<ZoneRecord>>(raw).is_err());
    }

    #[test]
    fn detail_tolerates_null_sensors() {
        let raw = r#"{"latestData":{"uiData":{
            "DispTemperature": 71.0, "HeatSetpoint": 68.0, "CoolSetpoint": null,
            "IndoorHumidity": 128, "OutdoorTemperature": null
        }}}"#;
        let detail: DeviceDetail = serde_json::from_str(raw).unwrap();
        assert_eq!(detail.latest_data.ui_data.cool_setpoint, None);
        assert_eq!(detail.latest_data.ui_data.indoor_humidity, Some(128.0));
    }
}
