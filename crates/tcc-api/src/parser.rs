// Response normalization
//
// The list endpoints answer with either a flat zone array or an array of
// locations holding zones. Anything else means "no data here": the
// caller moves on to the next endpoint, so nothing in this module
// returns an error.

use chrono::Utc;
use tracing::debug;

use crate::models::{DeviceDetail, LocationRecord, ZoneRecord};
use crate::state::{
    clamp_humidity, equipment_flags, DeviceId, DeviceState, SystemMode, TemperatureUnit,
};

/// Normalize a list-endpoint body into canonical states.
///
/// Tries a flat zone array first, then nested locations. The first shape
/// yielding at least one record wins; otherwise the result is empty.
pub fn parse_device_list(body: &[u8]) -> Vec<DeviceState> {
    if let Ok(zones) = serde_json::from_slice::<Vec<ZoneRecord>>(body) {
        if !zones.is_empty() {
            debug!(zones = zones.len(), "parsed flat zone array");
            return zones.into_iter().map(zone_to_state).collect();
        }
    }

    if let Ok(locations) = serde_json::from_slice::<Vec<LocationRecord>>(body) {
        let devices: Vec<DeviceState> = locations
            .into_iter()
            .flat_map(|loc| loc.zones)
            .map(zone_to_state)
            .collect();
        if !devices.is_empty() {
            debug!(zones = devices.len(), "parsed nested location array");
            return devices;
        }
    }

    Vec::new()
}

/// Normalize a detail-endpoint body. `None` when the body is not a
/// detail payload (login page, error envelope, empty object).
pub fn parse_device_detail(body: &[u8], device_id: DeviceId) -> Option<DeviceState> {
    let detail = match serde_json::from_slice::<DeviceDetail>(body) {
        Ok(d) => d,
        Err(e) => {
            debug!(%device_id, error = %e, "detail body did not decode");
            return None;
        }
    };
    let ui = detail.latest_data.ui_data;
    let (is_heating, is_cooling) = equipment_flags(ui.equipment_output_status.unwrap_or(0));

    Some(DeviceState {
        device_id,
        name: String::new(),
        current_temp: ui.disp_temperature,
        heat_setpoint: ui.heat_setpoint.unwrap_or_default(),
        cool_setpoint: ui.cool_setpoint.unwrap_or_default(),
        system_mode: ui
            .system_switch_position
            .map_or(SystemMode::Unknown, SystemMode::from_vendor_code),
        humidity: clamp_humidity(ui.indoor_humidity.unwrap_or_default()),
        is_heating,
        is_cooling,
        display_units: TemperatureUnit::from_vendor(ui.display_units.as_deref()),
        outdoor_temp: ui
            .outdoor_temperature
            .filter(|_| ui.outdoor_temperature_available != Some(false)),
        outdoor_humidity: ui
            .outdoor_humidity
            .filter(|_| ui.outdoor_humidity_available != Some(false))
            .map(clamp_humidity),
        fan_running: ui.is_fan_running.unwrap_or(false),
        updated_at: Utc::now(),
    })
}

fn zone_to_state(zone: ZoneRecord) -> DeviceState {
    let (is_heating, is_cooling) = equipment_flags(zone.equipment_output_status.unwrap_or(0));
    DeviceState {
        device_id: DeviceId(zone.device_id),
        name: zone.name.unwrap_or_default(),
        current_temp: zone.disp_temperature.unwrap_or_default(),
        heat_setpoint: zone.heat_setpoint.unwrap_or_default(),
        cool_setpoint: zone.cool_setpoint.unwrap_or_default(),
        system_mode: zone
            .system_switch_position
            .map_or(SystemMode::Unknown, SystemMode::from_vendor_code),
        humidity: clamp_humidity(zone.indoor_humidity.unwrap_or_default()),
        is_heating,
        is_cooling,
        display_units: TemperatureUnit::from_vendor(zone.display_units.as_deref()),
        outdoor_temp: None,
        outdoor_humidity: None,
        fan_running: zone.is_fan_running.unwrap_or(false),
        updated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const FLAT: &str = r#"[
        {"DeviceID": 1, "Name": "Hall", "DispTemperature": 67.0, "HeatSetpoint": 70.0,
         "CoolSetpoint": 73.0, "IndoorHumidity": 128, "SystemSwitchPosition": 1,
         "EquipmentOutputStatus": 1, "IsFanRunning": true},
        {"DeviceID": 2, "Name": "Loft", "DispTemperature": 75.5, "HeatSetpoint": 62.0,
         "CoolSetpoint": 74.0, "IndoorHumidity": 44, "SystemSwitchPosition": 3,
         "EquipmentOutputStatus": 2},
        {"DeviceID": 3, "Name": "Garage", "SystemSwitchPosition": 9}
    ]"#;

    const NESTED: &str = r#"[
        {"LocationID": 10, "Name": "Home", "Zones": [
            {"DeviceID": 11, "Name": "Down", "DispTemperature": 70.0},
            {"DeviceID": 12, "Name": "Up", "DispTemperature": 72.0}
        ]},
        {"LocationID": 20, "Name": "Cabin", "Zones": [
            {"DeviceID": 21, "Name": "Main", "DispTemperature": 55.0}
        ]},
        {"LocationID": 30, "Name": "Empty lot", "Zones": []}
    ]"#;

    #[test]
    fn flat_zone_array_yields_one_state_per_zone() {
        let devices = parse_device_list(FLAT.as_bytes());
        assert_eq!(devices.len(), 3);

        let hall = &devices[0];
        assert_eq!(hall.device_id, DeviceId(1));
        assert_eq!(hall.name, "Hall");
        assert_eq!(hall.system_mode, SystemMode::Heat);
        assert_eq!(hall.humidity, 100);
        assert!(hall.is_heating && !hall.is_cooling);
        assert!(hall.fan_running);

        assert!(devices[1].is_cooling && !devices[1].is_heating);
        assert_eq!(devices[1].system_mode, SystemMode::Cool);
        assert_eq!(devices[2].system_mode, SystemMode::Unknown);
    }

    #[test]
    fn nested_locations_flatten_all_zones() {
        let devices = parse_device_list(NESTED.as_bytes());
        let ids: Vec<i64> = devices.iter().map(|d| d.device_id.get()).collect();
        assert_eq!(ids, vec![11, 12, 21]);
    }

    #[test]
    fn unrecognized_shapes_yield_nothing() {
        for body in [
            "",
            "<html><body>Please log in</body></html>",
            r#"{"success": false}"#,
            "[]",
            r#"[{"LocationID": 1, "Zones": []}]"#,
            "[1, 2, 3]",
        ] {
            assert!(parse_device_list(body.as_bytes()).is_empty(), "body: {body}");
        }
    }

    #[test]
    fn detail_maps_ui_data() {
        let body = r#"{"success": true, "latestData": {"uiData": {
            "DispTemperature": 21.5, "HeatSetpoint": 20.0, "CoolSetpoint": 24.0,
            "IndoorHumidity": 38, "OutdoorTemperature": 4.0, "OutdoorHumidity": 80,
            "SystemSwitchPosition": 4, "EquipmentOutputStatus": 0, "IsFanRunning": false,
            "DisplayUnits": "C", "StatusHeat": 0, "StatusCool": 0, "DeviceID": 77
        }}}"#;
        let state = parse_device_detail(body.as_bytes(), DeviceId(77)).unwrap();
        assert_eq!(state.current_temp, 21.5);
        assert_eq!(state.system_mode, SystemMode::Auto);
        assert_eq!(state.display_units, TemperatureUnit::Celsius);
        assert_eq!(state.outdoor_temp, Some(4.0));
        assert_eq!(state.outdoor_humidity, Some(80));
        assert_eq!(state.humidity, 38);
    }

    #[test]
    fn detail_honors_sensor_availability() {
        let body = r#"{"latestData": {"uiData": {
            "DispTemperature": 70.0, "OutdoorTemperature": 128.0,
            "OutdoorTemperatureAvailable": false
        }}}"#;
        let state = parse_device_detail(body.as_bytes(), DeviceId(1)).unwrap();
        assert_eq!(state.outdoor_temp, None);
        assert_eq!(state.display_units, TemperatureUnit::Fahrenheit);
    }

    #[test]
    fn non_detail_bodies_are_none() {
        assert!(parse_device_detail(b"<html></html>", DeviceId(1)).is_none());
        assert!(parse_device_detail(br#"{"success": false}"#, DeviceId(1)).is_none());
    }
}
