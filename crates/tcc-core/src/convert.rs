// ── Unit and shape conversions ──
//
// Canonical state is kept in the thermostat's display unit. The protocol
// bridge speaks Celsius, so values crossing that boundary are converted
// here and nowhere else.

use tcc_api::bridge::ProtocolState;
use tcc_api::{DeviceState, TemperatureUnit};

pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

/// The portal accepts setpoints with one decimal.
fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Express a native-unit temperature in Celsius.
pub fn native_to_protocol(value: f64, unit: TemperatureUnit) -> f64 {
    match unit {
        TemperatureUnit::Fahrenheit => fahrenheit_to_celsius(value),
        TemperatureUnit::Celsius => value,
    }
}

/// Turn a Celsius setpoint from the bridge into the value submitted to
/// the portal for a device displaying `unit`.
pub fn protocol_to_native(value: f64, unit: TemperatureUnit) -> f64 {
    match unit {
        TemperatureUnit::Fahrenheit => round_tenth(celsius_to_fahrenheit(value)),
        TemperatureUnit::Celsius => round_tenth(value),
    }
}

/// Build the bridge payload for one device, tagged with the push generation.
pub fn to_protocol_state(state: &DeviceState, generation: u64) -> ProtocolState {
    let unit = state.display_units;
    ProtocolState {
        device_id: state.device_id.get(),
        name: state.name.clone(),
        current_temp: native_to_protocol(state.current_temp, unit),
        heat_setpoint: native_to_protocol(state.heat_setpoint, unit),
        cool_setpoint: native_to_protocol(state.cool_setpoint, unit),
        system_mode: state.system_mode,
        humidity: state.humidity,
        is_heating: state.is_heating,
        is_cooling: state.is_cooling,
        generation,
    }
}
