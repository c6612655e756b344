// Canonical device state
//
// The shape every portal response is normalized into. Values stay in the
// thermostat's native display unit; conversion to protocol units happens
// in tcc-core.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable portal identifier for a thermostat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub i64);

impl DeviceId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<i64> for DeviceId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ── System mode ─────────────────────────────────────────────────────

/// Thermostat system switch position.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SystemMode {
    Off,
    Heat,
    Cool,
    Auto,
    Emergency,
    /// A switch position the portal reported that has no known meaning.
    #[default]
    Unknown,
}

impl SystemMode {
    /// Map a vendor `SystemSwitchPosition` code. Unmapped codes become `Unknown`.
    pub fn from_vendor_code(code: i64) -> Self {
        match code {
            0 => Self::Emergency,
            1 => Self::Heat,
            2 => Self::Off,
            3 => Self::Cool,
            4 => Self::Auto,
            _ => Self::Unknown,
        }
    }

    /// The vendor code for this mode, or `None` for `Unknown`.
    pub fn vendor_code(self) -> Option<i32> {
        match self {
            Self::Emergency => Some(0),
            Self::Heat => Some(1),
            Self::Off => Some(2),
            Self::Cool => Some(3),
            Self::Auto => Some(4),
            Self::Unknown => None,
        }
    }
}

/// Unit the thermostat displays (and reports) temperatures in.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "F")]
    #[strum(serialize = "F")]
    Fahrenheit,
    #[serde(rename = "C")]
    #[strum(serialize = "C")]
    Celsius,
}

impl TemperatureUnit {
    /// Parse the portal's `DisplayUnits` field. Anything but "C" is Fahrenheit.
    pub fn from_vendor(units: Option<&str>) -> Self {
        match units.map(str::trim) {
            Some(u) if u.eq_ignore_ascii_case("c") => Self::Celsius,
            _ => Self::Fahrenheit,
        }
    }
}

// ── Equipment status ────────────────────────────────────────────────

const EQUIPMENT_HEATING: i64 = 1;
const EQUIPMENT_COOLING: i64 = 2;

/// Map a vendor `EquipmentOutputStatus` code to `(is_heating, is_cooling)`.
pub fn equipment_flags(code: i64) -> (bool, bool) {
    (code == EQUIPMENT_HEATING, code == EQUIPMENT_COOLING)
}

/// Clamp a raw humidity reading into `[0, 100]`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
pub fn clamp_humidity(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    // Clamped to the u8 range first, so the cast is exact.
    raw.round().clamp(0.0, 100.0) as u8
}

// ── DeviceState ─────────────────────────────────────────────────────

/// Canonical thermostat state, produced fresh by every successful parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub device_id: DeviceId,
    pub name: String,
    pub current_temp: f64,
    pub heat_setpoint: f64,
    pub cool_setpoint: f64,
    pub system_mode: SystemMode,
    pub humidity: u8,
    pub is_heating: bool,
    pub is_cooling: bool,
    pub display_units: TemperatureUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outdoor_temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outdoor_humidity: Option<u8>,
    #[serde(default)]
    pub fan_running: bool,
    pub updated_at: DateTime<Utc>,
}

impl DeviceState {
    /// Whether any field the change gate watches differs from `other`.
    ///
    /// Only temperature, setpoints, mode and humidity count; outdoor
    /// readings and equipment flags do not.
    #[allow(clippy::float_cmp)]
    pub fn differs_from(&self, other: &Self) -> bool {
        self.current_temp != other.current_temp
            || self.heat_setpoint != other.heat_setpoint
            || self.cool_setpoint != other.cool_setpoint
            || self.system_mode != other.system_mode
            || self.humidity != other.humidity
    }
}
