use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThermostatMode {
    Off,
    Heat,
}

impl ThermostatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Heat => "HEAT",
        }
    }
}

impl FromStr for ThermostatMode {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "OFF" => Ok(Self::Off),
            "HEAT" => Ok(Self::Heat),
            _ => Err(ValidationError::UnknownMode(value.to_string())),
        }
    }
}

/// Outcome of the last control evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlState {
    Idle,
    Heating,
    Satisfied,
    Hold,
    Cooldown,
}

impl ControlState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Heating => "HEATING",
            Self::Satisfied => "SATISFIED",
            Self::Hold => "HOLD",
            Self::Cooldown => "COOLDOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

impl TrendDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rising => "RISING",
            Self::Falling => "FALLING",
            Self::Stable => "STABLE",
        }
    }
}

/// Full snapshot of the engine, flattened to primitives for the API layer.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    #[serde(rename = "currentTemp")]
    pub current_temp: f32,
    #[serde(rename = "currentHumidity")]
    pub current_humidity: f32,
    #[serde(rename = "lastSensorUpdateMs")]
    pub last_sensor_update_ms: Option<u64>,
    #[serde(rename = "sensorValid")]
    pub sensor_valid: bool,
    #[serde(rename = "targetTemp")]
    pub target_temp: f32,
    pub hysteresis: f32,
    #[serde(rename = "fireplaceOffset")]
    pub fireplace_offset: i32,
    pub mode: &'static str,
    pub state: &'static str,
    #[serde(rename = "heaterOn")]
    pub heater_on: bool,
    #[serde(rename = "lastStateChangeMs")]
    pub last_state_change_ms: Option<u64>,
    #[serde(rename = "fireplaceTemp")]
    pub fireplace_temp: i32,
    #[serde(rename = "lightLevel")]
    pub light_level: u8,
    #[serde(rename = "timerState")]
    pub timer_state: u8,
    #[serde(rename = "timerString")]
    pub timer_string: String,
    #[serde(rename = "holdActive")]
    pub hold_active: bool,
    #[serde(rename = "holdRemainingMs")]
    pub hold_remaining_ms: u64,
    #[serde(rename = "holdRemainingMin")]
    pub hold_remaining_min: u64,
    #[serde(rename = "inCooldown")]
    pub in_cooldown: bool,
    #[serde(rename = "cooldownRemainingMs")]
    pub cooldown_remaining_ms: u64,
    #[serde(rename = "cooldownRemainingMin")]
    pub cooldown_remaining_min: u64,
    #[serde(rename = "runtimeMs")]
    pub runtime_ms: u64,
    #[serde(rename = "runtimeMin")]
    pub runtime_min: u64,
    #[serde(rename = "trendDirection")]
    pub trend_direction: &'static str,
    #[serde(rename = "trendSamples")]
    pub trend_samples: u8,
    #[serde(rename = "pendingCommands")]
    pub pending_commands: usize,
    #[serde(rename = "settingsDirty")]
    pub settings_dirty: bool,
}

/// Compact payload published on the controller state topic.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatePayload {
    pub temp: f32,
    pub humidity: f32,
    pub target: f32,
    pub mode: &'static str,
    pub state: &'static str,
    pub fireplace: bool,
    #[serde(rename = "holdActive")]
    pub hold_active: bool,
    #[serde(rename = "holdRemainingMin")]
    pub hold_remaining_min: u64,
    #[serde(rename = "inCooldown")]
    pub in_cooldown: bool,
    #[serde(rename = "cooldownRemainingMin")]
    pub cooldown_remaining_min: u64,
    #[serde(rename = "runtimeMin")]
    pub runtime_min: u64,
}
