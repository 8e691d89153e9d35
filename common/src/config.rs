use serde::{Deserialize, Serialize};

use crate::{error::ValidationError, types::ThermostatMode};

pub const TARGET_MIN_F: f32 = 60.0;
pub const TARGET_MAX_F: f32 = 84.0;
pub const HYSTERESIS_MIN_F: f32 = 0.5;
pub const HYSTERESIS_MAX_F: f32 = 5.0;
pub const OFFSET_MIN_F: i32 = 2;
pub const OFFSET_MAX_F: i32 = 10;

/// Timing and threshold constants for the control core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermostatConfig {
    pub min_cycle_ms: u64,
    pub sensor_stale_timeout_ms: u64,
    pub trend_sample_interval_ms: u64,
    pub trend_rising_threshold_f: f32,
    pub trend_falling_threshold_f: f32,
    pub trend_samples_required: u8,
    pub max_runtime_ms: u64,
    pub cooldown_duration_ms: u64,
    pub hold_duration_ms: u64,
    pub max_hold_minutes: u16,
    pub settings_save_debounce_ms: u64,
    pub min_valid_temp_f: f32,
    pub max_valid_temp_f: f32,
    pub absolute_max_temp_f: f32,
    pub power_on_settle_ms: u64,
    pub command_spacing_ms: u64,
    pub light_default_level: u8,
    /// Let Off-mode and stale-sensor shutoffs skip the minimum cycle time.
    pub safety_off_bypasses_cycle: bool,
    pub control_tick_ms: u64,
    pub dispatch_poll_ms: u64,
    pub state_publish_interval_ms: u64,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            min_cycle_ms: 300_000,
            sensor_stale_timeout_ms: 300_000,
            trend_sample_interval_ms: 30_000,
            trend_rising_threshold_f: 0.3,
            trend_falling_threshold_f: -0.2,
            trend_samples_required: 3,
            max_runtime_ms: 14_400_000,
            cooldown_duration_ms: 1_800_000,
            hold_duration_ms: 1_800_000,
            max_hold_minutes: 1_440,
            settings_save_debounce_ms: 5_000,
            min_valid_temp_f: -40.0,
            max_valid_temp_f: 150.0,
            absolute_max_temp_f: 95.0,
            power_on_settle_ms: 500,
            command_spacing_ms: 300,
            light_default_level: 4,
            safety_off_bypasses_cycle: false,
            control_tick_ms: 1_000,
            dispatch_poll_ms: 50,
            state_publish_interval_ms: 10_000,
        }
    }
}

impl ThermostatConfig {
    pub fn max_hold_ms(&self) -> u64 {
        u64::from(self.max_hold_minutes) * 60_000
    }
}

/// User-facing settings that survive a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSettings {
    pub target_temp_f: f32,
    pub hysteresis_f: f32,
    pub mode: ThermostatMode,
    pub fireplace_offset_f: i32,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self {
            target_temp_f: 70.0,
            hysteresis_f: 2.0,
            mode: ThermostatMode::Off,
            fireplace_offset_f: 4,
        }
    }
}

impl PersistedSettings {
    /// Pull loaded values back into range. Runtime setters reject instead.
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if !self.target_temp_f.is_finite() {
            self.target_temp_f = defaults.target_temp_f;
        }
        if !self.hysteresis_f.is_finite() {
            self.hysteresis_f = defaults.hysteresis_f;
        }
        self.target_temp_f = self.target_temp_f.clamp(TARGET_MIN_F, TARGET_MAX_F);
        self.hysteresis_f = self.hysteresis_f.clamp(HYSTERESIS_MIN_F, HYSTERESIS_MAX_F);

        let clamped = self.fireplace_offset_f.clamp(OFFSET_MIN_F, OFFSET_MAX_F);
        self.fireplace_offset_f = clamped - clamped % 2;
    }
}

pub fn validate_target(temp_f: f32) -> Result<f32, ValidationError> {
    if temp_f.is_finite() && (TARGET_MIN_F..=TARGET_MAX_F).contains(&temp_f) {
        Ok(temp_f)
    } else {
        Err(ValidationError::TargetOutOfRange(temp_f))
    }
}

pub fn validate_hysteresis(hysteresis_f: f32) -> Result<f32, ValidationError> {
    if hysteresis_f.is_finite() && (HYSTERESIS_MIN_F..=HYSTERESIS_MAX_F).contains(&hysteresis_f) {
        Ok(hysteresis_f)
    } else {
        Err(ValidationError::HysteresisOutOfRange(hysteresis_f))
    }
}

pub fn validate_offset(offset: i32) -> Result<i32, ValidationError> {
    if (OFFSET_MIN_F..=OFFSET_MAX_F).contains(&offset) && offset % 2 == 0 {
        Ok(offset)
    } else {
        Err(ValidationError::InvalidOffset(offset))
    }
}
