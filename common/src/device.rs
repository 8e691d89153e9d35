use serde::Serialize;

use crate::error::SendError;

pub const FIREPLACE_MIN_TEMP_F: i32 = 60;
pub const FIREPLACE_MAX_TEMP_F: i32 = 80;
pub const LIGHT_MAX_LEVEL: u8 = 4;
pub const TIMER_STATES: u8 = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IrCommand {
    PowerOn,
    PowerOff,
    HeatOn,
    HeatOff,
    HeatStep(StepDirection),
    SetTemperature(i32),
    LightToggle,
    TimerToggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceState {
    #[serde(rename = "lightLevel")]
    pub light_level: u8,
    #[serde(rename = "timerState")]
    pub timer_state: u8,
    #[serde(rename = "fireplaceTempF")]
    pub fireplace_temp_f: i32,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            light_level: 0,
            timer_state: 0,
            fireplace_temp_f: 70,
        }
    }
}

impl DeviceState {
    /// Update the belief for a command that was handed to the transmitter.
    ///
    /// Returns the number of frames the command expands to; zero means the
    /// command is a no-op at the current sub-state (e.g. step up at 80°F).
    pub fn apply(&mut self, command: IrCommand, light_default_level: u8) -> u32 {
        match command {
            IrCommand::PowerOn => {
                self.light_level = light_default_level.min(LIGHT_MAX_LEVEL);
                1
            }
            IrCommand::PowerOff | IrCommand::HeatOn | IrCommand::HeatOff => 1,
            IrCommand::HeatStep(direction) => u32::from(self.step(direction)),
            IrCommand::SetTemperature(target) => {
                let target = normalize_fireplace_temp(target);
                let mut frames = 0;
                while self.fireplace_temp_f != target {
                    let direction = if self.fireplace_temp_f < target {
                        StepDirection::Up
                    } else {
                        StepDirection::Down
                    };
                    if !self.step(direction) {
                        break;
                    }
                    frames += 1;
                }
                frames
            }
            IrCommand::LightToggle => {
                self.light_level = if self.light_level == 0 {
                    LIGHT_MAX_LEVEL
                } else {
                    self.light_level - 1
                };
                1
            }
            IrCommand::TimerToggle => {
                self.timer_state = (self.timer_state + 1) % TIMER_STATES;
                1
            }
        }
    }

    pub fn timer_label(&self) -> String {
        match self.timer_state {
            0 => "OFF".to_string(),
            1 => "0.5hr".to_string(),
            n => format!("{}hr", n - 1),
        }
    }

    fn step(&mut self, direction: StepDirection) -> bool {
        match direction {
            StepDirection::Up if self.fireplace_temp_f < FIREPLACE_MAX_TEMP_F => {
                self.fireplace_temp_f += 2;
                true
            }
            StepDirection::Down if self.fireplace_temp_f > FIREPLACE_MIN_TEMP_F => {
                self.fireplace_temp_f -= 2;
                true
            }
            _ => false,
        }
    }
}

/// Fireplace setpoints are even values in 60-80°F; odd requests round up.
pub fn normalize_fireplace_temp(temp_f: i32) -> i32 {
    let clamped = temp_f.clamp(FIREPLACE_MIN_TEMP_F, FIREPLACE_MAX_TEMP_F);
    if clamped % 2 != 0 {
        clamped + 1
    } else {
        clamped
    }
}

/// Transmit side of the fireplace remote.
///
/// Every call is fire-and-forget from the engine's point of view: errors are
/// logged by the caller and never retried.
pub trait IrSender {
    fn send_power_on(&mut self) -> Result<(), SendError>;
    fn send_power_off(&mut self) -> Result<(), SendError>;
    fn send_heat_on(&mut self) -> Result<(), SendError>;
    fn send_heat_off(&mut self) -> Result<(), SendError>;
    fn send_heat_step(&mut self, direction: StepDirection) -> Result<(), SendError>;
    fn send_set_temperature(&mut self, target_f: i32) -> Result<(), SendError>;
    fn send_light_toggle(&mut self) -> Result<(), SendError>;
    fn send_timer_toggle(&mut self) -> Result<(), SendError>;

    fn device_state(&self) -> DeviceState;

    fn send(&mut self, command: IrCommand) -> Result<(), SendError> {
        match command {
            IrCommand::PowerOn => self.send_power_on(),
            IrCommand::PowerOff => self.send_power_off(),
            IrCommand::HeatOn => self.send_heat_on(),
            IrCommand::HeatOff => self.send_heat_off(),
            IrCommand::HeatStep(direction) => self.send_heat_step(direction),
            IrCommand::SetTemperature(target) => self.send_set_temperature(target),
            IrCommand::LightToggle => self.send_light_toggle(),
            IrCommand::TimerToggle => self.send_timer_toggle(),
        }
    }
}
