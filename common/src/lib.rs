pub mod config;
pub mod detector;
pub mod device;
pub mod error;
pub mod hold;
pub mod persist;
pub mod queue;
pub mod safety;
pub mod schedule;
pub mod sensor;
pub mod thermostat;
pub mod topics;
pub mod types;

pub use config::{PersistedSettings, ThermostatConfig};
pub use detector::ExternalChange;
pub use device::{DeviceState, IrCommand, IrSender, StepDirection};
pub use error::{SendError, StoreError, ValidationError};
pub use hold::{HoldReason, HoldState};
pub use persist::{PendingSave, SettingsStore};
pub use schedule::{DayOfWeek, Schedule, ScheduleAction, ScheduleEntry};
pub use thermostat::ThermostatEngine;
pub use topics::*;
pub use types::{
    ControlState, ControllerStatePayload, ControllerStatus, ThermostatMode, TrendDirection,
};
