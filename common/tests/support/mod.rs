#![allow(dead_code)]

use fireplace_common::{
    DeviceState, IrCommand, IrSender, PersistedSettings, SendError, SettingsStore,
    StepDirection, StoreError, ThermostatConfig, ThermostatEngine, ThermostatMode,
};

/// Sender that records every command and tracks the device belief.
///
/// With `min_interval_ms` set it behaves like a real transmitter and refuses
/// frames closer together than that, measured on `now_ms`.
#[derive(Debug, Default)]
pub struct RecordingSender {
    pub sent: Vec<IrCommand>,
    pub device: DeviceState,
    pub now_ms: u64,
    pub min_interval_ms: u64,
    pub rejected: usize,
    last_send_ms: Option<u64>,
}

impl RecordingSender {
    pub fn paced(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            ..Self::default()
        }
    }

    pub fn count(&self, command: IrCommand) -> usize {
        self.sent.iter().filter(|sent| **sent == command).count()
    }

    fn record(&mut self, command: IrCommand) -> Result<(), SendError> {
        if let Some(last_ms) = self.last_send_ms {
            let elapsed = self.now_ms.saturating_sub(last_ms);
            if elapsed < self.min_interval_ms {
                self.rejected += 1;
                return Err(SendError::RateLimited {
                    wait_ms: self.min_interval_ms - elapsed,
                });
            }
        }
        self.device.apply(command, 4);
        self.sent.push(command);
        self.last_send_ms = Some(self.now_ms);
        Ok(())
    }
}

impl IrSender for RecordingSender {
    fn send_power_on(&mut self) -> Result<(), SendError> {
        self.record(IrCommand::PowerOn)
    }

    fn send_power_off(&mut self) -> Result<(), SendError> {
        self.record(IrCommand::PowerOff)
    }

    fn send_heat_on(&mut self) -> Result<(), SendError> {
        self.record(IrCommand::HeatOn)
    }

    fn send_heat_off(&mut self) -> Result<(), SendError> {
        self.record(IrCommand::HeatOff)
    }

    fn send_heat_step(&mut self, direction: StepDirection) -> Result<(), SendError> {
        self.record(IrCommand::HeatStep(direction))
    }

    fn send_set_temperature(&mut self, target_f: i32) -> Result<(), SendError> {
        self.record(IrCommand::SetTemperature(target_f))
    }

    fn send_light_toggle(&mut self) -> Result<(), SendError> {
        self.record(IrCommand::LightToggle)
    }

    fn send_timer_toggle(&mut self) -> Result<(), SendError> {
        self.record(IrCommand::TimerToggle)
    }

    fn device_state(&self) -> DeviceState {
        self.device
    }
}

/// In-memory store; `failures` makes the next N saves fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub saved: Vec<PersistedSettings>,
    pub failures: usize,
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<PersistedSettings, StoreError> {
        Ok(self.saved.last().cloned().unwrap_or_default())
    }

    fn save(&mut self, settings: &PersistedSettings) -> Result<(), StoreError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(StoreError::Unavailable("flash busy".to_string()));
        }
        self.saved.push(settings.clone());
        Ok(())
    }
}

pub fn heating_engine(target_f: f32, hysteresis_f: f32) -> ThermostatEngine {
    let mut engine =
        ThermostatEngine::new(ThermostatConfig::default(), PersistedSettings::default());
    engine.set_target_temp(target_f, 0).unwrap();
    engine.set_hysteresis(hysteresis_f, 0).unwrap();
    engine.set_mode(ThermostatMode::Heat, 0);
    engine
}

/// Refresh the sensor with `temp_f` and tick, every `step_ms` in `[from_ms, to_ms)`.
pub fn run_steady(
    engine: &mut ThermostatEngine,
    sender: &mut RecordingSender,
    temp_f: f32,
    from_ms: u64,
    to_ms: u64,
    step_ms: u64,
) {
    let mut now_ms = from_ms;
    while now_ms < to_ms {
        engine.update_sensor_data(temp_f, 40.0, now_ms).unwrap();
        sender.now_ms = now_ms;
        engine.tick(now_ms, sender);
        now_ms += step_ms;
    }
}

/// Poll the command queue every 50 ms in `[from_ms, to_ms)`, the way the host does.
pub fn drain_queue(
    engine: &mut ThermostatEngine,
    sender: &mut RecordingSender,
    from_ms: u64,
    to_ms: u64,
) {
    let mut now_ms = from_ms;
    while now_ms < to_ms {
        sender.now_ms = now_ms;
        engine.dispatch_due(now_ms, sender);
        now_ms += 50;
    }
}
