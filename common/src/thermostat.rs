use tracing::{debug, info, warn};

use crate::{
    config::{
        validate_hysteresis, validate_offset, validate_target, PersistedSettings, ThermostatConfig,
    },
    detector::{ExternalChange, RemoteDetector, TrendConfig},
    device::{normalize_fireplace_temp, DeviceState, IrCommand, IrSender, StepDirection},
    error::{StoreError, ValidationError},
    hold::{HoldManager, HoldReason, HoldState},
    persist::{PendingSave, SaveDebouncer, SettingsStore},
    queue::CommandQueue,
    safety::{SafetyLimits, SafetySupervisor},
    sensor::{validate_reading, SensorReading},
    types::{
        ControlState, ControllerStatePayload, ControllerStatus, ThermostatMode, TrendDirection,
    },
};

/// Single owner of all thermostat state.
///
/// The host calls [`tick`](Self::tick) on a fixed period and
/// [`dispatch_due`](Self::dispatch_due) more often to drain queued IR
/// sub-commands. Between calls the engine is a passive data holder; it never
/// sleeps or blocks.
///
/// `heater_on` is a belief, not a measurement. Its writers are the hysteresis
/// turn-on/turn-off paths, the safety trips, the manual power/heat commands and
/// the external remote detector. Each of them keeps the runtime bookkeeping in
/// step so that `heater_on` implies a heating start timestamp and vice versa.
#[derive(Debug, Clone)]
pub struct ThermostatEngine {
    pub config: ThermostatConfig,
    settings: PersistedSettings,
    sensor: SensorReading,

    state: ControlState,
    heater_on: bool,
    last_state_change_ms: Option<u64>,

    hold: HoldManager,
    safety: SafetySupervisor,
    detector: RemoteDetector,
    queue: CommandQueue,
    save: SaveDebouncer,
}

impl ThermostatEngine {
    pub fn new(config: ThermostatConfig, mut settings: PersistedSettings) -> Self {
        settings.sanitize();
        info!(
            target_f = settings.target_temp_f,
            hysteresis_f = settings.hysteresis_f,
            mode = settings.mode.as_str(),
            offset_f = settings.fireplace_offset_f,
            min_cycle_ms = config.min_cycle_ms,
            max_runtime_min = config.max_runtime_ms / 60_000,
            "thermostat engine initialized"
        );

        Self {
            hold: HoldManager::new(config.hold_duration_ms),
            safety: SafetySupervisor::new(SafetyLimits {
                max_runtime_ms: config.max_runtime_ms,
                cooldown_duration_ms: config.cooldown_duration_ms,
                absolute_max_temp_f: config.absolute_max_temp_f,
            }),
            detector: RemoteDetector::new(TrendConfig {
                sample_interval_ms: config.trend_sample_interval_ms,
                rising_threshold_f: config.trend_rising_threshold_f,
                falling_threshold_f: config.trend_falling_threshold_f,
                samples_required: config.trend_samples_required,
            }),
            queue: CommandQueue::new(),
            save: SaveDebouncer::new(config.settings_save_debounce_ms),
            config,
            settings,
            sensor: SensorReading::default(),
            state: ControlState::Idle,
            heater_on: false,
            last_state_change_ms: None,
        }
    }

    pub fn settings(&self) -> &PersistedSettings {
        &self.settings
    }

    pub fn target_temp_f(&self) -> f32 {
        self.settings.target_temp_f
    }

    pub fn hysteresis_f(&self) -> f32 {
        self.settings.hysteresis_f
    }

    pub fn mode(&self) -> ThermostatMode {
        self.settings.mode
    }

    pub fn fireplace_offset_f(&self) -> i32 {
        self.settings.fireplace_offset_f
    }

    pub fn sensor(&self) -> SensorReading {
        self.sensor
    }

    pub fn current_temp_f(&self) -> f32 {
        self.sensor.temperature_f
    }

    pub fn current_humidity(&self) -> f32 {
        self.sensor.humidity
    }

    pub fn last_sensor_update_ms(&self) -> Option<u64> {
        self.sensor.updated_ms
    }

    pub fn is_sensor_data_valid(&self, now_ms: u64) -> bool {
        self.sensor.is_valid(now_ms, self.config.sensor_stale_timeout_ms)
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn is_heater_on(&self) -> bool {
        self.heater_on
    }

    pub fn last_state_change_ms(&self) -> Option<u64> {
        self.last_state_change_ms
    }

    pub fn heating_start_ms(&self) -> Option<u64> {
        self.safety.heating_start_ms()
    }

    pub fn cooldown_start_ms(&self) -> Option<u64> {
        self.safety.cooldown_start_ms()
    }

    pub fn is_in_cooldown(&self) -> bool {
        self.safety.in_cooldown()
    }

    pub fn cooldown_remaining_ms(&self, now_ms: u64) -> u64 {
        self.safety.cooldown_remaining_ms(now_ms)
    }

    pub fn runtime_ms(&self, now_ms: u64) -> u64 {
        if self.heater_on {
            self.safety.runtime_ms(now_ms)
        } else {
            0
        }
    }

    pub fn is_in_hold(&self) -> bool {
        self.hold.is_active()
    }

    pub fn hold_state(&self) -> Option<HoldState> {
        self.hold.state()
    }

    pub fn hold_remaining_ms(&self, now_ms: u64) -> u64 {
        self.hold.remaining_ms(now_ms)
    }

    pub fn trend_direction(&self) -> TrendDirection {
        self.detector.direction()
    }

    pub fn trend_samples(&self) -> u8 {
        self.detector.consecutive_samples()
    }

    pub fn trend_baseline_f(&self) -> Option<f32> {
        self.detector.previous_temp_f()
    }

    pub fn last_trend_sample_ms(&self) -> Option<u64> {
        self.detector.last_sample_ms()
    }

    pub fn pending_commands(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn settings_dirty(&self) -> bool {
        self.save.is_pending()
    }

    pub fn update_sensor_data(
        &mut self,
        temp_f: f32,
        humidity: f32,
        now_ms: u64,
    ) -> Result<(), ValidationError> {
        validate_reading(
            temp_f,
            humidity,
            self.config.min_valid_temp_f,
            self.config.max_valid_temp_f,
        )?;
        self.sensor = SensorReading {
            temperature_f: temp_f,
            humidity,
            updated_ms: Some(now_ms),
        };
        debug!(temp_f, humidity, "sensor update");
        Ok(())
    }

    /// Humidity arriving on its own does not refresh sensor freshness.
    pub fn update_humidity(&mut self, humidity: f32) -> Result<(), ValidationError> {
        if !humidity.is_finite() {
            return Err(ValidationError::NonFiniteReading);
        }
        if !(0.0..=100.0).contains(&humidity) {
            return Err(ValidationError::HumidityOutOfRange(humidity));
        }
        self.sensor.humidity = humidity;
        Ok(())
    }

    pub fn set_target_temp(&mut self, temp_f: f32, now_ms: u64) -> Result<bool, ValidationError> {
        let temp_f = validate_target(temp_f)?;
        if (self.settings.target_temp_f - temp_f).abs() <= f32::EPSILON {
            return Ok(false);
        }
        self.settings.target_temp_f = temp_f;
        self.save.mark(now_ms);
        info!(target_f = temp_f, "target temperature set");
        Ok(true)
    }

    pub fn set_hysteresis(
        &mut self,
        hysteresis_f: f32,
        now_ms: u64,
    ) -> Result<bool, ValidationError> {
        let hysteresis_f = validate_hysteresis(hysteresis_f)?;
        if (self.settings.hysteresis_f - hysteresis_f).abs() <= f32::EPSILON {
            return Ok(false);
        }
        self.settings.hysteresis_f = hysteresis_f;
        self.save.mark(now_ms);
        info!(hysteresis_f, "hysteresis set");
        Ok(true)
    }

    pub fn set_fireplace_offset(
        &mut self,
        offset: i32,
        now_ms: u64,
    ) -> Result<bool, ValidationError> {
        let offset = validate_offset(offset)?;
        if self.settings.fireplace_offset_f == offset {
            return Ok(false);
        }
        self.settings.fireplace_offset_f = offset;
        self.save.mark(now_ms);
        info!(offset_f = offset, "fireplace offset set");
        Ok(true)
    }

    /// Switching to Off drops any hold and reports Idle at once; the heater-off
    /// itself goes out on the next tick.
    pub fn set_mode(&mut self, mode: ThermostatMode, now_ms: u64) -> bool {
        if self.settings.mode == mode {
            return false;
        }
        self.settings.mode = mode;
        self.save.mark(now_ms);
        info!(mode = mode.as_str(), "thermostat mode set");

        if mode == ThermostatMode::Off {
            self.hold.exit();
            self.state = ControlState::Idle;
        }
        true
    }

    /// Scheduled program change. Ignored while a hold is active.
    pub fn apply_schedule_action(
        &mut self,
        mode: ThermostatMode,
        target_temp_f: f32,
        now_ms: u64,
    ) -> Result<bool, ValidationError> {
        if self.is_in_hold() {
            debug!("schedule action skipped during hold");
            return Ok(false);
        }
        validate_target(target_temp_f)?;

        let mut changed = self.set_mode(mode, now_ms);
        changed |= self.set_target_temp(target_temp_f, now_ms)?;
        Ok(changed)
    }

    pub fn enter_hold(&mut self, duration_ms: Option<u64>, now_ms: u64) {
        let duration_ms = duration_ms.map(|duration| duration.min(self.config.max_hold_ms()));
        self.hold.enter(duration_ms, HoldReason::UserRequested, now_ms);
    }

    pub fn exit_hold(&mut self) -> bool {
        self.hold.exit()
    }

    /// Operator recovery: clears cooldown and the runtime counter. A heater that
    /// is still believed on restarts its runtime count from `now_ms`.
    pub fn reset_safety(&mut self, now_ms: u64) {
        self.safety.reset();
        if self.heater_on {
            self.safety.heating_started(now_ms);
        }
    }

    pub fn tick<S>(&mut self, now_ms: u64, sender: &mut S)
    where
        S: IrSender + ?Sized,
    {
        self.hold.expire(now_ms);
        self.safety.complete_cooldown_if_due(now_ms);
        self.enforce_safety_limits(now_ms, sender);
        self.detect_external_remote(now_ms);
        self.evaluate_state(now_ms);
        self.queue.dispatch_due(now_ms, sender);
    }

    pub fn dispatch_due<S>(&mut self, now_ms: u64, sender: &mut S) -> usize
    where
        S: IrSender + ?Sized,
    {
        self.queue.dispatch_due(now_ms, sender)
    }

    /// Snapshot of the settings once the debounce window has passed. The
    /// caller writes it wherever it likes and reports back through
    /// [`finish_save`](Self::finish_save).
    pub fn due_save(&self, now_ms: u64) -> Option<PendingSave> {
        if !self.save.is_due(now_ms) {
            return None;
        }
        Some(PendingSave {
            settings: self.settings.clone(),
            marked_ms: self.save.last_change_ms()?,
        })
    }

    /// A change made while the write was in flight stays pending. A failed
    /// write re-arms the debounce window.
    pub fn finish_save(
        &mut self,
        save: &PendingSave,
        result: Result<(), StoreError>,
        now_ms: u64,
    ) -> bool {
        let current = self.save.last_change_ms() == Some(save.marked_ms);
        match result {
            Ok(()) => {
                info!("settings saved");
                if current {
                    self.save.clear();
                }
                true
            }
            Err(err) => {
                warn!("settings save failed: {err}");
                if current {
                    self.save.mark(now_ms);
                }
                false
            }
        }
    }

    /// Writes settings once the debounce window has passed. A failed write
    /// stays pending and is retried after another debounce window.
    pub fn persist_if_due<T>(&mut self, now_ms: u64, store: &mut T) -> bool
    where
        T: SettingsStore + ?Sized,
    {
        let Some(pending) = self.due_save(now_ms) else {
            return false;
        };
        let result = store.save(&pending.settings);
        self.finish_save(&pending, result, now_ms)
    }

    pub fn manual_on<S>(&mut self, now_ms: u64, sender: &mut S)
    where
        S: IrSender + ?Sized,
    {
        info!("manual: fireplace on");
        self.manual_heater_command(IrCommand::PowerOn, true, now_ms, sender);
    }

    pub fn manual_off<S>(&mut self, now_ms: u64, sender: &mut S)
    where
        S: IrSender + ?Sized,
    {
        info!("manual: fireplace off");
        self.manual_heater_command(IrCommand::PowerOff, false, now_ms, sender);
    }

    pub fn manual_heat_on<S>(&mut self, now_ms: u64, sender: &mut S)
    where
        S: IrSender + ?Sized,
    {
        info!("manual: heat on");
        self.manual_heater_command(IrCommand::HeatOn, true, now_ms, sender);
    }

    pub fn manual_heat_off<S>(&mut self, now_ms: u64, sender: &mut S)
    where
        S: IrSender + ?Sized,
    {
        info!("manual: heat off");
        self.manual_heater_command(IrCommand::HeatOff, false, now_ms, sender);
    }

    pub fn manual_heat_up<S>(&mut self, now_ms: u64, sender: &mut S)
    where
        S: IrSender + ?Sized,
    {
        self.pass_through(IrCommand::HeatStep(StepDirection::Up), now_ms, sender);
    }

    pub fn manual_heat_down<S>(&mut self, now_ms: u64, sender: &mut S)
    where
        S: IrSender + ?Sized,
    {
        self.pass_through(IrCommand::HeatStep(StepDirection::Down), now_ms, sender);
    }

    pub fn manual_light_toggle<S>(&mut self, now_ms: u64, sender: &mut S)
    where
        S: IrSender + ?Sized,
    {
        self.pass_through(IrCommand::LightToggle, now_ms, sender);
    }

    pub fn manual_timer_toggle<S>(&mut self, now_ms: u64, sender: &mut S)
    where
        S: IrSender + ?Sized,
    {
        self.pass_through(IrCommand::TimerToggle, now_ms, sender);
    }

    pub fn status(&self, now_ms: u64, device: DeviceState) -> ControllerStatus {
        ControllerStatus {
            current_temp: self.sensor.temperature_f,
            current_humidity: self.sensor.humidity,
            last_sensor_update_ms: self.sensor.updated_ms,
            sensor_valid: self.is_sensor_data_valid(now_ms),
            target_temp: self.settings.target_temp_f,
            hysteresis: self.settings.hysteresis_f,
            fireplace_offset: self.settings.fireplace_offset_f,
            mode: self.settings.mode.as_str(),
            state: self.state.as_str(),
            heater_on: self.heater_on,
            last_state_change_ms: self.last_state_change_ms,
            fireplace_temp: device.fireplace_temp_f,
            light_level: device.light_level,
            timer_state: device.timer_state,
            timer_string: device.timer_label(),
            hold_active: self.is_in_hold(),
            hold_remaining_ms: self.hold_remaining_ms(now_ms),
            hold_remaining_min: self.hold_remaining_ms(now_ms) / 60_000,
            in_cooldown: self.is_in_cooldown(),
            cooldown_remaining_ms: self.cooldown_remaining_ms(now_ms),
            cooldown_remaining_min: self.cooldown_remaining_ms(now_ms) / 60_000,
            runtime_ms: self.runtime_ms(now_ms),
            runtime_min: self.runtime_ms(now_ms) / 60_000,
            trend_direction: self.detector.direction().as_str(),
            trend_samples: self.detector.consecutive_samples(),
            pending_commands: self.queue.len(),
            settings_dirty: self.save.is_pending(),
        }
    }

    pub fn state_payload(&self, now_ms: u64) -> ControllerStatePayload {
        ControllerStatePayload {
            temp: self.sensor.temperature_f,
            humidity: self.sensor.humidity,
            target: self.settings.target_temp_f,
            mode: self.settings.mode.as_str(),
            state: self.state.as_str(),
            fireplace: self.heater_on,
            hold_active: self.is_in_hold(),
            hold_remaining_min: self.hold_remaining_ms(now_ms) / 60_000,
            in_cooldown: self.is_in_cooldown(),
            cooldown_remaining_min: self.cooldown_remaining_ms(now_ms) / 60_000,
            runtime_min: self.runtime_ms(now_ms) / 60_000,
        }
    }

    fn manual_heater_command<S>(
        &mut self,
        command: IrCommand,
        on: bool,
        now_ms: u64,
        sender: &mut S,
    ) where
        S: IrSender + ?Sized,
    {
        self.queue.push_now(now_ms, command);
        self.queue.dispatch_due(now_ms, sender);

        if on && !self.heater_on {
            self.safety.heating_started(now_ms);
        } else if !on {
            self.safety.heating_stopped();
        }
        self.heater_on = on;
        self.last_state_change_ms = Some(now_ms);
        self.hold.enter(None, HoldReason::ManualOverride, now_ms);
        self.state = ControlState::Hold;
    }

    fn pass_through<S>(&mut self, command: IrCommand, now_ms: u64, sender: &mut S)
    where
        S: IrSender + ?Sized,
    {
        debug!(?command, "manual pass-through command");
        self.queue.push_now(now_ms, command);
        self.queue.dispatch_due(now_ms, sender);
    }

    fn enforce_safety_limits<S>(&mut self, now_ms: u64, sender: &mut S)
    where
        S: IrSender + ?Sized,
    {
        if self.safety.check_runtime_limit(self.heater_on, now_ms) {
            // Heat element only; power and light stay as they are.
            self.send_safety_command(IrCommand::HeatOff, now_ms, sender);
            self.heater_on = false;
            self.last_state_change_ms = Some(now_ms);
            self.state = ControlState::Cooldown;
        }

        let sensor_valid = self.is_sensor_data_valid(now_ms);
        if self
            .safety
            .check_over_temperature(self.heater_on, sensor_valid, self.sensor.temperature_f)
        {
            self.send_safety_command(IrCommand::PowerOff, now_ms, sender);
            self.heater_on = false;
            self.safety.heating_stopped();
            self.last_state_change_ms = Some(now_ms);
            self.state = ControlState::Idle;
        }
    }

    /// Safety commands jump the queue and are never dropped: a rate-limited
    /// frame stays at the head until the sender accepts it.
    fn send_safety_command<S>(&mut self, command: IrCommand, now_ms: u64, sender: &mut S)
    where
        S: IrSender + ?Sized,
    {
        let discarded = self.queue.preempt(now_ms, command);
        if discarded > 0 {
            warn!(discarded, ?command, "pending ir commands dropped for safety shutoff");
        }
        self.queue.dispatch_due(now_ms, sender);
    }

    fn detect_external_remote(&mut self, now_ms: u64) {
        let reading = self
            .is_sensor_data_valid(now_ms)
            .then_some(self.sensor.temperature_f);

        match self.detector.observe(reading, self.heater_on, now_ms) {
            Some(ExternalChange::TurnedOn) => {
                self.heater_on = true;
                self.safety.heating_started(now_ms);
                self.hold.enter(None, HoldReason::ExternalRemote, now_ms);
            }
            Some(ExternalChange::TurnedOff) => {
                self.heater_on = false;
                self.safety.heating_stopped();
                self.hold.enter(None, HoldReason::ExternalRemote, now_ms);
            }
            None => {}
        }
    }

    fn evaluate_state(&mut self, now_ms: u64) {
        if self.settings.mode == ThermostatMode::Off {
            if self.heater_on && self.can_force_off(now_ms) {
                self.turn_heater_off(now_ms);
            }
            self.state = ControlState::Idle;
            return;
        }

        if self.safety.in_cooldown() {
            self.state = ControlState::Cooldown;
            return;
        }

        if self.hold.is_active() {
            self.state = ControlState::Hold;
            return;
        }

        if !self.is_sensor_data_valid(now_ms) {
            if self.heater_on && self.can_force_off(now_ms) {
                warn!(
                    age_ms = ?self.sensor.age_ms(now_ms),
                    "sensor data stale, turning fireplace off"
                );
                self.turn_heater_off(now_ms);
            }
            self.state = ControlState::Idle;
            return;
        }

        let temp_f = self.sensor.temperature_f;
        let lower_bound = self.settings.target_temp_f - self.settings.hysteresis_f;
        let upper_bound = self.settings.target_temp_f + self.settings.hysteresis_f;

        if !self.heater_on {
            if temp_f < lower_bound {
                if self.can_change_state(now_ms) {
                    info!(temp_f, threshold_f = lower_bound, "below threshold, heating needed");
                    self.turn_heater_on(now_ms);
                } else {
                    debug!(temp_f, "would heat but inside min cycle time");
                    self.state = ControlState::Satisfied;
                }
            } else {
                self.state = ControlState::Satisfied;
            }
        } else if temp_f > upper_bound {
            if self.can_change_state(now_ms) {
                info!(temp_f, threshold_f = upper_bound, "above threshold, stopping heat");
                self.turn_heater_off(now_ms);
            } else {
                debug!(temp_f, "would stop but inside min cycle time");
                self.state = ControlState::Heating;
            }
        } else {
            self.state = ControlState::Heating;
        }
    }

    fn can_change_state(&self, now_ms: u64) -> bool {
        self.last_state_change_ms
            .map(|last| now_ms.saturating_sub(last) >= self.config.min_cycle_ms)
            .unwrap_or(true)
    }

    fn can_force_off(&self, now_ms: u64) -> bool {
        self.config.safety_off_bypasses_cycle || self.can_change_state(now_ms)
    }

    fn turn_heater_on(&mut self, now_ms: u64) {
        if self.heater_on {
            return;
        }
        info!("turning fireplace on");

        let spacing = self.config.command_spacing_ms;
        self.queue.push_now(now_ms, IrCommand::PowerOn);
        self.queue
            .push_after(now_ms, self.config.power_on_settle_ms, IrCommand::HeatOn);

        let setpoint = normalize_fireplace_temp(
            self.settings.target_temp_f as i32 + self.settings.fireplace_offset_f,
        );
        self.queue
            .push_after(now_ms, spacing, IrCommand::SetTemperature(setpoint));

        // Power-on brings the backlight up at its default level; cycle it to off.
        for _ in 0..self.config.light_default_level {
            self.queue.push_after(now_ms, spacing, IrCommand::LightToggle);
        }

        self.heater_on = true;
        self.safety.heating_started(now_ms);
        self.last_state_change_ms = Some(now_ms);
        self.state = ControlState::Heating;
    }

    fn turn_heater_off(&mut self, now_ms: u64) {
        if !self.heater_on {
            return;
        }
        info!("turning fireplace off");

        self.queue.push_now(now_ms, IrCommand::PowerOff);
        self.heater_on = false;
        self.safety.heating_stopped();
        self.last_state_change_ms = Some(now_ms);
        self.state = ControlState::Satisfied;
    }
}
