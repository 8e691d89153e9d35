use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct SafetyLimits {
    pub max_runtime_ms: u64,
    pub cooldown_duration_ms: u64,
    pub absolute_max_temp_f: f32,
}

#[derive(Debug, Clone)]
pub struct SafetySupervisor {
    limits: SafetyLimits,
    heating_start_ms: Option<u64>,
    cooldown_start_ms: Option<u64>,
    in_cooldown: bool,
}

impl SafetySupervisor {
    pub fn new(limits: SafetyLimits) -> Self {
        Self {
            limits,
            heating_start_ms: None,
            cooldown_start_ms: None,
            in_cooldown: false,
        }
    }

    pub fn heating_started(&mut self, now_ms: u64) {
        self.heating_start_ms = Some(now_ms);
    }

    pub fn heating_stopped(&mut self) {
        self.heating_start_ms = None;
    }

    pub fn heating_start_ms(&self) -> Option<u64> {
        self.heating_start_ms
    }

    pub fn cooldown_start_ms(&self) -> Option<u64> {
        self.cooldown_start_ms
    }

    pub fn in_cooldown(&self) -> bool {
        self.in_cooldown
    }

    pub fn runtime_ms(&self, now_ms: u64) -> u64 {
        self.heating_start_ms
            .map(|start| now_ms.saturating_sub(start))
            .unwrap_or(0)
    }

    pub fn cooldown_remaining_ms(&self, now_ms: u64) -> u64 {
        if !self.in_cooldown {
            return 0;
        }
        let elapsed = self
            .cooldown_start_ms
            .map(|start| now_ms.saturating_sub(start))
            .unwrap_or(self.limits.cooldown_duration_ms);
        self.limits.cooldown_duration_ms.saturating_sub(elapsed)
    }

    /// Returns true when an active cooldown just ended.
    pub fn complete_cooldown_if_due(&mut self, now_ms: u64) -> bool {
        if !self.in_cooldown || self.cooldown_remaining_ms(now_ms) > 0 {
            return false;
        }
        info!("cooldown complete, resuming thermostat control");
        self.in_cooldown = false;
        self.cooldown_start_ms = None;
        true
    }

    /// Returns true when continuous heating reached the runtime limit.
    ///
    /// On a trip the supervisor enters cooldown and forgets the heating start;
    /// the caller must issue heat-off and drop its heater belief.
    pub fn check_runtime_limit(&mut self, heater_on: bool, now_ms: u64) -> bool {
        if !heater_on {
            return false;
        }
        let Some(start) = self.heating_start_ms else {
            return false;
        };
        let runtime_ms = now_ms.saturating_sub(start);
        if runtime_ms < self.limits.max_runtime_ms {
            return false;
        }

        warn!(
            runtime_min = runtime_ms / 60_000,
            cooldown_min = self.limits.cooldown_duration_ms / 60_000,
            "max runtime reached, forcing heat off and entering cooldown"
        );
        self.in_cooldown = true;
        self.cooldown_start_ms = Some(now_ms);
        self.heating_start_ms = None;
        true
    }

    /// Returns true when the room is at or above the absolute ceiling while heating.
    pub fn check_over_temperature(&self, heater_on: bool, sensor_valid: bool, temp_f: f32) -> bool {
        let tripped = heater_on && sensor_valid && temp_f >= self.limits.absolute_max_temp_f;
        if tripped {
            warn!(
                temp_f,
                ceiling_f = self.limits.absolute_max_temp_f,
                "over-temperature ceiling reached, forcing fireplace off"
            );
        }
        tripped
    }

    pub fn reset(&mut self) {
        info!("safety reset, clearing cooldown and runtime");
        self.in_cooldown = false;
        self.cooldown_start_ms = None;
        self.heating_start_ms = None;
    }
}
