use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use fireplace_common::{DeviceState, IrCommand, IrSender, SendError, StepDirection};

use crate::app::monotonic_ms;

/// Shorter than the engine's command spacing so poll jitter never trips it.
const MIN_SEND_INTERVAL_MS: u64 = 200;

type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Host stand-in for the IR transmitter: logs frames and tracks the device belief.
pub struct HostIrSender {
    device: DeviceState,
    light_default_level: u8,
    clock: Clock,
    last_send_ms: Option<u64>,
    sent_frames: u64,
    failed_actions: u64,
    last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IrDiagnostics {
    pub transport: &'static str,
    #[serde(rename = "minSendIntervalMs")]
    pub min_send_interval_ms: u64,
    #[serde(rename = "lastSendMs")]
    pub last_send_ms: Option<u64>,
    #[serde(rename = "sentFrames")]
    pub sent_frames: u64,
    #[serde(rename = "failedActions")]
    pub failed_actions: u64,
    #[serde(rename = "lastError")]
    pub last_error: Option<String>,
    pub device: DeviceState,
}

impl HostIrSender {
    pub fn new(light_default_level: u8) -> Self {
        Self::with_clock(light_default_level, Arc::new(monotonic_ms))
    }

    pub fn with_clock(light_default_level: u8, clock: Clock) -> Self {
        Self {
            device: DeviceState::default(),
            light_default_level,
            clock,
            last_send_ms: None,
            sent_frames: 0,
            failed_actions: 0,
            last_error: None,
        }
    }

    pub fn diagnostics(&self) -> IrDiagnostics {
        IrDiagnostics {
            transport: "log",
            min_send_interval_ms: MIN_SEND_INTERVAL_MS,
            last_send_ms: self.last_send_ms,
            sent_frames: self.sent_frames,
            failed_actions: self.failed_actions,
            last_error: self.last_error.clone(),
            device: self.device,
        }
    }

    fn transmit(&mut self, command: IrCommand) -> Result<(), SendError> {
        let now_ms = (self.clock)();
        if let Some(last) = self.last_send_ms {
            let elapsed = now_ms.saturating_sub(last);
            if elapsed < MIN_SEND_INTERVAL_MS {
                let err = SendError::RateLimited {
                    wait_ms: MIN_SEND_INTERVAL_MS - elapsed,
                };
                warn!(?command, "{err}");
                self.failed_actions = self.failed_actions.saturating_add(1);
                self.last_error = Some(err.to_string());
                return Err(err);
            }
        }

        let frames = self.device.apply(command, self.light_default_level);
        if frames == 0 {
            info!(?command, "ir command is a no-op at current device state");
            return Ok(());
        }

        info!(
            ?command,
            frames,
            light_level = self.device.light_level,
            timer = %self.device.timer_label(),
            fireplace_temp_f = self.device.fireplace_temp_f,
            "ir transmit"
        );
        self.last_send_ms = Some(now_ms);
        self.sent_frames = self.sent_frames.saturating_add(u64::from(frames));
        self.last_error = None;
        Ok(())
    }
}

impl IrSender for HostIrSender {
    fn send_power_on(&mut self) -> Result<(), SendError> {
        self.transmit(IrCommand::PowerOn)
    }

    fn send_power_off(&mut self) -> Result<(), SendError> {
        self.transmit(IrCommand::PowerOff)
    }

    fn send_heat_on(&mut self) -> Result<(), SendError> {
        self.transmit(IrCommand::HeatOn)
    }

    fn send_heat_off(&mut self) -> Result<(), SendError> {
        self.transmit(IrCommand::HeatOff)
    }

    fn send_heat_step(&mut self, direction: StepDirection) -> Result<(), SendError> {
        self.transmit(IrCommand::HeatStep(direction))
    }

    fn send_set_temperature(&mut self, target_f: i32) -> Result<(), SendError> {
        self.transmit(IrCommand::SetTemperature(target_f))
    }

    fn send_light_toggle(&mut self) -> Result<(), SendError> {
        self.transmit(IrCommand::LightToggle)
    }

    fn send_timer_toggle(&mut self) -> Result<(), SendError> {
        self.transmit(IrCommand::TimerToggle)
    }

    fn device_state(&self) -> DeviceState {
        self.device
    }
}
