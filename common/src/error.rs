use thiserror::Error;

/// Input rejected at a setter boundary. The rejected value never reaches engine state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("target temperature {0}°F outside 60-84°F")]
    TargetOutOfRange(f32),

    #[error("hysteresis {0}°F outside 0.5-5.0°F")]
    HysteresisOutOfRange(f32),

    #[error("fireplace offset {0} must be an even value between 2 and 10")]
    InvalidOffset(i32),

    #[error("sensor reading is not a finite number")]
    NonFiniteReading,

    #[error("temperature {temp_f}°F outside plausible range {min_f}-{max_f}°F")]
    TemperatureImplausible { temp_f: f32, min_f: f32, max_f: f32 },

    #[error("humidity {0}% outside 0-100%")]
    HumidityOutOfRange(f32),

    #[error("unknown thermostat mode '{0}'")]
    UnknownMode(String),
}

/// Failure reported by an IR command sender.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("IR sender rate limited, {wait_ms} ms until next frame")]
    RateLimited { wait_ms: u64 },

    #[error("IR transmission failed: {0}")]
    Transport(String),
}

/// Failure reported by a settings store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("settings store unavailable: {0}")]
    Unavailable(String),
}
