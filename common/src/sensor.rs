use crate::error::ValidationError;

/// Latest telemetry from the remote sensor node. Validity is derived from age.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorReading {
    pub temperature_f: f32,
    pub humidity: f32,
    pub updated_ms: Option<u64>,
}

impl SensorReading {
    pub fn is_valid(&self, now_ms: u64, stale_timeout_ms: u64) -> bool {
        self.updated_ms
            .map(|last| now_ms.saturating_sub(last) < stale_timeout_ms)
            .unwrap_or(false)
    }

    pub fn age_ms(&self, now_ms: u64) -> Option<u64> {
        self.updated_ms.map(|last| now_ms.saturating_sub(last))
    }
}

pub fn validate_reading(
    temp_f: f32,
    humidity: f32,
    min_f: f32,
    max_f: f32,
) -> Result<(), ValidationError> {
    if !temp_f.is_finite() || !humidity.is_finite() {
        return Err(ValidationError::NonFiniteReading);
    }
    if !(min_f..=max_f).contains(&temp_f) {
        return Err(ValidationError::TemperatureImplausible {
            temp_f,
            min_f,
            max_f,
        });
    }
    if !(0.0..=100.0).contains(&humidity) {
        return Err(ValidationError::HumidityOutOfRange(humidity));
    }
    Ok(())
}
