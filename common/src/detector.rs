use tracing::{debug, info};

use crate::types::TrendDirection;

#[derive(Debug, Clone, Copy)]
pub struct TrendConfig {
    pub sample_interval_ms: u64,
    pub rising_threshold_f: f32,
    pub falling_threshold_f: f32,
    pub samples_required: u8,
}

/// Heater change inferred from a sustained trend that contradicts the belief.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalChange {
    TurnedOn,
    TurnedOff,
}

#[derive(Debug, Clone)]
pub struct RemoteDetector {
    config: TrendConfig,
    previous_temp_f: Option<f32>,
    last_sample_ms: Option<u64>,
    direction: TrendDirection,
    consecutive_samples: u8,
}

impl RemoteDetector {
    pub fn new(config: TrendConfig) -> Self {
        Self {
            config,
            previous_temp_f: None,
            last_sample_ms: None,
            direction: TrendDirection::Stable,
            consecutive_samples: 0,
        }
    }

    pub fn direction(&self) -> TrendDirection {
        self.direction
    }

    pub fn consecutive_samples(&self) -> u8 {
        self.consecutive_samples
    }

    pub fn previous_temp_f(&self) -> Option<f32> {
        self.previous_temp_f
    }

    pub fn last_sample_ms(&self) -> Option<u64> {
        self.last_sample_ms
    }

    /// Feed one tick. `reading` is `None` while the sensor is invalid.
    pub fn observe(
        &mut self,
        reading: Option<f32>,
        heater_on: bool,
        now_ms: u64,
    ) -> Option<ExternalChange> {
        let Some(temp_f) = reading else {
            // A gap breaks the trend; the next valid sample only sets a baseline.
            self.previous_temp_f = None;
            self.direction = TrendDirection::Stable;
            self.consecutive_samples = 0;
            return None;
        };

        if let Some(last) = self.last_sample_ms {
            if now_ms.saturating_sub(last) < self.config.sample_interval_ms {
                return None;
            }
        }
        self.last_sample_ms = Some(now_ms);

        let previous = self.previous_temp_f.replace(temp_f)?;
        let delta = temp_f - previous;
        let direction = self.classify(delta);

        match direction {
            TrendDirection::Stable => self.consecutive_samples = 0,
            _ if direction == self.direction => {
                self.consecutive_samples = self.consecutive_samples.saturating_add(1);
            }
            _ => self.consecutive_samples = 1,
        }
        self.direction = direction;
        debug!(
            delta_f = delta,
            direction = direction.as_str(),
            samples = self.consecutive_samples,
            "trend sample"
        );

        if self.consecutive_samples < self.config.samples_required {
            return None;
        }

        let change = match (direction, heater_on) {
            (TrendDirection::Rising, false) => ExternalChange::TurnedOn,
            (TrendDirection::Falling, true) => ExternalChange::TurnedOff,
            _ => return None,
        };
        info!(?change, delta_f = delta, "fireplace changed by external remote");
        self.consecutive_samples = 0;
        Some(change)
    }

    fn classify(&self, delta: f32) -> TrendDirection {
        if delta > self.config.rising_threshold_f {
            TrendDirection::Rising
        } else if delta < self.config.falling_threshold_f {
            TrendDirection::Falling
        } else {
            TrendDirection::Stable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: u64 = 30_000;

    fn detector() -> RemoteDetector {
        RemoteDetector::new(TrendConfig {
            sample_interval_ms: INTERVAL,
            rising_threshold_f: 0.3,
            falling_threshold_f: -0.2,
            samples_required: 3,
        })
    }

    fn feed(detector: &mut RemoteDetector, temps: &[f32], heater_on: bool) -> Vec<ExternalChange> {
        temps
            .iter()
            .enumerate()
            .filter_map(|(i, temp)| detector.observe(Some(*temp), heater_on, i as u64 * INTERVAL))
            .collect()
    }

    #[test]
    fn first_sample_only_sets_baseline() {
        let mut detector = detector();
        assert_eq!(detector.observe(Some(68.0), false, 0), None);
        assert_eq!(detector.previous_temp_f(), Some(68.0));
        assert_eq!(detector.consecutive_samples(), 0);
    }

    #[test]
    fn sustained_rise_with_heater_off_reports_turn_on() {
        let mut detector = detector();
        let changes = feed(&mut detector, &[66.0, 66.5, 67.0, 67.5], false);
        assert_eq!(changes, vec![ExternalChange::TurnedOn]);
        assert_eq!(detector.consecutive_samples(), 0);
    }

    #[test]
    fn sustained_fall_with_heater_on_reports_turn_off() {
        let mut detector = detector();
        let changes = feed(&mut detector, &[72.0, 71.5, 71.0, 70.5], true);
        assert_eq!(changes, vec![ExternalChange::TurnedOff]);
    }

    #[test]
    fn matching_trend_is_not_reported() {
        let mut detector = detector();
        let changes = feed(&mut detector, &[66.0, 66.5, 67.0, 67.5, 68.0], true);
        assert!(changes.is_empty());
        assert_eq!(detector.consecutive_samples(), 4);
    }

    #[test]
    fn stable_sample_resets_the_count() {
        let mut detector = detector();
        let changes = feed(&mut detector, &[66.0, 66.5, 67.0, 67.1, 67.6], false);
        assert!(changes.is_empty());
        assert_eq!(detector.direction(), TrendDirection::Rising);
        assert_eq!(detector.consecutive_samples(), 1);
    }

    #[test]
    fn direction_flip_restarts_at_one() {
        let mut detector = detector();
        feed(&mut detector, &[66.0, 66.5, 67.0, 66.5], false);
        assert_eq!(detector.direction(), TrendDirection::Falling);
        assert_eq!(detector.consecutive_samples(), 1);
    }

    #[test]
    fn samples_inside_interval_are_skipped() {
        let mut detector = detector();
        detector.observe(Some(66.0), false, 0);
        assert_eq!(detector.observe(Some(70.0), false, INTERVAL - 1), None);
        assert_eq!(detector.previous_temp_f(), Some(66.0));
    }

    #[test]
    fn sensor_gap_rebaselines() {
        let mut detector = detector();
        feed(&mut detector, &[66.0, 66.5, 67.0], false);
        assert_eq!(detector.observe(None, false, 3 * INTERVAL), None);
        assert_eq!(detector.previous_temp_f(), None);

        // Post-gap sample is baseline only, even though it is far above 67.0.
        assert_eq!(detector.observe(Some(69.0), false, 4 * INTERVAL), None);
        assert_eq!(detector.consecutive_samples(), 0);
    }
}
