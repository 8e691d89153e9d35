use chrono::{DateTime, Datelike, Duration, FixedOffset, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::{config::validate_target, types::ThermostatMode};

const MINUTES_PER_DAY: u32 = 24 * 60;
const MINUTES_PER_WEEK: u32 = 7 * MINUTES_PER_DAY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => Self::Mon,
            Weekday::Tue => Self::Tue,
            Weekday::Wed => Self::Wed,
            Weekday::Thu => Self::Thu,
            Weekday::Fri => Self::Fri,
            Weekday::Sat => Self::Sat,
            Weekday::Sun => Self::Sun,
        }
    }
}

impl DayOfWeek {
    fn days_from_monday(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleEntry {
    pub day: DayOfWeek,
    #[serde(rename = "startMinutes")]
    pub start_minutes: u16,
    pub mode: ThermostatMode,
    #[serde(rename = "targetTemp")]
    pub target_temp_f: f32,
}

impl ScheduleEntry {
    pub fn is_valid(&self) -> bool {
        u32::from(self.start_minutes) < MINUTES_PER_DAY
            && validate_target(self.target_temp_f).is_ok()
    }

    fn minute_of_week(&self) -> u32 {
        self.day.days_from_monday() * MINUTES_PER_DAY + u32::from(self.start_minutes)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub enabled: bool,
    pub entries: Vec<ScheduleEntry>,
}

/// Program slot in force at a given moment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleAction {
    pub mode: ThermostatMode,
    pub target_temp_f: f32,
    /// Unix seconds the slot started. The same entry a week later is a new slot.
    pub started_at: i64,
}

impl Schedule {
    /// Drop invalid entries and order the rest through the week.
    pub fn normalize(&mut self) {
        self.entries.retain(ScheduleEntry::is_valid);
        self.entries.sort_by_key(ScheduleEntry::minute_of_week);
    }

    /// Latest entry at or before `now`, wrapping back into the previous week.
    pub fn current_action(&self, now: DateTime<FixedOffset>) -> Option<ScheduleAction> {
        if !self.enabled {
            return None;
        }
        let now_minute = minute_of_week(now);

        // Entries later in the week than now belong to last week.
        let (entry, age) = self
            .entries
            .iter()
            .map(|entry| {
                let start = entry.minute_of_week();
                (entry, (now_minute + MINUTES_PER_WEEK - start) % MINUTES_PER_WEEK)
            })
            .min_by_key(|(_, age)| *age)?;

        let started = minute_start(now)? - Duration::minutes(i64::from(age));
        Some(ScheduleAction {
            mode: entry.mode,
            target_temp_f: entry.target_temp_f,
            started_at: started.timestamp(),
        })
    }

    /// Unix seconds of the next entry start strictly after `now`.
    pub fn next_event_epoch(&self, now: DateTime<FixedOffset>) -> Option<i64> {
        if !self.enabled {
            return None;
        }
        let now_minute = minute_of_week(now);

        let minutes_ahead = self
            .entries
            .iter()
            .map(|entry| {
                let ahead =
                    (entry.minute_of_week() + MINUTES_PER_WEEK - now_minute) % MINUTES_PER_WEEK;
                if ahead == 0 {
                    MINUTES_PER_WEEK
                } else {
                    ahead
                }
            })
            .min()?;

        let next = minute_start(now)? + Duration::minutes(i64::from(minutes_ahead));
        Some(next.timestamp())
    }
}

fn minute_start(now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    now.with_second(0).and_then(|dt| dt.with_nanosecond(0))
}

fn minute_of_week(now: DateTime<FixedOffset>) -> u32 {
    DayOfWeek::from(now.weekday()).days_from_monday() * MINUTES_PER_DAY
        + now.hour() * 60
        + now.minute()
}
