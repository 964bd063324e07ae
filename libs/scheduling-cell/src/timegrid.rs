// libs/scheduling-cell/src/timegrid.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Minute-of-day civil time. All schedule arithmetic happens on whole
/// minutes; seconds never enter the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(TimeOfDay(hour as u16 * 60 + minute as u16))
        } else {
            None
        }
    }

    /// Const constructor for compile-time known times. Arguments must be a
    /// valid hour/minute pair; use `new` for untrusted input.
    pub const fn hm(hour: u16, minute: u16) -> Self {
        TimeOfDay(hour * 60 + minute)
    }

    pub fn from_minutes(minutes: u16) -> Option<Self> {
        if minutes < MINUTES_PER_DAY {
            Some(TimeOfDay(minutes))
        } else {
            None
        }
    }

    pub fn hour(&self) -> u16 {
        self.0 / 60
    }

    pub fn minute(&self) -> u16 {
        self.0 % 60
    }

    pub fn as_minutes(&self) -> u16 {
        self.0
    }

    /// Advance by `minutes`, or `None` past midnight.
    pub fn checked_add(self, minutes: u16) -> Option<Self> {
        Self::from_minutes(self.0.checked_add(minutes)?)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time of day: {0}")]
pub struct ParseTimeError(String);

impl FromStr for TimeOfDay {
    type Err = ParseTimeError;

    /// Accepts `HH:MM`; a trailing `:SS` from the store's time columns is
    /// tolerated and discarded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let hour: u8 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| ParseTimeError(s.to_string()))?;
        let minute: u8 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| ParseTimeError(s.to_string()))?;

        TimeOfDay::new(hour, minute).ok_or_else(|| ParseTimeError(s.to_string()))
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Half-open interval test used for lunch breaks and partial closures: a
/// point exactly at `end` is outside the window.
pub fn in_window(t: TimeOfDay, start: TimeOfDay, end: TimeOfDay) -> bool {
    start <= t && t < end
}

/// The current instant on the clinic's civil calendar. Resolved once per
/// request and passed down, so the slot computation never touches the wall
/// clock itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClinicNow {
    pub date: NaiveDate,
    pub time: TimeOfDay,
}

impl ClinicNow {
    pub fn resolve(offset: FixedOffset) -> Self {
        Self::from_utc(Utc::now(), offset)
    }

    pub fn from_utc(utc: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local = utc.with_timezone(&offset);
        ClinicNow {
            date: local.date_naive(),
            time: TimeOfDay((local.hour() * 60 + local.minute()) as u16),
        }
    }

    /// Whether `t` on `date` lies strictly before this instant.
    pub fn is_past(&self, date: NaiveDate, t: TimeOfDay) -> bool {
        date < self.date || (date == self.date && t < self.time)
    }
}
