// libs/scheduling-cell/src/models.rs
use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timegrid::{in_window, TimeOfDay};

// ==============================================================================
// SCHEDULE CONFIGURATION MODELS
// ==============================================================================

/// Appointment status marking a cancelled booking. Any other status, the
/// default pending one included, occupies its slot.
pub const CANCELLED_STATUS: &str = "İptal";

/// Status given to freshly booked appointments.
pub const DEFAULT_STATUS: &str = "Bekleniyor";

pub const DEFAULT_PRIORITY: &str = "Normal";

pub const DEFAULT_SLOT_MINUTES: u16 = 30;

/// Weekly working hours for one weekday (0 = Sunday .. 6 = Saturday).
/// Configured by the clinic admin; read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingHoursRule {
    pub day: u8,
    pub is_open: bool,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    #[serde(default)]
    pub has_lunch_break: bool,
    #[serde(default)]
    pub lunch_start: Option<TimeOfDay>,
    #[serde(default)]
    pub lunch_end: Option<TimeOfDay>,
}

impl WorkingHoursRule {
    /// The lunch window, when one is configured with both bounds.
    pub fn lunch_window(&self) -> Option<(TimeOfDay, TimeOfDay)> {
        if !self.has_lunch_break {
            return None;
        }
        Some((self.lunch_start?, self.lunch_end?))
    }

    /// Built-in fallback rule for one weekday: Mon-Sat 09:00-18:00 with a
    /// 12:00-13:30 lunch break, Sunday closed.
    pub fn default_for_day(day: u8) -> Self {
        WorkingHoursRule {
            day,
            is_open: day != 0,
            start: TimeOfDay::hm(9, 0),
            end: TimeOfDay::hm(18, 0),
            has_lunch_break: day != 0,
            lunch_start: Some(TimeOfDay::hm(12, 0)),
            lunch_end: Some(TimeOfDay::hm(13, 30)),
        }
    }

    pub fn default_week() -> Vec<WorkingHoursRule> {
        (0..7).map(WorkingHoursRule::default_for_day).collect()
    }
}

// ==============================================================================
// CLOSURE MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureTarget {
    Clinic,
    Doctor,
}

/// An admin-declared suspension of availability: clinic-wide or
/// doctor-specific, full-day or time-ranged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Closure {
    pub id: Uuid,
    pub closure_date: NaiveDate,
    #[serde(default)]
    pub start_time: Option<TimeOfDay>,
    #[serde(default)]
    pub end_time: Option<TimeOfDay>,
    pub target_type: ClosureTarget,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    #[serde(default)]
    pub reason: String,
    pub is_active: bool,
}

impl Closure {
    /// Active on this calendar date.
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        self.is_active && self.closure_date == date
    }

    /// Clinic-wide closures hit every doctor; doctor closures only the
    /// named one.
    pub fn applies_to(&self, doctor_id: Uuid) -> bool {
        match self.target_type {
            ClosureTarget::Clinic => true,
            ClosureTarget::Doctor => self.doctor_id == Some(doctor_id),
        }
    }

    /// The partial time range, when both bounds are present. Absence of
    /// both means a full-day closure.
    pub fn window(&self) -> Option<(TimeOfDay, TimeOfDay)> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    /// Whether `t` is suspended by this closure. Partial ranges are
    /// half-open: a slot exactly at `end_time` is not covered.
    pub fn covers(&self, t: TimeOfDay) -> bool {
        match self.window() {
            Some((start, end)) => in_window(t, start, end),
            None => true,
        }
    }
}

// ==============================================================================
// APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub department_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: TimeOfDay,
    /// Free-form workflow status. Only `CANCELLED_STATUS` releases the slot.
    pub status: String,
    #[serde(default)]
    pub priority: String,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_cancelled(&self) -> bool {
        self.status == CANCELLED_STATUS
    }
}

/// Times occupied by non-cancelled bookings. Cancelled rows are ignored,
/// never required to be deleted.
pub fn active_booking_times(appointments: &[Appointment]) -> HashSet<TimeOfDay> {
    appointments
        .iter()
        .filter(|apt| !apt.is_cancelled())
        .map(|apt| apt.appointment_time)
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub department_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: TimeOfDay,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

// ==============================================================================
// SLOT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    None,
    Past,
    Booked,
}

/// One point on the day's slot grid. Lunch breaks and closures never show
/// up here at all; past and booked slots do, struck through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotCandidate {
    pub time: TimeOfDay,
    pub is_bookable: bool,
    pub block: BlockReason,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureScope {
    Clinic,
    Doctor,
}

fn closure_conflict_message(
    scope: &ClosureScope,
    window: &Option<(TimeOfDay, TimeOfDay)>,
) -> String {
    match (scope, window) {
        (ClosureScope::Clinic, None) => "the clinic is closed on this date".to_string(),
        (ClosureScope::Doctor, None) => "the doctor is unavailable on this date".to_string(),
        (ClosureScope::Clinic, Some((start, end))) => {
            format!("the clinic is closed between {} and {}", start, end)
        }
        (ClosureScope::Doctor, Some((start, end))) => {
            format!("the doctor is unavailable between {} and {}", start, end)
        }
    }
}

/// Booking rejections the caller is expected to handle, plus the store
/// failures that abort an attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BookingError {
    #[error("{}", closure_conflict_message(.scope, .window))]
    ClosureConflict {
        scope: ClosureScope,
        window: Option<(TimeOfDay, TimeOfDay)>,
    },

    #[error("doctor already has an appointment at this time")]
    SlotTaken,

    #[error("datastore error: {0}")]
    Store(String),
}
