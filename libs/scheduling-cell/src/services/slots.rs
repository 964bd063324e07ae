// libs/scheduling-cell/src/services/slots.rs
use std::collections::HashSet;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{BlockReason, Closure, SlotCandidate, WorkingHoursRule};
use crate::timegrid::{in_window, ClinicNow, TimeOfDay};

/// Snapshot of everything the slot computation depends on. The caller
/// gathers this once; the generator itself performs no I/O and never
/// consults the wall clock.
#[derive(Debug, Clone)]
pub struct ScheduleContext {
    /// Resolved working-hours rule for the target date's weekday.
    pub rule: WorkingHoursRule,
    pub slot_minutes: u16,
    /// Closures fetched for the target date. Date, activity and doctor
    /// matching are re-checked here, so passing a broader set is harmless.
    pub closures: Vec<Closure>,
    /// Times of the doctor's non-cancelled bookings on the target date.
    pub booked_times: HashSet<TimeOfDay>,
    pub now: ClinicNow,
}

/// Enumerate the day's slot grid for one doctor and classify every point.
///
/// Lunch breaks and applicable closures remove points from the grid
/// entirely without shifting its spacing; past and booked slots stay
/// visible but disabled. A closed weekday yields an empty grid, which is
/// an expected outcome rather than an error.
///
/// Pure and idempotent: identical inputs always produce identical output.
pub fn generate_slots(
    date: NaiveDate,
    doctor_id: Uuid,
    ctx: &ScheduleContext,
) -> Vec<SlotCandidate> {
    if !ctx.rule.is_open || ctx.slot_minutes == 0 {
        return Vec::new();
    }

    let lunch = ctx.rule.lunch_window();
    let closures: Vec<&Closure> = ctx
        .closures
        .iter()
        .filter(|c| c.applies_on(date) && c.applies_to(doctor_id))
        .collect();

    let mut slots = Vec::new();
    let mut t = ctx.rule.start;

    // Walk the grid from opening to closing time, exclusive. A trailing
    // period shorter than one slot never reaches a grid point and is
    // dropped silently.
    while t < ctx.rule.end {
        let current = t;
        t = match current.checked_add(ctx.slot_minutes) {
            Some(next) => next,
            None => break,
        };

        if let Some((lunch_start, lunch_end)) = lunch {
            if in_window(current, lunch_start, lunch_end) {
                continue;
            }
        }
        if closures.iter().any(|c| c.covers(current)) {
            continue;
        }

        let block = if ctx.now.is_past(date, current) {
            BlockReason::Past
        } else if ctx.booked_times.contains(&current) {
            BlockReason::Booked
        } else {
            BlockReason::None
        };

        slots.push(SlotCandidate {
            time: current,
            is_bookable: block == BlockReason::None,
            block,
        });
    }

    slots
}
