// libs/scheduling-cell/src/services/schedule.rs
use std::sync::Arc;

use anyhow::Result;
use chrono::{Datelike, NaiveDate, Weekday};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::StoreClient;

use crate::models::{
    active_booking_times, Appointment, BookingError, Closure, SlotCandidate, WorkingHoursRule,
    CANCELLED_STATUS, DEFAULT_SLOT_MINUTES,
};
use crate::services::slots::{generate_slots, ScheduleContext};
use crate::timegrid::ClinicNow;

/// Weekday index used throughout the schedule tables (0 = Sunday).
pub fn day_of_week(date: NaiveDate) -> u8 {
    match date.weekday() {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

/// Read side of the engine: settings, closures and existing bookings.
pub struct ScheduleService {
    store: Arc<StoreClient>,
}

impl ScheduleService {
    pub fn new(store: Arc<StoreClient>) -> Self {
        Self { store }
    }

    /// The configured weekly working hours, falling back to the built-in
    /// default table when the setting is absent or unreadable. Missing
    /// configuration is not an error.
    pub async fn working_hours(&self) -> Vec<WorkingHoursRule> {
        let value = match self.fetch_setting("working_hours").await {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!("working_hours setting absent, using defaults");
                return WorkingHoursRule::default_week();
            }
            Err(e) => {
                warn!("working_hours fetch failed, using defaults: {}", e);
                return WorkingHoursRule::default_week();
            }
        };

        match serde_json::from_value::<Vec<WorkingHoursRule>>(value) {
            Ok(rules) if !rules.is_empty() => rules,
            Ok(_) => {
                debug!("working_hours setting empty, using defaults");
                WorkingHoursRule::default_week()
            }
            Err(e) => {
                warn!("working_hours setting malformed, using defaults: {}", e);
                WorkingHoursRule::default_week()
            }
        }
    }

    /// Working-hours rule in effect on `date`.
    pub async fn rule_for(&self, date: NaiveDate) -> WorkingHoursRule {
        let day = day_of_week(date);
        self.working_hours()
            .await
            .into_iter()
            .find(|rule| rule.day == day)
            .unwrap_or_else(|| WorkingHoursRule::default_for_day(day))
    }

    /// Configured slot stride in minutes, defaulting to 30.
    pub async fn slot_minutes(&self) -> u16 {
        let value = match self.fetch_setting("slot_duration").await {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!("slot_duration setting absent, using default");
                return DEFAULT_SLOT_MINUTES;
            }
            Err(e) => {
                warn!("slot_duration fetch failed, using default: {}", e);
                return DEFAULT_SLOT_MINUTES;
            }
        };

        let parsed = match &value {
            Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            Value::String(s) => s.parse().ok(),
            _ => None,
        };

        match parsed {
            Some(minutes) if minutes > 0 => minutes,
            _ => {
                warn!("slot_duration setting malformed, using default");
                DEFAULT_SLOT_MINUTES
            }
        }
    }

    /// Active closures on `date`. This read gates booking correctness, so
    /// failures are fatal rather than defaulted to an empty list.
    pub async fn closures_on(&self, date: NaiveDate) -> Result<Vec<Closure>, BookingError> {
        let path = format!(
            "/rest/v1/closures?closure_date=eq.{}&is_active=eq.true",
            date
        );
        let rows: Vec<Value> = self
            .store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| BookingError::Store(e.to_string()))?;

        let mut closures: Vec<Closure> = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Closure>, _>>()
            .map_err(|e| BookingError::Store(format!("Failed to parse closures: {}", e)))?;

        // The store filter is an optimization; the date and activity checks
        // are repeated client-side.
        closures.retain(|c| c.applies_on(date));

        Ok(closures)
    }

    /// The doctor's bookings on `date`, cancelled rows excluded.
    pub async fn appointments_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, BookingError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&status=neq.{}",
            doctor_id,
            date,
            urlencoding::encode(CANCELLED_STATUS)
        );
        let rows: Vec<Value> = self
            .store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| BookingError::Store(e.to_string()))?;

        let mut appointments: Vec<Appointment> = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Appointment>, _>>()
            .map_err(|e| BookingError::Store(format!("Failed to parse appointments: {}", e)))?;

        appointments.retain(|apt| !apt.is_cancelled());

        Ok(appointments)
    }

    /// Full read path: snapshot settings, closures and bookings, then run
    /// the pure generator.
    pub async fn slots_for(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        now: ClinicNow,
    ) -> Result<Vec<SlotCandidate>, BookingError> {
        let rule = self.rule_for(date).await;
        let slot_minutes = self.slot_minutes().await;
        let closures = self.closures_on(date).await?;
        let appointments = self.appointments_on(doctor_id, date).await?;

        let ctx = ScheduleContext {
            rule,
            slot_minutes,
            closures,
            booked_times: active_booking_times(&appointments),
            now,
        };

        let slots = generate_slots(date, doctor_id, &ctx);
        debug!(
            "Generated {} slots for doctor {} on {}",
            slots.len(),
            doctor_id,
            date
        );
        Ok(slots)
    }

    async fn fetch_setting(&self, key: &str) -> Result<Option<Value>> {
        let path = format!("/rest/v1/clinic_settings?key=eq.{}&select=value", key);
        let rows: Vec<Value> = self.store.request(Method::GET, &path, None).await?;

        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.get("value").cloned()))
    }
}
