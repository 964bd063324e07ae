// libs/scheduling-cell/src/services/booking.rs
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::StoreClient;

use crate::models::{
    Appointment, BookingError, BookingRequest, ClosureScope, ClosureTarget, DEFAULT_PRIORITY,
    DEFAULT_STATUS,
};
use crate::services::schedule::ScheduleService;

/// Write path of the engine. Whatever slot the UI showed the caller is
/// advisory only: closures and double bookings are re-checked here against
/// live state before anything is committed.
pub struct BookingArbiter {
    store: Arc<StoreClient>,
    schedule: ScheduleService,
}

impl BookingArbiter {
    pub fn new(config: &AppConfig) -> Self {
        let store = Arc::new(StoreClient::new(config));
        Self {
            schedule: ScheduleService::new(Arc::clone(&store)),
            store,
        }
    }

    pub fn with_store(store: Arc<StoreClient>) -> Self {
        Self {
            schedule: ScheduleService::new(Arc::clone(&store)),
            store,
        }
    }

    /// Validate and commit one booking. Steps 1-2 are authoritative and
    /// abort on any store failure; the closing notification is best-effort
    /// and never unwinds a committed appointment.
    pub async fn book(&self, request: BookingRequest) -> Result<Appointment, BookingError> {
        info!(
            "Booking appointment for patient {} with doctor {} on {} at {}",
            request.patient_id,
            request.doctor_id,
            request.appointment_date,
            request.appointment_time
        );

        self.check_closures(&request).await?;
        self.check_slot_free(&request).await?;

        let appointment = self.insert_appointment(&request).await?;

        if let Err(e) = self.notify_patient(&appointment).await {
            warn!(
                "Notification for appointment {} failed: {}",
                appointment.id, e
            );
        }

        info!("Appointment {} booked successfully", appointment.id);
        Ok(appointment)
    }

    async fn check_closures(&self, request: &BookingRequest) -> Result<(), BookingError> {
        let closures = self.schedule.closures_on(request.appointment_date).await?;

        for closure in &closures {
            if closure.applies_to(request.doctor_id) && closure.covers(request.appointment_time) {
                let scope = match closure.target_type {
                    ClosureTarget::Clinic => ClosureScope::Clinic,
                    ClosureTarget::Doctor => ClosureScope::Doctor,
                };
                warn!(
                    "Booking rejected by closure {} ({}) on {}",
                    closure.id, closure.reason, request.appointment_date
                );
                return Err(BookingError::ClosureConflict {
                    scope,
                    window: closure.window(),
                });
            }
        }

        Ok(())
    }

    async fn check_slot_free(&self, request: &BookingRequest) -> Result<(), BookingError> {
        let existing = self
            .schedule
            .appointments_on(request.doctor_id, request.appointment_date)
            .await?;

        if existing
            .iter()
            .any(|apt| apt.appointment_time == request.appointment_time)
        {
            warn!(
                "Booking rejected: doctor {} already booked on {} at {}",
                request.doctor_id, request.appointment_date, request.appointment_time
            );
            return Err(BookingError::SlotTaken);
        }

        Ok(())
    }

    async fn insert_appointment(
        &self,
        request: &BookingRequest,
    ) -> Result<Appointment, BookingError> {
        let appointment_data = json!({
            "patient_id": request.patient_id,
            "doctor_id": request.doctor_id,
            "department_id": request.department_id,
            "appointment_date": request.appointment_date,
            "appointment_time": request.appointment_time,
            "status": request.status.clone().unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            "priority": request.priority.clone().unwrap_or_else(|| DEFAULT_PRIORITY.to_string()),
            "created_at": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Appointment> = self
            .store
            .insert("/rest/v1/appointments", appointment_data)
            .await
            .map_err(|e| BookingError::Store(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or_else(|| BookingError::Store("insert returned no representation".to_string()))
    }

    /// Looks up the patient's display name and records a notification.
    /// Failures here are the caller's concern only as a log line.
    async fn notify_patient(&self, appointment: &Appointment) -> Result<()> {
        let path = format!(
            "/rest/v1/patients?id=eq.{}&select=full_name",
            appointment.patient_id
        );
        let rows: Vec<Value> = self.store.request(Method::GET, &path, None).await?;

        let patient_name = rows
            .first()
            .and_then(|row| row["full_name"].as_str())
            .unwrap_or("Hasta")
            .to_string();

        let message = format!(
            "Appointment confirmed for {} on {} at {}",
            patient_name, appointment.appointment_date, appointment.appointment_time
        );

        let notification_data = json!({
            "patient_id": appointment.patient_id,
            "appointment_id": appointment.id,
            "message": message,
            "is_read": false,
            "created_at": Utc::now().to_rfc3339(),
        });

        let _: Vec<Value> = self
            .store
            .insert("/rest/v1/notifications", notification_data)
            .await?;

        debug!("Notification recorded for appointment {}", appointment.id);
        Ok(())
    }
}
