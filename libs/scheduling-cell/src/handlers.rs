// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::StoreClient;
use shared_models::error::AppError;

use crate::models::{BookingError, BookingRequest};
use crate::services::booking::BookingArbiter;
use crate::services::schedule::ScheduleService;
use crate::timegrid::ClinicNow;

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
}

fn map_booking_error(e: BookingError) -> AppError {
    match e {
        BookingError::ClosureConflict { .. } => AppError::Conflict(e.to_string()),
        BookingError::SlotTaken => AppError::Conflict(e.to_string()),
        BookingError::Store(msg) => AppError::Database(msg),
    }
}

/// Bookable slot grid for one doctor on one date.
#[axum::debug_handler]
pub async fn list_slots(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let store = Arc::new(StoreClient::new(&state));
    let schedule = ScheduleService::new(store);
    let now = ClinicNow::resolve(state.clinic_offset());

    let slots = schedule
        .slots_for(query.doctor_id, query.date, now)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "doctor_id": query.doctor_id,
        "date": query.date,
        "slots": slots,
    })))
}

/// Commit a booking. Conflicts (closure, double booking) come back as 409
/// so the caller can re-run slot generation and prompt a new selection.
#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<BookingRequest>,
) -> Result<Json<Value>, AppError> {
    let arbiter = BookingArbiter::new(&state);

    let appointment = arbiter.book(request).await.map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully",
    })))
}
