use assert_matches::assert_matches;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::models::{
    BookingError, BookingRequest, ClosureScope, DEFAULT_STATUS,
};
use scheduling_cell::services::booking::BookingArbiter;
use scheduling_cell::timegrid::TimeOfDay;
use shared_config::AppConfig;

fn hm(hour: u16, minute: u16) -> TimeOfDay {
    TimeOfDay::hm(hour, minute)
}

fn test_config(mock_server: &MockServer) -> AppConfig {
    AppConfig {
        store_url: mock_server.uri(),
        store_api_key: "test-api-key".to_string(),
        clinic_utc_offset_minutes: 180,
    }
}

fn booking_request(doctor_id: Uuid, patient_id: Uuid) -> BookingRequest {
    BookingRequest {
        patient_id,
        doctor_id,
        department_id: Uuid::new_v4(),
        appointment_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        appointment_time: hm(14, 0),
        priority: None,
        status: None,
    }
}

fn appointment_row(request: &BookingRequest, status: &str) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "patient_id": request.patient_id,
        "doctor_id": request.doctor_id,
        "department_id": request.department_id,
        "appointment_date": request.appointment_date,
        "appointment_time": request.appointment_time,
        "status": status,
        "priority": "Normal",
        "created_at": "2025-03-01T10:00:00Z"
    })
}

async fn mock_no_closures(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/closures"))
        .and(query_param("closure_date", "eq.2025-03-10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(mock_server)
        .await;
}

async fn mock_no_appointments(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(mock_server)
        .await;
}

async fn mock_notification_targets(mock_server: &MockServer, patient_id: Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": patient_id, "full_name": "Ayşe Yılmaz" }
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn booking_commits_and_notifies_on_the_happy_path() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let request = booking_request(doctor_id, patient_id);

    mock_no_closures(&mock_server).await;
    mock_no_appointments(&mock_server).await;
    mock_notification_targets(&mock_server, patient_id).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([appointment_row(&request, DEFAULT_STATUS)])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let arbiter = BookingArbiter::new(&test_config(&mock_server));
    let appointment = arbiter.book(request).await.unwrap();

    assert_eq!(appointment.status, DEFAULT_STATUS);
    assert_eq!(appointment.appointment_time, hm(14, 0));
    assert_eq!(appointment.doctor_id, doctor_id);
}

#[tokio::test]
async fn full_day_clinic_closure_rejects_the_booking() {
    let mock_server = MockServer::start().await;
    let request = booking_request(Uuid::new_v4(), Uuid::new_v4());

    Mock::given(method("GET"))
        .and(path("/rest/v1/closures"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "closure_date": "2025-03-10",
            "start_time": null,
            "end_time": null,
            "target_type": "clinic",
            "doctor_id": null,
            "reason": "Resmi tatil",
            "is_active": true
        }])))
        .mount(&mock_server)
        .await;

    // A rejected booking must never reach the insert.
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let arbiter = BookingArbiter::new(&test_config(&mock_server));
    let result = arbiter.book(request).await;

    assert_matches!(
        result,
        Err(BookingError::ClosureConflict {
            scope: ClosureScope::Clinic,
            window: None,
        })
    );
}

#[tokio::test]
async fn doctor_closure_carries_its_time_window() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let request = booking_request(doctor_id, Uuid::new_v4());

    Mock::given(method("GET"))
        .and(path("/rest/v1/closures"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "closure_date": "2025-03-10",
            "start_time": "13:00",
            "end_time": "15:00",
            "target_type": "doctor",
            "doctor_id": doctor_id,
            "reason": "Kongre",
            "is_active": true
        }])))
        .mount(&mock_server)
        .await;

    let arbiter = BookingArbiter::new(&test_config(&mock_server));
    let result = arbiter.book(request).await;

    let err = result.unwrap_err();
    assert_matches!(
        err,
        BookingError::ClosureConflict {
            scope: ClosureScope::Doctor,
            window: Some(_),
        }
    );
    assert_eq!(
        err.to_string(),
        "the doctor is unavailable between 13:00 and 15:00"
    );
}

#[tokio::test]
async fn closure_time_range_is_half_open_at_commit_time() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let mut request = booking_request(doctor_id, patient_id);
    // Exactly at the closure's end boundary.
    request.appointment_time = hm(15, 0);

    Mock::given(method("GET"))
        .and(path("/rest/v1/closures"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "closure_date": "2025-03-10",
            "start_time": "13:00",
            "end_time": "15:00",
            "target_type": "doctor",
            "doctor_id": doctor_id,
            "reason": "Kongre",
            "is_active": true
        }])))
        .mount(&mock_server)
        .await;
    mock_no_appointments(&mock_server).await;
    mock_notification_targets(&mock_server, patient_id).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([appointment_row(&request, DEFAULT_STATUS)])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let arbiter = BookingArbiter::new(&test_config(&mock_server));
    let appointment = arbiter.book(request).await.unwrap();
    assert_eq!(appointment.appointment_time, hm(15, 0));
}

#[tokio::test]
async fn occupied_slot_rejects_the_second_booking() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let request = booking_request(doctor_id, Uuid::new_v4());

    mock_no_closures(&mock_server).await;

    let winner = booking_request(doctor_id, Uuid::new_v4());
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([appointment_row(&winner, DEFAULT_STATUS)])),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let arbiter = BookingArbiter::new(&test_config(&mock_server));
    let result = arbiter.book(request).await;

    assert_matches!(result, Err(BookingError::SlotTaken));
}

#[tokio::test]
async fn cancelled_booking_does_not_occupy_the_slot() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let request = booking_request(doctor_id, patient_id);

    mock_no_closures(&mock_server).await;
    mock_notification_targets(&mock_server, patient_id).await;

    // The store filter is only an optimization; a cancelled row coming
    // back anyway must be ignored client-side.
    let cancelled = booking_request(doctor_id, Uuid::new_v4());
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([appointment_row(&cancelled, "İptal")])),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([appointment_row(&request, DEFAULT_STATUS)])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let arbiter = BookingArbiter::new(&test_config(&mock_server));
    assert!(arbiter.book(request).await.is_ok());
}

#[tokio::test]
async fn notification_failure_never_unwinds_the_booking() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let request = booking_request(doctor_id, Uuid::new_v4());

    mock_no_closures(&mock_server).await;
    mock_no_appointments(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([appointment_row(&request, DEFAULT_STATUS)])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    // Patient lookup and notification insert are both down.
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let arbiter = BookingArbiter::new(&test_config(&mock_server));
    let appointment = arbiter.book(request).await.unwrap();
    assert_eq!(appointment.status, DEFAULT_STATUS);
}

#[tokio::test]
async fn closure_fetch_failure_is_fatal() {
    let mock_server = MockServer::start().await;
    let request = booking_request(Uuid::new_v4(), Uuid::new_v4());

    // An inconclusive closure check must never fall through to the insert.
    Mock::given(method("GET"))
        .and(path("/rest/v1/closures"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let arbiter = BookingArbiter::new(&test_config(&mock_server));
    let result = arbiter.book(request).await;

    assert_matches!(result, Err(BookingError::Store(_)));
}

#[tokio::test]
async fn closure_for_a_different_doctor_does_not_block() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let request = booking_request(doctor_id, patient_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/closures"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "closure_date": "2025-03-10",
            "start_time": null,
            "end_time": null,
            "target_type": "doctor",
            "doctor_id": Uuid::new_v4(),
            "reason": "İzin",
            "is_active": true
        }])))
        .mount(&mock_server)
        .await;
    mock_no_appointments(&mock_server).await;
    mock_notification_targets(&mock_server, patient_id).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([appointment_row(&request, DEFAULT_STATUS)])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let arbiter = BookingArbiter::new(&test_config(&mock_server));
    assert!(arbiter.book(request).await.is_ok());
}
