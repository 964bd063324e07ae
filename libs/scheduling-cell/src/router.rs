// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;

use crate::handlers;

pub fn scheduling_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/slots", get(handlers::list_slots))
        .route("/", post(handlers::book_appointment))
        .with_state(state)
}
