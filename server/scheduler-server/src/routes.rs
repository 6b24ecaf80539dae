use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::{
    handlers::{appointments, health, slots},
    server::SchedulerServer,
};

/// Create health check routes
pub fn health_routes() -> Router<SchedulerServer> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/version", get(health::version_info))
}

/// Create timeslot management routes
pub fn slot_routes() -> Router<SchedulerServer> {
    Router::new()
        .route("/api/v1/slots", post(slots::create_slots))
        .route("/api/v1/slots/:slot_id/active", patch(slots::set_slot_active))
        .route("/api/v1/slots/:slot_id/recount", post(slots::recount_slot))
        .route(
            "/api/v1/doctors/:doctor_id/slots",
            get(slots::list_available_slots),
        )
}

/// Create appointment lifecycle routes
pub fn appointment_routes() -> Router<SchedulerServer> {
    Router::new()
        .route("/api/v1/appointments", post(appointments::book_appointment))
        .route(
            "/api/v1/appointments/:appointment_id",
            get(appointments::get_appointment),
        )
        .route(
            "/api/v1/appointments/:appointment_id/confirm",
            post(appointments::confirm_appointment),
        )
        .route(
            "/api/v1/appointments/:appointment_id/check-in",
            post(appointments::check_in_appointment),
        )
        .route(
            "/api/v1/appointments/:appointment_id/complete",
            post(appointments::complete_appointment),
        )
        .route(
            "/api/v1/appointments/:appointment_id/cancel",
            post(appointments::cancel_appointment),
        )
        .route(
            "/api/v1/appointments/:appointment_id/reschedule",
            post(appointments::reschedule_appointment),
        )
        .route(
            "/api/v1/sweeps/no-show",
            post(appointments::run_no_show_sweep),
        )
}
