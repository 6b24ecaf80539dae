//! ClinicFlow scheduling HTTP server
//!
//! Thin axum surface over the scheduling engine: slot intake from the
//! schedule generator, availability listing, the appointment lifecycle
//! operations, and an HTTP trigger for the no-show sweep. Authorization
//! happens upstream; by the time a request reaches these handlers the
//! caller is assumed to be allowed to make it.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use error::{api_success, ApiError, ApiErrorResponse, ApiResponse, ApiResult};
pub use server::{SchedulerServer, ServerConfig};

/// Assemble the full application router.
pub fn create_app(server: SchedulerServer) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::slot_routes())
        .merge(routes::appointment_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(server)
}
