use std::collections::HashMap;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::SchedulerServer;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub checks: HashMap<String, String>,
}

/// Version information response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub name: String,
    pub version: String,
}

/// Health check handler
pub async fn health_check(State(_server): State<SchedulerServer>) -> Json<HealthResponse> {
    let mut checks = HashMap::new();
    checks.insert("slot_store".to_string(), "healthy".to_string());
    checks.insert("sweeper".to_string(), "healthy".to_string());

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks,
    })
}

/// Version information handler
pub async fn version_info(State(server): State<SchedulerServer>) -> Json<VersionResponse> {
    Json(VersionResponse {
        name: server.config.name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
