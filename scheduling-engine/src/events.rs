use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Lifecycle moments surfaced to the notification collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentEventType {
    Booked,
    Confirmed,
    CheckedIn,
    Completed,
    Cancelled,
    Rescheduled,
    MarkedNoShow,
}

impl fmt::Display for AppointmentEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Booked => "appointment.booked",
            Self::Confirmed => "appointment.confirmed",
            Self::CheckedIn => "appointment.checked_in",
            Self::Completed => "appointment.completed",
            Self::Cancelled => "appointment.cancelled",
            Self::Rescheduled => "appointment.rescheduled",
            Self::MarkedNoShow => "appointment.no_show",
        };
        write!(f, "{}", name)
    }
}

/// Domain event emitted after every successful booking mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentEvent {
    pub id: Uuid,
    pub event_type: AppointmentEventType,
    pub appointment_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl AppointmentEvent {
    pub fn new(event_type: AppointmentEventType, appointment_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            appointment_id,
            occurred_at: Utc::now(),
        }
    }
}

/// Best-effort delivery of patient/doctor notifications (email, SMS).
///
/// The engine never awaits a result: implementations handle their own
/// failures, and a lost notification never rolls back a booking.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, event: AppointmentEvent);
}

/// Write-only audit sink recording every state transition.
#[async_trait]
pub trait AuditRecorder: Send + Sync {
    async fn record(&self, actor: &str, action: &str, entity_id: Uuid, metadata: serde_json::Value);
}

/// Default dispatcher: logs the event and drops it.
pub struct LogNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for LogNotificationDispatcher {
    async fn dispatch(&self, event: AppointmentEvent) {
        info!(
            event_id = %event.id,
            event_type = %event.event_type,
            appointment_id = %event.appointment_id,
            "appointment notification dispatched"
        );
    }
}

/// Default audit sink: structured log entry per transition.
pub struct LogAuditRecorder;

#[async_trait]
impl AuditRecorder for LogAuditRecorder {
    async fn record(&self, actor: &str, action: &str, entity_id: Uuid, metadata: serde_json::Value) {
        info!(
            actor = actor,
            action = action,
            entity_id = %entity_id,
            metadata = %metadata,
            "audit record"
        );
    }
}
