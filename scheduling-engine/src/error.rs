use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::models::AppointmentStatus;

/// Why a slot rejected a new reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    Inactive,
    InPast,
    NotFound,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Inactive => "it has been deactivated",
            Self::InPast => "its start time has already passed",
            Self::NotFound => "it does not exist",
        };
        write!(f, "{}", text)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulingError {
    #[error("slot {slot_id} cannot take new bookings: {reason}")]
    SlotUnavailable {
        slot_id: Uuid,
        reason: UnavailableReason,
    },

    #[error("slot {slot_id} is fully booked")]
    CapacityExceeded { slot_id: Uuid },

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("appointment {appointment_id} cannot be modified in status {status}")]
    InvalidState {
        appointment_id: Uuid,
        status: AppointmentStatus,
    },

    #[error("appointment {0} not found")]
    AppointmentNotFound(Uuid),

    #[error("slot {0} not found")]
    SlotNotFound(Uuid),

    #[error("conflicting concurrent updates on {entity_id}, retries exhausted")]
    TransientConflict { entity_id: Uuid },

    #[error("validation error: {0}")]
    Validation(String),
}

pub type SchedulingResult<T> = std::result::Result<T, SchedulingError>;
