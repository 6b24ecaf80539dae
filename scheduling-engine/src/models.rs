use std::fmt;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SchedulingError, SchedulingResult};

/// Current wall clock in the clinic's local timezone.
///
/// Slot dates and times are clinic-local, so every "is this in the past"
/// decision compares against this clock rather than UTC.
pub fn clinic_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Lifecycle status of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    CheckedIn,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }

    /// Whether an appointment in this status still occupies one capacity
    /// unit on its slot. A no-show keeps its unit: capacity reflects what
    /// was reserved, not what was attended.
    pub fn holds_reservation(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Confirmed | Self::CheckedIn | Self::NoShow
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::CheckedIn => "checked_in",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no_show",
        };
        write!(f, "{}", name)
    }
}

/// Who created the booking. Front-desk bookings start out confirmed since
/// staff made them on the patient's behalf.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingSource {
    #[default]
    PatientPortal,
    FrontDesk,
}

impl BookingSource {
    pub fn initial_status(self) -> AppointmentStatus {
        match self {
            Self::PatientPortal => AppointmentStatus::Pending,
            Self::FrontDesk => AppointmentStatus::Confirmed,
        }
    }
}

/// A bookable unit of a doctor's calendar with finite capacity.
///
/// `booked_count` is mutated only through `CapacityGuard` (or the recount
/// safety net); `version` is the optimistic-lock row version, advanced by
/// the store on every successful compare-and-swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeslot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_patients: u32,
    pub booked_count: u32,
    pub is_active: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Timeslot {
    /// Create a new, empty, active slot.
    pub fn new(
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        max_patients: u32,
    ) -> SchedulingResult<Self> {
        if end_time <= start_time {
            return Err(SchedulingError::Validation(
                "slot end time must be after its start time".to_string(),
            ));
        }
        if max_patients == 0 {
            return Err(SchedulingError::Validation(
                "slot capacity must be at least 1".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            doctor_id,
            date,
            start_time,
            end_time,
            max_patients,
            booked_count: 0,
            is_active: true,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn start_datetime(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn end_datetime(&self) -> NaiveDateTime {
        self.date.and_time(self.end_time)
    }

    pub fn remaining_capacity(&self) -> u32 {
        self.max_patients.saturating_sub(self.booked_count)
    }

    pub fn has_capacity(&self) -> bool {
        self.booked_count < self.max_patients
    }

    /// Whether a new booking could be taken right now.
    pub fn is_bookable(&self, now: NaiveDateTime) -> bool {
        self.is_active && self.has_capacity() && self.start_datetime() > now
    }
}

/// A patient's claim on one capacity unit of a timeslot.
///
/// Appointments are never physically deleted; cancellation and no-show are
/// terminal statuses, not row removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    /// None only before a slot has been assigned.
    pub slot_id: Option<Uuid>,
    /// Clinic-local start of the booked slot; kept in sync on reschedule.
    pub scheduled_at: NaiveDateTime,
    pub reason: String,
    pub status: AppointmentStatus,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Build a fresh appointment bound to `slot`, in the initial status for
    /// `source`.
    pub fn new(patient_id: Uuid, slot: &Timeslot, reason: String, source: BookingSource) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id: slot.doctor_id,
            slot_id: Some(slot.id),
            scheduled_at: slot.start_datetime(),
            reason,
            status: source.initial_status(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}
