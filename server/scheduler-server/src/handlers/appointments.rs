use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDateTime;
use scheduling_engine::{clinic_now, Appointment, BookingSource, SweepOutcome};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{api_success, ApiError, ApiResponse, ApiResult};
use crate::server::SchedulerServer;

const MAX_REASON_LENGTH: usize = 500;

/// Who is making the booking
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BookingChannel {
    #[default]
    PatientPortal,
    FrontDesk,
}

impl From<BookingChannel> for BookingSource {
    fn from(channel: BookingChannel) -> Self {
        match channel {
            BookingChannel::PatientPortal => BookingSource::PatientPortal,
            BookingChannel::FrontDesk => BookingSource::FrontDesk,
        }
    }
}

/// Booking request
#[derive(Debug, Deserialize, ToSchema)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub slot_id: Uuid,
    pub reason: String,
    /// Defaults to the patient portal when omitted.
    #[serde(default)]
    pub channel: BookingChannel,
}

/// Reschedule request
#[derive(Debug, Deserialize, ToSchema)]
pub struct RescheduleAppointmentRequest {
    pub new_slot_id: Uuid,
}

/// Appointment view returned to clients
#[derive(Debug, Serialize, ToSchema)]
pub struct AppointmentResponse {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub slot_id: Option<Uuid>,
    pub scheduled_at: NaiveDateTime,
    pub reason: String,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Appointment> for AppointmentResponse {
    fn from(appointment: Appointment) -> Self {
        Self {
            id: appointment.id,
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            slot_id: appointment.slot_id,
            scheduled_at: appointment.scheduled_at,
            status: appointment.status.to_string(),
            reason: appointment.reason,
            created_at: appointment.created_at,
            updated_at: appointment.updated_at,
        }
    }
}

/// Sweep trigger response
#[derive(Debug, Serialize, ToSchema)]
pub struct SweepResponse {
    pub scanned: usize,
    pub transitioned: usize,
    pub failed: usize,
}

impl From<SweepOutcome> for SweepResponse {
    fn from(outcome: SweepOutcome) -> Self {
        Self {
            scanned: outcome.scanned,
            transitioned: outcome.transitioned,
            failed: outcome.failed,
        }
    }
}

/// Book an appointment on a slot
pub async fn book_appointment(
    State(server): State<SchedulerServer>,
    Json(request): Json<BookAppointmentRequest>,
) -> ApiResult<Json<ApiResponse<AppointmentResponse>>> {
    let reason = request.reason.trim().to_string();
    if reason.is_empty() {
        return Err(ApiError::validation("a booking reason is required"));
    }
    if reason.len() > MAX_REASON_LENGTH {
        return Err(ApiError::validation(format!(
            "booking reason must be at most {} characters",
            MAX_REASON_LENGTH
        )));
    }

    let appointment = server
        .coordinator
        .book_appointment(
            request.patient_id,
            request.slot_id,
            reason,
            request.channel.into(),
        )
        .await?;
    Ok(Json(api_success(AppointmentResponse::from(appointment))))
}

/// Fetch a single appointment
pub async fn get_appointment(
    State(server): State<SchedulerServer>,
    Path(appointment_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<AppointmentResponse>>> {
    let appointment = server.coordinator.get_appointment(appointment_id).await?;
    Ok(Json(api_success(AppointmentResponse::from(appointment))))
}

/// Staff confirmation of a pending booking
pub async fn confirm_appointment(
    State(server): State<SchedulerServer>,
    Path(appointment_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<AppointmentResponse>>> {
    let appointment = server.coordinator.confirm_appointment(appointment_id).await?;
    Ok(Json(api_success(AppointmentResponse::from(appointment))))
}

/// Patient arrival at the clinic
pub async fn check_in_appointment(
    State(server): State<SchedulerServer>,
    Path(appointment_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<AppointmentResponse>>> {
    let appointment = server
        .coordinator
        .check_in_appointment(appointment_id)
        .await?;
    Ok(Json(api_success(AppointmentResponse::from(appointment))))
}

/// Visit finished
pub async fn complete_appointment(
    State(server): State<SchedulerServer>,
    Path(appointment_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<AppointmentResponse>>> {
    let appointment = server
        .coordinator
        .complete_appointment(appointment_id)
        .await?;
    Ok(Json(api_success(AppointmentResponse::from(appointment))))
}

/// Cancel an appointment and free its slot unit
pub async fn cancel_appointment(
    State(server): State<SchedulerServer>,
    Path(appointment_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<AppointmentResponse>>> {
    let appointment = server.coordinator.cancel_appointment(appointment_id).await?;
    Ok(Json(api_success(AppointmentResponse::from(appointment))))
}

/// Move an appointment to a different slot
pub async fn reschedule_appointment(
    State(server): State<SchedulerServer>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> ApiResult<Json<ApiResponse<AppointmentResponse>>> {
    let appointment = server
        .coordinator
        .reschedule_appointment(appointment_id, request.new_slot_id)
        .await?;
    Ok(Json(api_success(AppointmentResponse::from(appointment))))
}

/// Trigger a no-show sweep pass immediately
pub async fn run_no_show_sweep(
    State(server): State<SchedulerServer>,
) -> ApiResult<Json<ApiResponse<SweepResponse>>> {
    let outcome = server.sweeper.run_once(clinic_now()).await;
    Ok(Json(api_success(SweepResponse::from(outcome))))
}
