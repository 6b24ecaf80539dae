use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use scheduling_engine::{SlotStore, Timeslot};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{api_success, ApiError, ApiResponse, ApiResult};
use crate::server::SchedulerServer;

/// Timeslot view returned to clients
#[derive(Debug, Serialize, ToSchema)]
pub struct TimeslotResponse {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_patients: u32,
    pub booked_count: u32,
    pub remaining_capacity: u32,
    pub is_active: bool,
}

impl From<Timeslot> for TimeslotResponse {
    fn from(slot: Timeslot) -> Self {
        Self {
            remaining_capacity: slot.remaining_capacity(),
            id: slot.id,
            doctor_id: slot.doctor_id,
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            max_patients: slot.max_patients,
            booked_count: slot.booked_count,
            is_active: slot.is_active,
        }
    }
}

/// One slot in a batch produced by the schedule generator
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSlotRequest {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_patients: u32,
}

/// Batch slot creation request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSlotsRequest {
    pub slots: Vec<CreateSlotRequest>,
}

/// Batch slot creation response
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSlotsResponse {
    pub created: usize,
    pub slot_ids: Vec<Uuid>,
}

/// Accept a batch of pre-generated timeslots
pub async fn create_slots(
    State(server): State<SchedulerServer>,
    Json(request): Json<CreateSlotsRequest>,
) -> ApiResult<Json<ApiResponse<CreateSlotsResponse>>> {
    if request.slots.is_empty() {
        return Err(ApiError::validation("at least one slot is required"));
    }

    let mut rows = Vec::with_capacity(request.slots.len());
    for slot in request.slots {
        rows.push(Timeslot::new(
            slot.doctor_id,
            slot.date,
            slot.start_time,
            slot.end_time,
            slot.max_patients,
        )?);
    }

    let slot_ids = rows.iter().map(|slot| slot.id).collect();
    let created = server.store.insert_slots(rows).await?;

    Ok(Json(api_success(CreateSlotsResponse { created, slot_ids })))
}

/// Availability query parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct AvailabilityQuery {
    /// Clinic-local calendar date (YYYY-MM-DD)
    pub date: NaiveDate,
}

/// List slots a patient could still book for one doctor and date
pub async fn list_available_slots(
    State(server): State<SchedulerServer>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<Json<ApiResponse<Vec<TimeslotResponse>>>> {
    let slots = server
        .coordinator
        .list_available_slots(doctor_id, query.date)
        .await?;
    let slots = slots.into_iter().map(TimeslotResponse::from).collect();
    Ok(Json(api_success(slots)))
}

/// Slot activation toggle request
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetSlotActiveRequest {
    pub is_active: bool,
}

/// Activate or deactivate a slot; existing appointments are untouched
pub async fn set_slot_active(
    State(server): State<SchedulerServer>,
    Path(slot_id): Path<Uuid>,
    Json(request): Json<SetSlotActiveRequest>,
) -> ApiResult<Json<ApiResponse<TimeslotResponse>>> {
    let slot = server.store.set_slot_active(slot_id, request.is_active).await?;
    Ok(Json(api_success(TimeslotResponse::from(slot))))
}

/// Reconcile a slot's capacity counter against its appointment rows
pub async fn recount_slot(
    State(server): State<SchedulerServer>,
    Path(slot_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<TimeslotResponse>>> {
    let slot = server.coordinator.recount_slot(slot_id).await?;
    Ok(Json(api_success(TimeslotResponse::from(slot))))
}
