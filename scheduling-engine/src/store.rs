use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{SchedulingError, SchedulingResult};
use crate::models::{Appointment, AppointmentStatus, Timeslot};

/// Result of an optimistic compare-and-swap against a versioned row.
#[derive(Debug, Clone)]
pub enum CasOutcome<T> {
    /// The row still carried the expected version; the update was applied.
    Applied(T),
    /// Another writer advanced the row first. Reload and retry.
    VersionMismatch,
}

/// Durable record of timeslots, their capacity counters, and the
/// appointments booked against them.
///
/// Row updates go through versioned compare-and-swap primitives: the store
/// applies an update only when the caller read the latest version, and
/// advances `version` and `updated_at` itself on success. Per-slot
/// serializability comes from the per-row atomicity of these primitives;
/// unrelated rows never contend.
#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn insert_slot(&self, slot: Timeslot) -> SchedulingResult<Timeslot>;

    /// Batch entry point for the schedule generator, which delivers
    /// pre-built slot rows ahead of time.
    async fn insert_slots(&self, slots: Vec<Timeslot>) -> SchedulingResult<usize> {
        let mut inserted = 0;
        for slot in slots {
            self.insert_slot(slot).await?;
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn get_slot(&self, slot_id: Uuid) -> SchedulingResult<Timeslot>;

    /// All slots for one doctor on one calendar date, ordered by start time.
    async fn list_slots(&self, doctor_id: Uuid, date: NaiveDate) -> SchedulingResult<Vec<Timeslot>>;

    /// Apply `updated` only if the stored row still carries
    /// `expected_version`.
    async fn compare_and_swap_slot(
        &self,
        expected_version: u64,
        updated: Timeslot,
    ) -> SchedulingResult<CasOutcome<Timeslot>>;

    /// Administrative toggle. Inactive slots reject new bookings but keep
    /// their existing appointments.
    async fn set_slot_active(&self, slot_id: Uuid, active: bool) -> SchedulingResult<Timeslot>;

    /// Remove a slot. Refused while any reservation is still held against
    /// it.
    async fn remove_slot(&self, slot_id: Uuid) -> SchedulingResult<()>;

    async fn insert_appointment(&self, appointment: Appointment) -> SchedulingResult<Appointment>;

    async fn get_appointment(&self, appointment_id: Uuid) -> SchedulingResult<Appointment>;

    async fn compare_and_swap_appointment(
        &self,
        expected_version: u64,
        updated: Appointment,
    ) -> SchedulingResult<CasOutcome<Appointment>>;

    async fn list_appointments_for_slot(&self, slot_id: Uuid)
        -> SchedulingResult<Vec<Appointment>>;

    /// Sweep selection: appointments in one of `statuses` scheduled
    /// strictly before `cutoff`.
    async fn list_appointments_due_before(
        &self,
        statuses: &[AppointmentStatus],
        cutoff: NaiveDateTime,
    ) -> SchedulingResult<Vec<Appointment>>;
}

/// In-memory store keyed by row id.
///
/// Each dashmap entry is independently lockable, so a compare-and-swap on
/// one slot never blocks writers on another. The version check and the
/// write happen under the same entry lock.
pub struct InMemorySlotStore {
    slots: DashMap<Uuid, Timeslot>,
    appointments: DashMap<Uuid, Appointment>,
}

impl InMemorySlotStore {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            appointments: DashMap::new(),
        }
    }
}

impl Default for InMemorySlotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SlotStore for InMemorySlotStore {
    async fn insert_slot(&self, slot: Timeslot) -> SchedulingResult<Timeslot> {
        match self.slots.entry(slot.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(SchedulingError::Validation(
                format!("slot {} already exists", slot.id),
            )),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(slot.clone());
                Ok(slot)
            }
        }
    }

    async fn get_slot(&self, slot_id: Uuid) -> SchedulingResult<Timeslot> {
        self.slots
            .get(&slot_id)
            .map(|entry| entry.value().clone())
            .ok_or(SchedulingError::SlotNotFound(slot_id))
    }

    async fn list_slots(&self, doctor_id: Uuid, date: NaiveDate) -> SchedulingResult<Vec<Timeslot>> {
        let mut slots: Vec<Timeslot> = self
            .slots
            .iter()
            .filter(|entry| entry.doctor_id == doctor_id && entry.date == date)
            .map(|entry| entry.value().clone())
            .collect();
        slots.sort_by_key(|slot| slot.start_time);
        Ok(slots)
    }

    async fn compare_and_swap_slot(
        &self,
        expected_version: u64,
        mut updated: Timeslot,
    ) -> SchedulingResult<CasOutcome<Timeslot>> {
        if updated.booked_count > updated.max_patients {
            return Err(SchedulingError::Validation(format!(
                "booked_count {} would exceed capacity {} on slot {}",
                updated.booked_count, updated.max_patients, updated.id
            )));
        }

        let mut entry = self
            .slots
            .get_mut(&updated.id)
            .ok_or(SchedulingError::SlotNotFound(updated.id))?;
        if entry.version != expected_version {
            return Ok(CasOutcome::VersionMismatch);
        }
        updated.version = expected_version + 1;
        updated.updated_at = Utc::now();
        *entry = updated.clone();
        Ok(CasOutcome::Applied(updated))
    }

    async fn set_slot_active(&self, slot_id: Uuid, active: bool) -> SchedulingResult<Timeslot> {
        let mut entry = self
            .slots
            .get_mut(&slot_id)
            .ok_or(SchedulingError::SlotNotFound(slot_id))?;
        entry.is_active = active;
        entry.version += 1;
        entry.updated_at = Utc::now();
        Ok(entry.value().clone())
    }

    async fn remove_slot(&self, slot_id: Uuid) -> SchedulingResult<()> {
        let booked = self
            .slots
            .get(&slot_id)
            .ok_or(SchedulingError::SlotNotFound(slot_id))?
            .booked_count;
        if booked > 0 {
            return Err(SchedulingError::Validation(format!(
                "slot {} still holds {} reservations and cannot be removed",
                slot_id, booked
            )));
        }
        self.slots.remove(&slot_id);
        Ok(())
    }

    async fn insert_appointment(&self, appointment: Appointment) -> SchedulingResult<Appointment> {
        match self.appointments.entry(appointment.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(SchedulingError::Validation(
                format!("appointment {} already exists", appointment.id),
            )),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(appointment.clone());
                Ok(appointment)
            }
        }
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> SchedulingResult<Appointment> {
        self.appointments
            .get(&appointment_id)
            .map(|entry| entry.value().clone())
            .ok_or(SchedulingError::AppointmentNotFound(appointment_id))
    }

    async fn compare_and_swap_appointment(
        &self,
        expected_version: u64,
        mut updated: Appointment,
    ) -> SchedulingResult<CasOutcome<Appointment>> {
        let mut entry = self
            .appointments
            .get_mut(&updated.id)
            .ok_or(SchedulingError::AppointmentNotFound(updated.id))?;
        if entry.version != expected_version {
            return Ok(CasOutcome::VersionMismatch);
        }
        updated.version = expected_version + 1;
        updated.updated_at = Utc::now();
        *entry = updated.clone();
        Ok(CasOutcome::Applied(updated))
    }

    async fn list_appointments_for_slot(
        &self,
        slot_id: Uuid,
    ) -> SchedulingResult<Vec<Appointment>> {
        Ok(self
            .appointments
            .iter()
            .filter(|entry| entry.slot_id == Some(slot_id))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn list_appointments_due_before(
        &self,
        statuses: &[AppointmentStatus],
        cutoff: NaiveDateTime,
    ) -> SchedulingResult<Vec<Appointment>> {
        Ok(self
            .appointments
            .iter()
            .filter(|entry| {
                statuses.contains(&entry.status) && entry.scheduled_at < cutoff
            })
            .map(|entry| entry.value().clone())
            .collect())
    }
}
