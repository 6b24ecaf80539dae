use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::capacity::CapacityGuard;
use crate::error::{SchedulingError, SchedulingResult};
use crate::events::{AppointmentEvent, AppointmentEventType, AuditRecorder, NotificationDispatcher};
use crate::models::{clinic_now, Appointment, AppointmentStatus, BookingSource, Timeslot};
use crate::state_machine::AppointmentStateMachine;
use crate::store::{CasOutcome, SlotStore};

/// Upper bound on re-check-and-write attempts for appointment rows.
const MAX_STATUS_ATTEMPTS: u32 = 8;

/// Orchestrates appointment create/cancel/reschedule against slot capacity.
///
/// Capacity side effects always go through the guard; status writes always
/// go through the state machine and are re-validated against the current
/// row before each write, so a concurrent transition wins cleanly instead
/// of being overwritten.
pub struct BookingCoordinator {
    store: Arc<dyn SlotStore>,
    guard: CapacityGuard,
    notifier: Arc<dyn NotificationDispatcher>,
    audit: Arc<dyn AuditRecorder>,
}

impl BookingCoordinator {
    pub fn new(
        store: Arc<dyn SlotStore>,
        notifier: Arc<dyn NotificationDispatcher>,
        audit: Arc<dyn AuditRecorder>,
    ) -> Self {
        Self {
            guard: CapacityGuard::new(Arc::clone(&store)),
            store,
            notifier,
            audit,
        }
    }

    /// Slots for `doctor_id` on `date` that can still take a booking:
    /// active, in the future, with remaining capacity.
    pub async fn list_available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> SchedulingResult<Vec<Timeslot>> {
        let now = clinic_now();
        let slots = self.store.list_slots(doctor_id, date).await?;
        Ok(slots.into_iter().filter(|slot| slot.is_bookable(now)).collect())
    }

    /// Reserve a unit on `slot_id` and create the appointment.
    ///
    /// On guard failure no appointment row exists; if the row write itself
    /// fails the fresh reservation is released again, so there is no
    /// partial state in either direction.
    pub async fn book_appointment(
        &self,
        patient_id: Uuid,
        slot_id: Uuid,
        reason: String,
        source: BookingSource,
    ) -> SchedulingResult<Appointment> {
        let now = clinic_now();
        let slot = self.guard.reserve(slot_id, now).await?;

        let appointment = Appointment::new(patient_id, &slot, reason, source);
        let appointment = match self.store.insert_appointment(appointment).await {
            Ok(appointment) => appointment,
            Err(insert_err) => {
                if let Err(release_err) = self.guard.release(slot_id).await {
                    error!(
                        slot_id = %slot_id,
                        error = %release_err,
                        "could not return the reservation after a failed appointment write; slot needs a recount"
                    );
                }
                return Err(insert_err);
            }
        };

        info!(
            appointment_id = %appointment.id,
            patient_id = %patient_id,
            slot_id = %slot_id,
            status = %appointment.status,
            "appointment booked"
        );
        self.audit
            .record(
                &actor_for(source, patient_id),
                "appointment.booked",
                appointment.id,
                json!({ "slot_id": slot_id, "status": appointment.status }),
            )
            .await;
        self.notifier
            .dispatch(AppointmentEvent::new(
                AppointmentEventType::Booked,
                appointment.id,
            ))
            .await;
        Ok(appointment)
    }

    /// Cancel and return the appointment's capacity unit.
    ///
    /// The status write lands first; if the release then fails the error is
    /// logged and the slot counter is repaired by [`Self::recount_slot`],
    /// never by silently re-applying the release.
    pub async fn cancel_appointment(&self, appointment_id: Uuid) -> SchedulingResult<Appointment> {
        let cancelled = self
            .transition(appointment_id, AppointmentStatus::Cancelled)
            .await?;

        if let Some(slot_id) = cancelled.slot_id {
            if let Err(release_err) = self.guard.release(slot_id).await {
                error!(
                    appointment_id = %appointment_id,
                    slot_id = %slot_id,
                    error = %release_err,
                    "cancelled appointment could not release its capacity unit; slot needs a recount"
                );
            }
        }

        info!(appointment_id = %appointment_id, "appointment cancelled");
        self.audit
            .record(
                &format!("patient:{}", cancelled.patient_id),
                "appointment.cancelled",
                appointment_id,
                json!({ "slot_id": cancelled.slot_id }),
            )
            .await;
        self.notifier
            .dispatch(AppointmentEvent::new(
                AppointmentEventType::Cancelled,
                appointment_id,
            ))
            .await;
        Ok(cancelled)
    }

    /// Move an appointment to a different slot.
    ///
    /// The new reservation is taken first; only once it is held does the
    /// slot reference move and the old unit get released. A failed
    /// reservation leaves the appointment exactly where it was.
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        new_slot_id: Uuid,
    ) -> SchedulingResult<Appointment> {
        let now = clinic_now();
        let current = self.store.get_appointment(appointment_id).await?;
        if !matches!(
            current.status,
            AppointmentStatus::Pending | AppointmentStatus::Confirmed
        ) {
            return Err(SchedulingError::InvalidState {
                appointment_id,
                status: current.status,
            });
        }
        let old_slot_id = current.slot_id;
        if old_slot_id == Some(new_slot_id) {
            return Err(SchedulingError::Validation(
                "appointment is already booked on this slot".to_string(),
            ));
        }

        let new_slot = self.guard.reserve(new_slot_id, now).await?;

        let moved = match self.swap_slot_reference(appointment_id, &new_slot).await {
            Ok(moved) => moved,
            Err(swap_err) => {
                // the appointment still holds its old slot; undo the fresh unit
                if let Err(release_err) = self.guard.release(new_slot_id).await {
                    error!(
                        slot_id = %new_slot_id,
                        error = %release_err,
                        "could not undo reservation after a failed reschedule; slot needs a recount"
                    );
                }
                return Err(swap_err);
            }
        };

        if let Some(old_id) = old_slot_id {
            if let Err(release_err) = self.guard.release(old_id).await {
                error!(
                    appointment_id = %appointment_id,
                    slot_id = %old_id,
                    error = %release_err,
                    "old slot did not release after reschedule; slot needs a recount"
                );
            }
        }

        info!(
            appointment_id = %appointment_id,
            from_slot = ?old_slot_id,
            to_slot = %new_slot_id,
            "appointment rescheduled"
        );
        self.audit
            .record(
                &format!("patient:{}", moved.patient_id),
                "appointment.rescheduled",
                appointment_id,
                json!({ "from_slot": old_slot_id, "to_slot": new_slot_id }),
            )
            .await;
        self.notifier
            .dispatch(AppointmentEvent::new(
                AppointmentEventType::Rescheduled,
                appointment_id,
            ))
            .await;
        Ok(moved)
    }

    /// Staff/doctor confirmation of a pending booking. No capacity side
    /// effect: the unit was claimed at booking time.
    pub async fn confirm_appointment(&self, appointment_id: Uuid) -> SchedulingResult<Appointment> {
        let confirmed = self
            .transition(appointment_id, AppointmentStatus::Confirmed)
            .await?;
        info!(appointment_id = %appointment_id, "appointment confirmed");
        self.audit
            .record(
                "front-desk",
                "appointment.confirmed",
                appointment_id,
                json!({ "status": confirmed.status }),
            )
            .await;
        self.notifier
            .dispatch(AppointmentEvent::new(
                AppointmentEventType::Confirmed,
                appointment_id,
            ))
            .await;
        Ok(confirmed)
    }

    /// Patient arrival at the clinic.
    pub async fn check_in_appointment(
        &self,
        appointment_id: Uuid,
    ) -> SchedulingResult<Appointment> {
        let checked_in = self
            .transition(appointment_id, AppointmentStatus::CheckedIn)
            .await?;
        info!(appointment_id = %appointment_id, "patient checked in");
        self.audit
            .record(
                &format!("patient:{}", checked_in.patient_id),
                "appointment.checked_in",
                appointment_id,
                json!({ "status": checked_in.status }),
            )
            .await;
        self.notifier
            .dispatch(AppointmentEvent::new(
                AppointmentEventType::CheckedIn,
                appointment_id,
            ))
            .await;
        Ok(checked_in)
    }

    /// Visit finished. The unit goes back to the slot: only appointments
    /// that still hold a claim (pending, confirmed, checked-in, no-show)
    /// count against capacity.
    pub async fn complete_appointment(
        &self,
        appointment_id: Uuid,
    ) -> SchedulingResult<Appointment> {
        let completed = self
            .transition(appointment_id, AppointmentStatus::Completed)
            .await?;

        if let Some(slot_id) = completed.slot_id {
            if let Err(release_err) = self.guard.release(slot_id).await {
                error!(
                    appointment_id = %appointment_id,
                    slot_id = %slot_id,
                    error = %release_err,
                    "completed appointment could not release its capacity unit; slot needs a recount"
                );
            }
        }

        info!(appointment_id = %appointment_id, "appointment completed");
        self.audit
            .record(
                "doctor",
                "appointment.completed",
                appointment_id,
                json!({ "slot_id": completed.slot_id }),
            )
            .await;
        self.notifier
            .dispatch(AppointmentEvent::new(
                AppointmentEventType::Completed,
                appointment_id,
            ))
            .await;
        Ok(completed)
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> SchedulingResult<Appointment> {
        self.store.get_appointment(appointment_id).await
    }

    /// Idempotent reconciliation safety net: force `booked_count` back to
    /// the number of appointments still holding a reservation on the slot.
    /// A no-show keeps its unit, so it counts here too.
    pub async fn recount_slot(&self, slot_id: Uuid) -> SchedulingResult<Timeslot> {
        for _attempt in 0..MAX_STATUS_ATTEMPTS {
            let slot = self.store.get_slot(slot_id).await?;
            let appointments = self.store.list_appointments_for_slot(slot_id).await?;
            let held = appointments
                .iter()
                .filter(|appointment| appointment.status.holds_reservation())
                .count() as u32;

            if held == slot.booked_count {
                debug!(slot_id = %slot_id, booked_count = held, "slot counter already consistent");
                return Ok(slot);
            }

            warn!(
                slot_id = %slot_id,
                stored = slot.booked_count,
                actual = held,
                "slot capacity counter drifted, repairing"
            );
            let mut updated = slot.clone();
            updated.booked_count = held;
            match self.store.compare_and_swap_slot(slot.version, updated).await? {
                CasOutcome::Applied(repaired) => return Ok(repaired),
                CasOutcome::VersionMismatch => continue,
            }
        }
        Err(SchedulingError::TransientConflict { entity_id: slot_id })
    }

    /// Re-check-before-write status transition: the machine validates
    /// against the row as it is *now*, and the CAS rejects the write if the
    /// row moved after validation.
    async fn transition(
        &self,
        appointment_id: Uuid,
        to: AppointmentStatus,
    ) -> SchedulingResult<Appointment> {
        for _attempt in 0..MAX_STATUS_ATTEMPTS {
            let current = self.store.get_appointment(appointment_id).await?;
            let updated = AppointmentStateMachine::apply(&current, to)?;
            match self
                .store
                .compare_and_swap_appointment(current.version, updated)
                .await?
            {
                CasOutcome::Applied(applied) => return Ok(applied),
                CasOutcome::VersionMismatch => {
                    debug!(
                        appointment_id = %appointment_id,
                        "appointment row changed mid-transition, re-checking"
                    );
                }
            }
        }
        Err(SchedulingError::TransientConflict {
            entity_id: appointment_id,
        })
    }

    async fn swap_slot_reference(
        &self,
        appointment_id: Uuid,
        new_slot: &Timeslot,
    ) -> SchedulingResult<Appointment> {
        for _attempt in 0..MAX_STATUS_ATTEMPTS {
            let current = self.store.get_appointment(appointment_id).await?;
            if !matches!(
                current.status,
                AppointmentStatus::Pending | AppointmentStatus::Confirmed
            ) {
                return Err(SchedulingError::InvalidState {
                    appointment_id,
                    status: current.status,
                });
            }
            let mut updated = current.clone();
            updated.slot_id = Some(new_slot.id);
            updated.doctor_id = new_slot.doctor_id;
            updated.scheduled_at = new_slot.start_datetime();
            match self
                .store
                .compare_and_swap_appointment(current.version, updated)
                .await?
            {
                CasOutcome::Applied(applied) => return Ok(applied),
                CasOutcome::VersionMismatch => continue,
            }
        }
        Err(SchedulingError::TransientConflict {
            entity_id: appointment_id,
        })
    }
}

fn actor_for(source: BookingSource, patient_id: Uuid) -> String {
    match source {
        BookingSource::PatientPortal => format!("patient:{}", patient_id),
        BookingSource::FrontDesk => "front-desk".to_string(),
    }
}
