//! End-to-end booking scenarios: capacity arbitration, lifecycle
//! transitions, and the invariants tying slot counters to appointment rows.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, NaiveTime};
use scheduling_engine::{
    clinic_now, Appointment, AppointmentEvent, AppointmentEventType, AppointmentStatus,
    AuditRecorder, BookingCoordinator, BookingSource, CasOutcome, InMemorySlotStore,
    NotificationDispatcher, SchedulingError, SlotStore, Timeslot, UnavailableReason,
};
use uuid::Uuid;

#[derive(Default)]
struct RecordingDispatcher {
    events: Mutex<Vec<AppointmentEvent>>,
}

impl RecordingDispatcher {
    fn event_types(&self) -> Vec<AppointmentEventType> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.event_type)
            .collect()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, event: AppointmentEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Default)]
struct RecordingAudit {
    entries: Mutex<Vec<(String, String, Uuid)>>,
}

impl RecordingAudit {
    fn actions(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, action, _)| action.clone())
            .collect()
    }
}

#[async_trait]
impl AuditRecorder for RecordingAudit {
    async fn record(&self, actor: &str, action: &str, entity_id: Uuid, _metadata: serde_json::Value) {
        self.entries
            .lock()
            .unwrap()
            .push((actor.to_string(), action.to_string(), entity_id));
    }
}

struct Harness {
    store: Arc<InMemorySlotStore>,
    coordinator: Arc<BookingCoordinator>,
    events: Arc<RecordingDispatcher>,
    audit: Arc<RecordingAudit>,
}

fn harness() -> Harness {
    let store = Arc::new(InMemorySlotStore::new());
    let events = Arc::new(RecordingDispatcher::default());
    let audit = Arc::new(RecordingAudit::default());
    let coordinator = Arc::new(BookingCoordinator::new(
        store.clone(),
        events.clone(),
        audit.clone(),
    ));
    Harness {
        store,
        coordinator,
        events,
        audit,
    }
}

async fn seed_slot(harness: &Harness, doctor_id: Uuid, max_patients: u32) -> Timeslot {
    let slot = Timeslot::new(
        doctor_id,
        (clinic_now() + Duration::days(7)).date(),
        NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        max_patients,
    )
    .unwrap();
    harness.store.insert_slot(slot).await.unwrap()
}

async fn book(harness: &Harness, slot_id: Uuid) -> Appointment {
    harness
        .coordinator
        .book_appointment(
            Uuid::new_v4(),
            slot_id,
            "check-up".to_string(),
            BookingSource::PatientPortal,
        )
        .await
        .unwrap()
}

/// `booked_count` must always equal the number of appointments still
/// holding a reservation (pending, confirmed, checked-in, or no-show), and
/// may never exceed capacity.
async fn assert_capacity_invariant(store: &InMemorySlotStore, slot_id: Uuid) {
    let slot = store.get_slot(slot_id).await.unwrap();
    let held = store
        .list_appointments_for_slot(slot_id)
        .await
        .unwrap()
        .iter()
        .filter(|appointment| appointment.status.holds_reservation())
        .count() as u32;
    assert_eq!(
        slot.booked_count, held,
        "slot counter out of sync with its appointments"
    );
    assert!(slot.booked_count <= slot.max_patients);
}

#[tokio::test]
async fn booking_creates_pending_appointment_and_reserves_a_unit() {
    let h = harness();
    let slot = seed_slot(&h, Uuid::new_v4(), 3).await;

    let appointment = book(&h, slot.id).await;

    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.slot_id, Some(slot.id));
    assert_eq!(appointment.doctor_id, slot.doctor_id);
    assert_eq!(appointment.scheduled_at, slot.start_datetime());
    assert_eq!(h.store.get_slot(slot.id).await.unwrap().booked_count, 1);
    assert_capacity_invariant(&h.store, slot.id).await;

    assert_eq!(h.events.event_types(), vec![AppointmentEventType::Booked]);
    assert_eq!(h.audit.actions(), vec!["appointment.booked".to_string()]);
}

#[tokio::test]
async fn front_desk_bookings_start_confirmed() {
    let h = harness();
    let slot = seed_slot(&h, Uuid::new_v4(), 1).await;

    let appointment = h
        .coordinator
        .book_appointment(
            Uuid::new_v4(),
            slot.id,
            "walk-in".to_string(),
            BookingSource::FrontDesk,
        )
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn full_slot_rejects_bookings_without_creating_rows() {
    let h = harness();
    let slot = seed_slot(&h, Uuid::new_v4(), 1).await;

    book(&h, slot.id).await;
    let err = h
        .coordinator
        .book_appointment(
            Uuid::new_v4(),
            slot.id,
            "check-up".to_string(),
            BookingSource::PatientPortal,
        )
        .await
        .unwrap_err();

    assert_eq!(err, SchedulingError::CapacityExceeded { slot_id: slot.id });
    assert_eq!(
        h.store.list_appointments_for_slot(slot.id).await.unwrap().len(),
        1,
        "a rejected booking must not leave an appointment row"
    );
    assert_capacity_invariant(&h.store, slot.id).await;
}

#[tokio::test]
async fn unavailable_slots_report_the_specific_reason() {
    let h = harness();
    let doctor_id = Uuid::new_v4();

    // inactive
    let slot = seed_slot(&h, doctor_id, 2).await;
    h.store.set_slot_active(slot.id, false).await.unwrap();
    let err = h
        .coordinator
        .book_appointment(Uuid::new_v4(), slot.id, "x".to_string(), BookingSource::PatientPortal)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SchedulingError::SlotUnavailable {
            slot_id: slot.id,
            reason: UnavailableReason::Inactive
        }
    );

    // in the past
    let past = Timeslot::new(
        doctor_id,
        (clinic_now() - Duration::days(1)).date(),
        NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        2,
    )
    .unwrap();
    let past = h.store.insert_slot(past).await.unwrap();
    let err = h
        .coordinator
        .book_appointment(Uuid::new_v4(), past.id, "x".to_string(), BookingSource::PatientPortal)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SchedulingError::SlotUnavailable {
            slot_id: past.id,
            reason: UnavailableReason::InPast
        }
    );

    // unknown
    let missing = Uuid::new_v4();
    let err = h
        .coordinator
        .book_appointment(Uuid::new_v4(), missing, "x".to_string(), BookingSource::PatientPortal)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SchedulingError::SlotUnavailable {
            slot_id: missing,
            reason: UnavailableReason::NotFound
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ten_concurrent_bookings_on_a_single_unit_slot_yield_one_winner() {
    let h = harness();
    let slot = seed_slot(&h, Uuid::new_v4(), 1).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let coordinator = Arc::clone(&h.coordinator);
        let slot_id = slot.id;
        handles.push(tokio::spawn(async move {
            coordinator
                .book_appointment(
                    Uuid::new_v4(),
                    slot_id,
                    "check-up".to_string(),
                    BookingSource::PatientPortal,
                )
                .await
        }));
    }

    let mut booked = 0;
    let mut rejected_full = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => booked += 1,
            Err(SchedulingError::CapacityExceeded { .. }) => rejected_full += 1,
            Err(other) => panic!("unexpected booking error: {other}"),
        }
    }

    assert_eq!(booked, 1, "exactly one booking may win the race");
    assert_eq!(rejected_full, 9);
    assert_eq!(h.store.get_slot(slot.id).await.unwrap().booked_count, 1);
    assert_capacity_invariant(&h.store, slot.id).await;
}

#[tokio::test]
async fn cancelling_releases_the_unit_and_rejects_a_second_cancel() {
    let h = harness();
    let slot = seed_slot(&h, Uuid::new_v4(), 3).await;

    book(&h, slot.id).await;
    book(&h, slot.id).await;
    let third = book(&h, slot.id).await;
    assert_eq!(h.store.get_slot(slot.id).await.unwrap().booked_count, 3);

    h.coordinator.confirm_appointment(third.id).await.unwrap();
    let cancelled = h.coordinator.cancel_appointment(third.id).await.unwrap();

    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(h.store.get_slot(slot.id).await.unwrap().booked_count, 2);
    assert_capacity_invariant(&h.store, slot.id).await;

    let err = h.coordinator.cancel_appointment(third.id).await.unwrap_err();
    assert_eq!(
        err,
        SchedulingError::InvalidTransition {
            from: AppointmentStatus::Cancelled,
            to: AppointmentStatus::Cancelled
        }
    );
    // the double cancel must not decrement anything
    assert_eq!(h.store.get_slot(slot.id).await.unwrap().booked_count, 2);
}

#[tokio::test]
async fn reschedule_moves_the_reservation_between_slots() {
    let h = harness();
    let doctor_id = Uuid::new_v4();
    let first = seed_slot(&h, doctor_id, 1).await;
    let second = seed_slot(&h, doctor_id, 1).await;

    let appointment = book(&h, first.id).await;
    let moved = h
        .coordinator
        .reschedule_appointment(appointment.id, second.id)
        .await
        .unwrap();

    assert_eq!(moved.slot_id, Some(second.id));
    assert_eq!(moved.scheduled_at, second.start_datetime());
    assert_eq!(h.store.get_slot(first.id).await.unwrap().booked_count, 0);
    assert_eq!(h.store.get_slot(second.id).await.unwrap().booked_count, 1);
    assert_capacity_invariant(&h.store, first.id).await;
    assert_capacity_invariant(&h.store, second.id).await;
    assert!(h
        .events
        .event_types()
        .contains(&AppointmentEventType::Rescheduled));
}

#[tokio::test]
async fn reschedule_to_a_full_slot_changes_nothing() {
    let h = harness();
    let doctor_id = Uuid::new_v4();
    let origin = seed_slot(&h, doctor_id, 1).await;
    let target = seed_slot(&h, doctor_id, 1).await;

    let appointment = book(&h, origin.id).await;
    book(&h, target.id).await; // fills the target

    let err = h
        .coordinator
        .reschedule_appointment(appointment.id, target.id)
        .await
        .unwrap_err();
    assert_eq!(err, SchedulingError::CapacityExceeded { slot_id: target.id });

    let unchanged = h.coordinator.get_appointment(appointment.id).await.unwrap();
    assert_eq!(unchanged.slot_id, Some(origin.id));
    assert_eq!(h.store.get_slot(origin.id).await.unwrap().booked_count, 1);
    assert_eq!(h.store.get_slot(target.id).await.unwrap().booked_count, 1);
}

#[tokio::test]
async fn terminal_appointments_cannot_be_rescheduled() {
    let h = harness();
    let doctor_id = Uuid::new_v4();
    let origin = seed_slot(&h, doctor_id, 1).await;
    let target = seed_slot(&h, doctor_id, 1).await;

    let appointment = book(&h, origin.id).await;
    h.coordinator.cancel_appointment(appointment.id).await.unwrap();

    let err = h
        .coordinator
        .reschedule_appointment(appointment.id, target.id)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SchedulingError::InvalidState {
            appointment_id: appointment.id,
            status: AppointmentStatus::Cancelled
        }
    );
    assert_eq!(h.store.get_slot(target.id).await.unwrap().booked_count, 0);
}

#[tokio::test]
async fn full_visit_lifecycle_returns_the_unit_on_completion() {
    let h = harness();
    let slot = seed_slot(&h, Uuid::new_v4(), 2).await;

    let appointment = book(&h, slot.id).await;
    let confirmed = h.coordinator.confirm_appointment(appointment.id).await.unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

    let checked_in = h
        .coordinator
        .check_in_appointment(appointment.id)
        .await
        .unwrap();
    assert_eq!(checked_in.status, AppointmentStatus::CheckedIn);
    assert_eq!(h.store.get_slot(slot.id).await.unwrap().booked_count, 1);

    let completed = h
        .coordinator
        .complete_appointment(appointment.id)
        .await
        .unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);
    assert_eq!(h.store.get_slot(slot.id).await.unwrap().booked_count, 0);
    assert_capacity_invariant(&h.store, slot.id).await;

    assert_eq!(
        h.events.event_types(),
        vec![
            AppointmentEventType::Booked,
            AppointmentEventType::Confirmed,
            AppointmentEventType::CheckedIn,
            AppointmentEventType::Completed,
        ]
    );
}

#[tokio::test]
async fn completed_visits_cannot_be_cancelled() {
    let h = harness();
    let slot = seed_slot(&h, Uuid::new_v4(), 1).await;

    let appointment = book(&h, slot.id).await;
    h.coordinator.check_in_appointment(appointment.id).await.unwrap();
    h.coordinator.complete_appointment(appointment.id).await.unwrap();

    let err = h.coordinator.cancel_appointment(appointment.id).await.unwrap_err();
    assert_eq!(
        err,
        SchedulingError::InvalidTransition {
            from: AppointmentStatus::Completed,
            to: AppointmentStatus::Cancelled
        }
    );
}

#[tokio::test]
async fn recount_repairs_a_drifted_counter_and_is_idempotent() {
    let h = harness();
    let slot = seed_slot(&h, Uuid::new_v4(), 3).await;
    book(&h, slot.id).await;
    book(&h, slot.id).await;

    // simulate drift, as if a release was lost after a crash
    let current = h.store.get_slot(slot.id).await.unwrap();
    let mut drifted = current.clone();
    drifted.booked_count = 3;
    match h
        .store
        .compare_and_swap_slot(current.version, drifted)
        .await
        .unwrap()
    {
        CasOutcome::Applied(_) => {}
        CasOutcome::VersionMismatch => panic!("drift injection lost the version race"),
    }

    let repaired = h.coordinator.recount_slot(slot.id).await.unwrap();
    assert_eq!(repaired.booked_count, 2);

    let again = h.coordinator.recount_slot(slot.id).await.unwrap();
    assert_eq!(again.booked_count, 2);
    assert_capacity_invariant(&h.store, slot.id).await;
}

#[tokio::test]
async fn availability_listing_hides_full_past_and_inactive_slots() {
    let h = harness();
    let doctor_id = Uuid::new_v4();
    let date = (clinic_now() + Duration::days(7)).date();

    let open = Timeslot::new(
        doctor_id,
        date,
        NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        2,
    )
    .unwrap();
    let open = h.store.insert_slot(open).await.unwrap();

    let full = Timeslot::new(
        doctor_id,
        date,
        NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
        1,
    )
    .unwrap();
    let full = h.store.insert_slot(full).await.unwrap();
    book(&h, full.id).await;

    let inactive = Timeslot::new(
        doctor_id,
        date,
        NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(11, 30, 0).unwrap(),
        2,
    )
    .unwrap();
    let inactive = h.store.insert_slot(inactive).await.unwrap();
    h.store.set_slot_active(inactive.id, false).await.unwrap();

    let available = h
        .coordinator
        .list_available_slots(doctor_id, date)
        .await
        .unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].id, open.id);
}
