use chrono::Utc;
use tracing::debug;

use crate::error::{SchedulingError, SchedulingResult};
use crate::models::{Appointment, AppointmentStatus};

/// Central validator for appointment lifecycle transitions.
///
/// Every mutator consults this table, so an illegal move is rejected in one
/// place instead of scattered status checks. The machine is pure with
/// respect to capacity: callers own any `booked_count` side effects tied to
/// a transition.
pub struct AppointmentStateMachine;

impl AppointmentStateMachine {
    /// All statuses reachable from `from` in one step.
    pub fn valid_transitions(from: AppointmentStatus) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match from {
            Pending => &[Confirmed, CheckedIn, Cancelled, NoShow],
            Confirmed => &[CheckedIn, Cancelled, NoShow],
            CheckedIn => &[Completed],
            // Terminal statuses admit nothing further.
            Completed | Cancelled | NoShow => &[],
        }
    }

    pub fn validate(from: AppointmentStatus, to: AppointmentStatus) -> SchedulingResult<()> {
        if Self::valid_transitions(from).contains(&to) {
            Ok(())
        } else {
            Err(SchedulingError::InvalidTransition { from, to })
        }
    }

    /// Validate `to` against the appointment's current status and return
    /// the updated row.
    pub fn apply(appointment: &Appointment, to: AppointmentStatus) -> SchedulingResult<Appointment> {
        Self::validate(appointment.status, to)?;
        let mut updated = appointment.clone();
        updated.status = to;
        updated.updated_at = Utc::now();
        debug!(
            appointment_id = %appointment.id,
            from = %appointment.status,
            to = %to,
            "status transition applied"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AppointmentStatus::*;

    const ALL_STATUSES: [AppointmentStatus; 6] =
        [Pending, Confirmed, CheckedIn, Completed, Cancelled, NoShow];

    #[test]
    fn pending_can_confirm_check_in_cancel_or_no_show() {
        assert!(AppointmentStateMachine::validate(Pending, Confirmed).is_ok());
        assert!(AppointmentStateMachine::validate(Pending, CheckedIn).is_ok());
        assert!(AppointmentStateMachine::validate(Pending, Cancelled).is_ok());
        assert!(AppointmentStateMachine::validate(Pending, NoShow).is_ok());
        assert!(AppointmentStateMachine::validate(Pending, Completed).is_err());
    }

    #[test]
    fn only_checked_in_visits_can_complete() {
        for from in ALL_STATUSES {
            let result = AppointmentStateMachine::validate(from, Completed);
            assert_eq!(result.is_ok(), from == CheckedIn, "from {from}");
        }
    }

    #[test]
    fn checked_in_appointments_cannot_cancel() {
        assert_eq!(
            AppointmentStateMachine::validate(CheckedIn, Cancelled),
            Err(SchedulingError::InvalidTransition {
                from: CheckedIn,
                to: Cancelled
            })
        );
    }

    #[test]
    fn terminal_statuses_admit_no_transition_at_all() {
        for from in [Completed, Cancelled, NoShow] {
            assert!(AppointmentStateMachine::valid_transitions(from).is_empty());
            for to in ALL_STATUSES {
                assert!(
                    AppointmentStateMachine::validate(from, to).is_err(),
                    "{from} -> {to} should be rejected"
                );
            }
        }
    }

    #[test]
    fn self_transitions_are_rejected() {
        for status in ALL_STATUSES {
            assert!(AppointmentStateMachine::validate(status, status).is_err());
        }
    }
}
