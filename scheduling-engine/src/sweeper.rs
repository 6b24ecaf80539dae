use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{SchedulingError, SchedulingResult};
use crate::events::{AppointmentEvent, AppointmentEventType, AuditRecorder, NotificationDispatcher};
use crate::models::{clinic_now, Appointment, AppointmentStatus};
use crate::state_machine::AppointmentStateMachine;
use crate::store::{CasOutcome, SlotStore};

const SWEEP_SOURCE_STATUSES: &[AppointmentStatus] =
    &[AppointmentStatus::Pending, AppointmentStatus::Confirmed];

const MAX_ROW_ATTEMPTS: u32 = 4;

/// Operational knobs for the no-show sweep. The cadence affects how soon a
/// stale row is noticed, never whether it is handled correctly.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// How long past the scheduled start a silent patient keeps the benefit
    /// of the doubt.
    pub grace_period_minutes: i64,
    /// Seconds between sweep runs.
    pub interval_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            grace_period_minutes: 120,
            interval_secs: 300,
        }
    }
}

/// Totals from a single sweep pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepOutcome {
    pub scanned: usize,
    pub transitioned: usize,
    pub failed: usize,
}

/// Periodic batch pass that reclassifies stale pending/confirmed
/// appointments as no-shows.
///
/// The sweep never touches the capacity guard: a no-show keeps its slot
/// unit so the counter reflects what was reserved, not what was attended.
/// That is deliberate policy, not an oversight.
pub struct NoShowSweeper {
    store: Arc<dyn SlotStore>,
    notifier: Arc<dyn NotificationDispatcher>,
    audit: Arc<dyn AuditRecorder>,
    config: SweeperConfig,
}

impl NoShowSweeper {
    pub fn new(
        store: Arc<dyn SlotStore>,
        notifier: Arc<dyn NotificationDispatcher>,
        audit: Arc<dyn AuditRecorder>,
        config: SweeperConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            audit,
            config,
        }
    }

    /// One sweep pass over everything scheduled more than the grace period
    /// before `now`.
    ///
    /// Idempotent: rows already in no-show fall outside the selection, so
    /// an immediate second run transitions nothing. Each row is its own
    /// unit of work; a failure is logged and counted, never allowed to
    /// abort the rest of the batch.
    pub async fn run_once(&self, now: NaiveDateTime) -> SweepOutcome {
        let cutoff = now - Duration::minutes(self.config.grace_period_minutes);
        let due = match self
            .store
            .list_appointments_due_before(SWEEP_SOURCE_STATUSES, cutoff)
            .await
        {
            Ok(due) => due,
            Err(load_err) => {
                warn!(error = %load_err, "no-show sweep could not load candidates");
                return SweepOutcome::default();
            }
        };

        let mut outcome = SweepOutcome {
            scanned: due.len(),
            ..SweepOutcome::default()
        };
        for appointment in due {
            match self.mark_no_show(&appointment).await {
                Ok(_) => outcome.transitioned += 1,
                Err(row_err) => {
                    outcome.failed += 1;
                    warn!(
                        appointment_id = %appointment.id,
                        error = %row_err,
                        "no-show transition failed, continuing with the rest of the batch"
                    );
                }
            }
        }

        info!(
            scanned = outcome.scanned,
            transitioned = outcome.transitioned,
            failed = outcome.failed,
            "no-show sweep finished"
        );
        outcome
    }

    /// Run the sweep on its interval until `shutdown` flips.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(self.config.interval_secs));
            info!(
                interval_secs = self.config.interval_secs,
                grace_period_minutes = self.config.grace_period_minutes,
                "no-show sweeper started"
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let outcome = self.run_once(clinic_now()).await;
                        debug!(transitioned = outcome.transitioned, "scheduled sweep tick complete");
                    }
                    _ = shutdown.changed() => {
                        info!("no-show sweeper stopping");
                        break;
                    }
                }
            }
        })
    }

    async fn mark_no_show(&self, appointment: &Appointment) -> SchedulingResult<Appointment> {
        // Re-check against the current row each attempt: a concurrent
        // check-in or cancellation wins, and this row surfaces as a
        // rejected transition instead of being clobbered.
        for _attempt in 0..MAX_ROW_ATTEMPTS {
            let current = self.store.get_appointment(appointment.id).await?;
            let updated = AppointmentStateMachine::apply(&current, AppointmentStatus::NoShow)?;
            match self
                .store
                .compare_and_swap_appointment(current.version, updated)
                .await?
            {
                CasOutcome::Applied(applied) => {
                    self.audit
                        .record(
                            "system:no-show-sweeper",
                            "appointment.no_show",
                            applied.id,
                            serde_json::json!({ "scheduled_at": applied.scheduled_at }),
                        )
                        .await;
                    self.notifier
                        .dispatch(AppointmentEvent::new(
                            AppointmentEventType::MarkedNoShow,
                            applied.id,
                        ))
                        .await;
                    return Ok(applied);
                }
                CasOutcome::VersionMismatch => continue,
            }
        }
        Err(SchedulingError::TransientConflict {
            entity_id: appointment.id,
        })
    }
}
