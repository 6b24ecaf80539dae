use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{SchedulingError, SchedulingResult, UnavailableReason};
use crate::models::Timeslot;
use crate::store::{CasOutcome, SlotStore};

/// Upper bound on optimistic-retry attempts for a single reserve or
/// release. Each lost race means another writer made progress on the same
/// slot, so the loop converges quickly in practice.
const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// Atomic check-and-reserve / release over a single slot's capacity
/// counter.
///
/// The guard is not appointment-aware: rejecting a double release for the
/// same appointment is the caller's job. Reserves on different slots never
/// contend with each other; there is no global lock.
pub struct CapacityGuard {
    store: Arc<dyn SlotStore>,
    max_attempts: u32,
}

impl CapacityGuard {
    pub fn new(store: Arc<dyn SlotStore>) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(store: Arc<dyn SlotStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts,
        }
    }

    /// Atomically claim one capacity unit on `slot_id`.
    ///
    /// The capacity, activity, and not-in-the-past checks and the increment
    /// form one atomic unit: the increment is applied through a
    /// compare-and-swap against the row version read alongside the checks,
    /// so no second reserve on the same slot can observe an intermediate
    /// state.
    pub async fn reserve(&self, slot_id: Uuid, now: NaiveDateTime) -> SchedulingResult<Timeslot> {
        for attempt in 0..self.max_attempts {
            let slot = match self.store.get_slot(slot_id).await {
                Ok(slot) => slot,
                Err(SchedulingError::SlotNotFound(_)) => {
                    return Err(SchedulingError::SlotUnavailable {
                        slot_id,
                        reason: UnavailableReason::NotFound,
                    })
                }
                Err(other) => return Err(other),
            };

            if !slot.is_active {
                return Err(SchedulingError::SlotUnavailable {
                    slot_id,
                    reason: UnavailableReason::Inactive,
                });
            }
            if slot.start_datetime() <= now {
                return Err(SchedulingError::SlotUnavailable {
                    slot_id,
                    reason: UnavailableReason::InPast,
                });
            }
            if !slot.has_capacity() {
                return Err(SchedulingError::CapacityExceeded { slot_id });
            }

            let mut updated = slot.clone();
            updated.booked_count += 1;
            match self.store.compare_and_swap_slot(slot.version, updated).await? {
                CasOutcome::Applied(applied) => {
                    debug!(
                        slot_id = %slot_id,
                        booked_count = applied.booked_count,
                        max_patients = applied.max_patients,
                        "reserved one capacity unit"
                    );
                    return Ok(applied);
                }
                CasOutcome::VersionMismatch => {
                    debug!(slot_id = %slot_id, attempt, "lost the row version race on reserve, retrying");
                }
            }
        }

        warn!(slot_id = %slot_id, attempts = self.max_attempts, "reserve retries exhausted");
        Err(SchedulingError::TransientConflict { entity_id: slot_id })
    }

    /// Return one previously claimed unit, floored at zero.
    pub async fn release(&self, slot_id: Uuid) -> SchedulingResult<Timeslot> {
        for attempt in 0..self.max_attempts {
            let slot = self.store.get_slot(slot_id).await?;
            let mut updated = slot.clone();
            updated.booked_count = slot.booked_count.saturating_sub(1);
            match self.store.compare_and_swap_slot(slot.version, updated).await? {
                CasOutcome::Applied(applied) => {
                    debug!(
                        slot_id = %slot_id,
                        booked_count = applied.booked_count,
                        "released one capacity unit"
                    );
                    return Ok(applied);
                }
                CasOutcome::VersionMismatch => {
                    debug!(slot_id = %slot_id, attempt, "lost the row version race on release, retrying");
                }
            }
        }

        warn!(slot_id = %slot_id, attempts = self.max_attempts, "release retries exhausted");
        Err(SchedulingError::TransientConflict { entity_id: slot_id })
    }
}
