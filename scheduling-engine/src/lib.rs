//! Appointment scheduling and capacity engine for ClinicFlow
//!
//! This crate turns a doctor's published availability into bookable
//! timeslots and arbitrates everything that competes for them:
//! - Atomic per-slot capacity reservation with bounded optimistic retry
//! - An explicit appointment lifecycle state machine with one central
//!   transition table
//! - Booking orchestration (create / cancel / reschedule) that never leaves
//!   partial state behind
//! - A periodic, cancellable sweep that reclassifies stale appointments as
//!   no-shows
//! - Fire-and-forget notification and audit collaborator seams
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chrono::{NaiveDate, NaiveTime};
//! use scheduling_engine::{
//!     BookingCoordinator, BookingSource, InMemorySlotStore, LogAuditRecorder,
//!     LogNotificationDispatcher, SlotStore, Timeslot,
//! };
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemorySlotStore::new());
//!     let coordinator = BookingCoordinator::new(
//!         store.clone(),
//!         Arc::new(LogNotificationDispatcher),
//!         Arc::new(LogAuditRecorder),
//!     );
//!
//!     let slot = Timeslot::new(
//!         Uuid::new_v4(),
//!         NaiveDate::from_ymd_opt(2026, 9, 1).ok_or("bad date")?,
//!         NaiveTime::from_hms_opt(9, 0, 0).ok_or("bad time")?,
//!         NaiveTime::from_hms_opt(9, 30, 0).ok_or("bad time")?,
//!         3,
//!     )?;
//!     let slot_id = slot.id;
//!     store.insert_slot(slot).await?;
//!
//!     let appointment = coordinator
//!         .book_appointment(
//!             Uuid::new_v4(),
//!             slot_id,
//!             "annual check-up".to_string(),
//!             BookingSource::PatientPortal,
//!         )
//!         .await?;
//!     println!("booked appointment {} ({})", appointment.id, appointment.status);
//!     Ok(())
//! }
//! ```

pub mod booking;
pub mod capacity;
pub mod error;
pub mod events;
pub mod models;
pub mod state_machine;
pub mod store;
pub mod sweeper;

pub use booking::*;
pub use capacity::*;
pub use error::*;
pub use events::*;
pub use models::*;
pub use state_machine::*;
pub use store::*;
pub use sweeper::*;
