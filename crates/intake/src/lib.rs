//! Order intake pipeline.
//!
//! `IntakeService` runs each submission through validation, name
//! reconciliation, deduplication, customer resolution, inventory
//! reservation and persistence, then hands the outcome to a
//! `NotificationDispatcher`.

pub mod config;
pub mod error;
pub mod locks;
pub mod notify;
pub mod outcome;
pub mod reservation;
pub mod service;
pub mod state_machine;
pub mod telemetry;

pub use config::{IntakeConfig, LogFormat};
pub use error::{IntakeError, Result};
pub use locks::CustomerLocks;
pub use notify::{
    InMemoryDispatcher, Notification, NotificationDispatcher, NotificationKind, TracingDispatcher,
};
pub use outcome::{NotifyDirective, OrderOutcome, OutcomeKind};
pub use reservation::{Reservation, ReservationEngine};
pub use service::{IntakeService, SubmissionKind, connect_postgres};
pub use state_machine::{OrderDraft, OrderStateMachine};
