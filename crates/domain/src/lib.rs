//! Intake domain components.
//!
//! This crate turns a semi-structured submission into catalog terms:
//! - Boundary parsing of `OrderSubmission` payloads
//! - `OrderValidator` for structural completeness
//! - `ProductNameReconciler` with a pluggable `Matcher`
//! - `CustomerResolver` for find-or-create by sender email
//! - `DeduplicationGuard` for windowed repeat detection
//! - Amendment merge rules and per-product quantity deltas

pub mod customer;
pub mod dedup;
pub mod error;
pub mod merge;
pub mod reconciler;
pub mod submission;
pub mod validator;

pub use customer::{ContactDetails, CustomerResolver, ResolvedCustomer};
pub use dedup::{DedupDecision, DeduplicationGuard, same_line_multiset};
pub use error::{CustomerField, DomainError, ErrorKind, RejectReason, Result};
pub use merge::{LineDelta, merge_amendment, quantity_deltas, totals_by_product};
pub use reconciler::{EditDistanceMatcher, Matcher, ProductNameReconciler};
pub use submission::{OrderSubmission, SubmittedCustomer, SubmittedLine};
pub use validator::{OrderValidator, RequestedLine, ValidationMode, ValidationReport};
