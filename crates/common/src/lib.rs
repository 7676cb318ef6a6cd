//! Shared types used across the order intake crates.

pub mod email;
pub mod status;
pub mod types;

pub use email::{EmailAddress, InvalidEmail};
pub use status::{OrderStatus, UnknownStatus};
pub use types::OrderId;
