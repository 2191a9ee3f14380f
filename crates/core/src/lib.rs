//! Identifiers and the error taxonomy shared by every crate.
//!
//! No IO lives here.

pub mod error;
pub mod id;

pub use error::{AssignmentFailure, CoreError, CoreResult};
pub use id::UserId;
