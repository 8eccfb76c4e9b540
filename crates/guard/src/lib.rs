//! `warden-guard`: request boundary tying tokens, identity and authorization
//! together.
//!
//! Transport-agnostic: callers hand over the bearer value (or the raw
//! `Authorization` header) and the target, and get back an allow or a
//! generic denial.

pub mod bearer;
pub mod config;
pub mod error;
pub mod guard;

pub use bearer::extract_bearer;
pub use config::WardenConfig;
pub use error::GuardError;
pub use guard::{Authorized, Denial, DenialStage, Guard, GuardOutcome, Target};
