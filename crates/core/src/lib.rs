//! `warden-core`: shared primitives for token and authorization handling.
//!
//! Identifiers, claims, time and per-request cancellation. No storage, no
//! transport.

pub mod claims;
pub mod clock;
pub mod context;
pub mod error;
pub mod id;

pub use claims::{Claims, RESERVED_CLAIMS};
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::RequestContext;
pub use error::{Cancelled, InvalidId};
pub use id::{AppId, SubjectId, TenantId, TokenId};
