//! Database repositories
//!
//! Each module owns the SQL for one aggregate. Write paths that must be
//! atomic (appointment + outbox event) expose transaction-scoped variants.

pub mod appointments;
pub mod outbox;
pub mod providers;
pub mod refresh_tokens;
pub mod users;
pub mod work_hours;
