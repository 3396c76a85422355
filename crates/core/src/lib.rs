//! Slotbook Core - Domain logic and models
//!
//! This crate contains pure domain logic with no I/O operations.
//! All database models, slot arithmetic, and error types are defined here.

pub mod config;
pub mod error;
pub mod models;
pub mod slots;
pub mod timezone;
pub mod types;

pub use error::{BookingError, BookingResult};
pub use slots::{candidate_slots, day_window_utc, weekday_index, within_block};
pub use timezone::{now_in, parse_timezone, resolve_local, to_timezone, to_utc};
