//! Error types for the booking domain

use crate::types::AppointmentId;
use thiserror::Error;

/// Core booking domain errors
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("appointment not found: {0}")]
    AppointmentNotFound(AppointmentId),

    #[error("provider not found")]
    ProviderNotFound,

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("invalid input: {0}")]
    BadInput(String),

    #[error("slot already taken")]
    SlotTaken,

    #[error("permission denied")]
    Forbidden,

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for booking operations
pub type BookingResult<T> = Result<T, BookingError>;
