//! Error handling for API endpoints

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use slotbook_core::BookingError;

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// API error type that can be converted to HTTP responses
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden,
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, detail) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found", Some(msg)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad Request", Some(msg)),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "Unauthorized", Some(msg)),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden", None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg)),
            ApiError::Internal(msg) => {
                tracing::error!("Internal server error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            detail,
        });

        (status, body).into_response()
    }
}

/// Convert BookingError to ApiError
impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::AppointmentNotFound(id) => {
                ApiError::NotFound(format!("appointment not found: {}", id))
            }
            BookingError::ProviderNotFound => ApiError::NotFound("provider not found".to_string()),
            BookingError::InvalidTimezone(tz) => {
                ApiError::BadRequest(format!("invalid timezone: {}", tz))
            }
            BookingError::BadInput(msg) => ApiError::BadRequest(msg),
            BookingError::SlotTaken => ApiError::Conflict("slot already taken".to_string()),
            BookingError::Forbidden => ApiError::Forbidden,
            BookingError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

/// Convert sqlx errors to ApiError
///
/// The partial unique index on appointments is the one place a constraint
/// violation is an expected business outcome; it surfaces as 409.
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("resource not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.constraint() {
                Some("uq_appointments_provider_slot") => {
                    ApiError::Conflict("slot already taken".to_string())
                }
                _ => ApiError::Internal(format!("database error: {}", db_err)),
            },
            _ => ApiError::Internal(format!("database error: {}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotbook_core::types::AppointmentId;

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            error: "Not Found".to_string(),
            detail: Some("resource does not exist".to_string()),
        };

        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("Not Found"));
        assert!(json.contains("resource does not exist"));
    }

    #[test]
    fn test_error_response_without_detail() {
        let error = ErrorResponse {
            error: "Forbidden".to_string(),
            detail: None,
        };

        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("Forbidden"));
        assert!(!json.contains("detail"));
    }

    #[test]
    fn test_slot_taken_conversion() {
        let api_err: ApiError = BookingError::SlotTaken.into();
        match api_err {
            ApiError::Conflict(msg) => assert_eq!(msg, "slot already taken"),
            _ => panic!("Expected Conflict error"),
        }
    }

    #[test]
    fn test_appointment_not_found_conversion() {
        let id = AppointmentId::new();
        let api_err: ApiError = BookingError::AppointmentNotFound(id).into();
        match api_err {
            ApiError::NotFound(msg) => assert!(msg.contains(&id.to_string())),
            _ => panic!("Expected NotFound error"),
        }
    }

    #[test]
    fn test_forbidden_conversion() {
        let api_err: ApiError = BookingError::Forbidden.into();
        match api_err {
            ApiError::Forbidden => {}
            _ => panic!("Expected Forbidden error"),
        }
    }
}
