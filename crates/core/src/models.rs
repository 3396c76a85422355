//! Core domain models for Slotbook
//!
//! These models represent the core business entities and map to database tables.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{AppointmentId, ProviderId, UserId};

/// Outbox event type emitted when an appointment is booked
pub const EVENT_APPT_CREATED: &str = "APPT_CREATED";
/// Outbox event type emitted when an appointment is canceled
pub const EVENT_APPT_CANCELED: &str = "APPT_CANCELED";
/// Aggregate type for appointment outbox events
pub const AGGREGATE_APPOINTMENT: &str = "Appointment";

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[derive(sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub phone: Option<String>, // notification recipient, E.164
    pub created_at: DateTime<Utc>,
}

/// Establishment entity (a place providers work out of)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[derive(sqlx::FromRow)]
pub struct Establishment {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Provider entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[derive(sqlx::FromRow)]
pub struct Provider {
    pub id: ProviderId,
    pub user_id: UserId,
    pub establishment_id: Option<Uuid>,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Weekly work-hour block for a provider
///
/// `weekday` follows the storage convention 0=Sunday .. 6=Saturday.
/// Times are local wall-clock times of day; a block never spans midnight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[derive(sqlx::FromRow)]
pub struct WorkHourBlock {
    pub id: i64,
    pub provider_id: ProviderId,
    pub weekday: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Appointment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[derive(sqlx::FromRow)]
pub struct Appointment {
    pub id: AppointmentId,
    pub user_id: UserId,
    pub provider_id: ProviderId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Appointment status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Canceled,
}

/// Refresh token row; the plaintext token is `"{id}.{secret}"` and only the
/// secret's argon2 hash is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[derive(sqlx::FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: UserId,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Outbox event appended in the same transaction as the business write
///
/// `event_type` stays a free-form string: the relay must be able to skip over
/// event types it does not recognize while still marking them published.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[derive(sqlx::FromRow)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub headers: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Notification delivery row, created by the relay and updated by the
/// dispatcher and the requeue janitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[derive(sqlx::FromRow)]
pub struct NotificationMessage {
    pub id: i64,
    pub channel: String, // 'whatsapp' | 'sms'
    pub recipient: String,
    pub template: String,
    pub variables: Option<serde_json::Value>,
    pub status: NotificationStatus,
    pub attempts: i16,
    pub last_error: Option<String>,
    pub appointment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Notification message status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationStatus {
    Queued,
    Sent,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appointment_status_serialization() {
        let json = serde_json::to_string(&AppointmentStatus::Pending).unwrap();
        assert_eq!(json, "\"PENDING\"");
        let back: AppointmentStatus = serde_json::from_str("\"CANCELED\"").unwrap();
        assert_eq!(back, AppointmentStatus::Canceled);
    }

    #[test]
    fn test_notification_status_serialization() {
        let json = serde_json::to_string(&NotificationStatus::Queued).unwrap();
        assert_eq!(json, "\"QUEUED\"");
        let back: NotificationStatus = serde_json::from_str("\"SENT\"").unwrap();
        assert_eq!(back, NotificationStatus::Sent);
    }

    #[test]
    fn test_event_type_constants() {
        assert_eq!(EVENT_APPT_CREATED.to_lowercase(), "appt_created");
        assert_eq!(EVENT_APPT_CANCELED.to_lowercase(), "appt_canceled");
    }
}
