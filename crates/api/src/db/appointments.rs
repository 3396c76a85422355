//! Appointment repository and booking operations
//!
//! Slot uniqueness is enforced by the partial unique index
//! `uq_appointments_provider_slot`, never by an advisory read: concurrent
//! writers race to the insert and exactly one wins.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use slotbook_core::models::{
    AGGREGATE_APPOINTMENT, Appointment, AppointmentStatus, EVENT_APPT_CANCELED,
    EVENT_APPT_CREATED,
};
use slotbook_core::types::{AppointmentId, ProviderId, UserId};
use slotbook_core::{now_in, parse_timezone, to_utc, weekday_index, within_block};
use sqlx::{PgPool, Postgres, Transaction};

use crate::db::{outbox, work_hours};
use crate::error::ApiError;

/// Validate and book a slot, atomically pairing the appointment row with an
/// APPT_CREATED outbox event.
pub async fn create_appointment(
    pool: &PgPool,
    user_id: UserId,
    provider_id: ProviderId,
    starts_at_iso: &str,
    tz: &str,
    slot: Duration,
) -> Result<Appointment, ApiError> {
    let tzinfo = parse_timezone(tz)?;

    // Offset-bearing instants only; a naive datetime is ambiguous input.
    let starts_at = DateTime::parse_from_rfc3339(starts_at_iso).map_err(|_| {
        ApiError::BadRequest("starts_at_iso must be an ISO-8601 instant with offset".to_string())
    })?;
    let starts_local = starts_at.with_timezone(&tzinfo);

    if starts_local <= now_in(tzinfo) {
        return Err(ApiError::BadRequest("cannot book in the past".to_string()));
    }

    let weekday = weekday_index(starts_local.date_naive());
    let blocks = work_hours::blocks_for(pool, provider_id, weekday).await?;
    let fits = blocks
        .iter()
        .any(|b| within_block(starts_local.naive_local(), b.start_time, b.end_time, slot));
    if !fits {
        return Err(ApiError::BadRequest(
            "outside provider work hours".to_string(),
        ));
    }

    let starts_utc = to_utc(&starts_local);
    let ends_utc = starts_utc + slot;

    let mut tx = pool.begin().await?;

    let appt = insert_pending_tx(&mut tx, user_id, provider_id, starts_utc, ends_utc).await?;

    outbox::append_tx(
        &mut tx,
        AGGREGATE_APPOINTMENT,
        appt.id.into(),
        EVENT_APPT_CREATED,
        json!({
            "provider_id": provider_id,
            "starts_at": starts_utc.to_rfc3339(),
        }),
    )
    .await?;

    tx.commit().await?;

    Ok(appt)
}

/// Insert a PENDING appointment inside the caller's transaction
///
/// A violation of the partial unique index surfaces as 409.
async fn insert_pending_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    provider_id: ProviderId,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> Result<Appointment, ApiError> {
    let appt = sqlx::query_as::<_, Appointment>(
        r#"
        INSERT INTO appointments (user_id, provider_id, starts_at, ends_at, status)
        VALUES ($1, $2, $3, $4, 'PENDING')
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(provider_id)
    .bind(starts_at)
    .bind(ends_at)
    .fetch_one(&mut **tx)
    .await?;

    Ok(appt)
}

/// Get an appointment by id
pub async fn get_appointment(
    pool: &PgPool,
    appt_id: AppointmentId,
) -> Result<Appointment, ApiError> {
    let appt = sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = $1")
        .bind(appt_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("appointment not found: {}", appt_id)))?;

    Ok(appt)
}

/// Cancel an appointment on behalf of its owner
///
/// Idempotent: canceling an already-canceled appointment succeeds without
/// emitting a second outbox event.
pub async fn cancel_appointment(
    pool: &PgPool,
    appt_id: AppointmentId,
    user_id: UserId,
) -> Result<Appointment, ApiError> {
    let appt = get_appointment(pool, appt_id).await?;

    if appt.user_id != user_id {
        return Err(ApiError::Forbidden);
    }

    if appt.status == AppointmentStatus::Canceled {
        return Ok(appt);
    }

    let mut tx = pool.begin().await?;

    let appt = sqlx::query_as::<_, Appointment>(
        r#"
        UPDATE appointments
        SET status = 'CANCELED',
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(appt_id)
    .fetch_one(&mut *tx)
    .await?;

    outbox::append_tx(
        &mut tx,
        AGGREGATE_APPOINTMENT,
        appt.id.into(),
        EVENT_APPT_CANCELED,
        json!({ "starts_at": appt.starts_at.to_rfc3339() }),
    )
    .await?;

    tx.commit().await?;

    Ok(appt)
}

/// All appointments booked by a user, most recent slot first
pub async fn list_by_user(pool: &PgPool, user_id: UserId) -> Result<Vec<Appointment>, ApiError> {
    let appts = sqlx::query_as::<_, Appointment>(
        r#"
        SELECT * FROM appointments
        WHERE user_id = $1
        ORDER BY starts_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(appts)
}

/// Slot starts held by live (PENDING/CONFIRMED) appointments within a
/// half-open UTC window
pub async fn slots_taken(
    pool: &PgPool,
    provider_id: ProviderId,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>, ApiError> {
    let taken = sqlx::query_scalar::<_, DateTime<Utc>>(
        r#"
        SELECT starts_at FROM appointments
        WHERE provider_id = $1
          AND status IN ('PENDING', 'CONFIRMED')
          AND starts_at >= $2
          AND starts_at < $3
        "#,
    )
    .bind(provider_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    Ok(taken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    async fn seed_provider_with_monday_hours(pool: &PgPool) -> (UserId, ProviderId) {
        let user_id: UserId = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash, phone) VALUES ($1, 'x', '+5511999990000') RETURNING id",
        )
        .bind(format!("user-{}@example.com", uuid::Uuid::new_v4()))
        .fetch_one(pool)
        .await
        .unwrap();

        let provider_id: ProviderId = sqlx::query_scalar(
            "INSERT INTO providers (user_id, display_name) VALUES ($1, 'Dr. Test') RETURNING id",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap();

        // Monday (weekday 1 under 0=Sunday), 09:00-12:00 local
        sqlx::query(
            "INSERT INTO provider_work_hours (provider_id, weekday, start_time, end_time) VALUES ($1, 1, $2, $3)",
        )
        .bind(provider_id)
        .bind(NaiveTime::from_hms_opt(9, 0, 0).unwrap())
        .bind(NaiveTime::from_hms_opt(12, 0, 0).unwrap())
        .execute(pool)
        .await
        .unwrap();

        (user_id, provider_id)
    }

    // 2030-01-07 is a Monday, comfortably in the future relative to test runs.
    const MONDAY_0900_SP: &str = "2030-01-07T09:00:00-03:00";
    const TZ_SP: &str = "America/Sao_Paulo";

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_create_appointment_persists_utc_and_outbox(pool: PgPool) {
        let (user_id, provider_id) = seed_provider_with_monday_hours(&pool).await;

        let appt = create_appointment(
            &pool,
            user_id,
            provider_id,
            MONDAY_0900_SP,
            TZ_SP,
            Duration::minutes(30),
        )
        .await
        .unwrap();

        assert_eq!(appt.status, AppointmentStatus::Pending);
        assert_eq!(
            appt.starts_at,
            "2030-01-07T12:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(appt.ends_at - appt.starts_at, Duration::minutes(30));

        let (event_type, aggregate_id): (String, uuid::Uuid) = sqlx::query_as(
            "SELECT event_type, aggregate_id FROM outbox WHERE aggregate_id = $1",
        )
        .bind(uuid::Uuid::from(appt.id))
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(event_type, EVENT_APPT_CREATED);
        assert_eq!(aggregate_id, uuid::Uuid::from(appt.id));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_double_booking_conflicts(pool: PgPool) {
        let (user_id, provider_id) = seed_provider_with_monday_hours(&pool).await;
        let slot = Duration::minutes(30);

        create_appointment(&pool, user_id, provider_id, MONDAY_0900_SP, TZ_SP, slot)
            .await
            .unwrap();

        let second =
            create_appointment(&pool, user_id, provider_id, MONDAY_0900_SP, TZ_SP, slot).await;

        match second {
            Err(ApiError::Conflict(msg)) => assert_eq!(msg, "slot already taken"),
            other => panic!("expected Conflict, got {:?}", other.map(|a| a.id)),
        }

        // exactly one outbox event was committed
        let events: i64 = sqlx::query_scalar("SELECT count(*) FROM outbox")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(events, 1);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_canceled_slot_can_be_rebooked(pool: PgPool) {
        let (user_id, provider_id) = seed_provider_with_monday_hours(&pool).await;
        let slot = Duration::minutes(30);

        let appt =
            create_appointment(&pool, user_id, provider_id, MONDAY_0900_SP, TZ_SP, slot)
                .await
                .unwrap();
        cancel_appointment(&pool, appt.id, user_id).await.unwrap();

        // the partial index only covers live rows, so the slot frees up
        let rebooked =
            create_appointment(&pool, user_id, provider_id, MONDAY_0900_SP, TZ_SP, slot)
                .await
                .unwrap();
        assert_ne!(rebooked.id, appt.id);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_booking_outside_work_hours_rejected(pool: PgPool) {
        let (user_id, provider_id) = seed_provider_with_monday_hours(&pool).await;

        // 12:30 is past the block end
        let result = create_appointment(
            &pool,
            user_id,
            provider_id,
            "2030-01-07T12:30:00-03:00",
            TZ_SP,
            Duration::minutes(30),
        )
        .await;

        match result {
            Err(ApiError::BadRequest(msg)) => assert_eq!(msg, "outside provider work hours"),
            other => panic!("expected BadRequest, got {:?}", other.map(|a| a.id)),
        }
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_booking_in_the_past_rejected(pool: PgPool) {
        let (user_id, provider_id) = seed_provider_with_monday_hours(&pool).await;

        // 2019-01-07 was also a Monday
        let result = create_appointment(
            &pool,
            user_id,
            provider_id,
            "2019-01-07T09:00:00-03:00",
            TZ_SP,
            Duration::minutes(30),
        )
        .await;

        match result {
            Err(ApiError::BadRequest(msg)) => assert_eq!(msg, "cannot book in the past"),
            other => panic!("expected BadRequest, got {:?}", other.map(|a| a.id)),
        }
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_naive_instant_rejected(pool: PgPool) {
        let (user_id, provider_id) = seed_provider_with_monday_hours(&pool).await;

        let result = create_appointment(
            &pool,
            user_id,
            provider_id,
            "2030-01-07T09:00:00",
            TZ_SP,
            Duration::minutes(30),
        )
        .await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_cancel_is_idempotent_and_emits_once(pool: PgPool) {
        let (user_id, provider_id) = seed_provider_with_monday_hours(&pool).await;

        let appt = create_appointment(
            &pool,
            user_id,
            provider_id,
            MONDAY_0900_SP,
            TZ_SP,
            Duration::minutes(30),
        )
        .await
        .unwrap();

        let first = cancel_appointment(&pool, appt.id, user_id).await.unwrap();
        assert_eq!(first.status, AppointmentStatus::Canceled);

        let second = cancel_appointment(&pool, appt.id, user_id).await.unwrap();
        assert_eq!(second.status, AppointmentStatus::Canceled);

        let cancel_events: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM outbox WHERE aggregate_id = $1 AND event_type = $2",
        )
        .bind(uuid::Uuid::from(appt.id))
        .bind(EVENT_APPT_CANCELED)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(cancel_events, 1);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_cancel_by_non_owner_forbidden(pool: PgPool) {
        let (user_id, provider_id) = seed_provider_with_monday_hours(&pool).await;

        let appt = create_appointment(
            &pool,
            user_id,
            provider_id,
            MONDAY_0900_SP,
            TZ_SP,
            Duration::minutes(30),
        )
        .await
        .unwrap();

        let stranger: UserId = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash) VALUES ($1, 'x') RETURNING id",
        )
        .bind(format!("stranger-{}@example.com", uuid::Uuid::new_v4()))
        .fetch_one(&pool)
        .await
        .unwrap();

        let result = cancel_appointment(&pool, appt.id, stranger).await;
        assert!(matches!(result, Err(ApiError::Forbidden)));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_slots_taken_window(pool: PgPool) {
        let (user_id, provider_id) = seed_provider_with_monday_hours(&pool).await;

        let appt = create_appointment(
            &pool,
            user_id,
            provider_id,
            MONDAY_0900_SP,
            TZ_SP,
            Duration::minutes(30),
        )
        .await
        .unwrap();

        let from = "2030-01-07T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let to = "2030-01-08T00:00:00Z".parse::<DateTime<Utc>>().unwrap();

        let taken = slots_taken(&pool, provider_id, from, to).await.unwrap();
        assert_eq!(taken, vec![appt.starts_at]);

        // canceled rows drop out of the window
        cancel_appointment(&pool, appt.id, user_id).await.unwrap();
        let taken = slots_taken(&pool, provider_id, from, to).await.unwrap();
        assert!(taken.is_empty());
    }
}
