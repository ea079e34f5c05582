/// Outbox table access. Event rows are inserted inside the same
/// transaction as the state change they announce; the dispatcher in
/// `services::outbox` drains them afterwards.
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct OutboxRecord {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub last_error: Option<String>,
}

/// Enqueue an event inside an open transaction. If the transaction
/// rolls back, the event row vanishes with it.
pub async fn insert_event(
    tx: &mut Transaction<'_, Postgres>,
    aggregate_type: &str,
    aggregate_id: Uuid,
    event_type: &str,
    payload: &Value,
) -> Result<Uuid> {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO outbox_events (
            id, aggregate_type, aggregate_id, event_type,
            payload, created_at, retry_count
        )
        VALUES ($1, $2, $3, $4, $5, $6, 0)
        "#,
    )
    .bind(id)
    .bind(aggregate_type)
    .bind(aggregate_id)
    .bind(event_type)
    .bind(payload)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(id)
}

/// Fetch the oldest undelivered events, bounded by `batch_size`, skipping
/// rows that have exhausted their retries.
pub async fn fetch_unpublished(
    pool: &PgPool,
    batch_size: i64,
    max_retries: i32,
) -> Result<Vec<OutboxRecord>> {
    let records = sqlx::query_as::<_, OutboxRecord>(
        r#"
        SELECT *
        FROM outbox_events
        WHERE published_at IS NULL
          AND retry_count < $2
        ORDER BY created_at ASC
        LIMIT $1
        "#,
    )
    .bind(batch_size)
    .bind(max_retries)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

pub async fn mark_published(pool: &PgPool, event_id: Uuid) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE outbox_events
        SET published_at = $2, last_error = NULL
        WHERE id = $1
        "#,
    )
    .bind(event_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn mark_failed(pool: &PgPool, event_id: Uuid, error: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE outbox_events
        SET retry_count = retry_count + 1, last_error = $2
        WHERE id = $1
        "#,
    )
    .bind(event_id)
    .bind(error)
    .execute(pool)
    .await?;

    Ok(())
}
