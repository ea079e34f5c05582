/// Locally stored one-time phone codes, used when no external verification
/// provider is configured. Codes are stored hashed like every other secret.
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct PhoneLoginCode {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub phone_number: String,
    pub code_hash: String,
    pub created_at_utc: DateTime<Utc>,
    pub expires_at_utc: DateTime<Utc>,
    pub used_at_utc: Option<DateTime<Utc>>,
}

pub async fn insert(
    pool: &PgPool,
    phone_number: &str,
    code_hash: &str,
    ttl_minutes: i64,
) -> Result<PhoneLoginCode> {
    let now = Utc::now();

    let record = sqlx::query_as::<_, PhoneLoginCode>(
        r#"
        INSERT INTO phone_login_codes (
            id, phone_number, code_hash, created_at_utc, expires_at_utc
        )
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(phone_number)
    .bind(code_hash)
    .bind(now)
    .bind(now + Duration::minutes(ttl_minutes))
    .fetch_one(pool)
    .await?;

    Ok(record)
}

/// Fetch the newest live code for a phone number. The digest comparison
/// happens in the caller, in constant time, not in the query.
pub async fn find_live(pool: &PgPool, phone_number: &str) -> Result<Option<PhoneLoginCode>> {
    let record = sqlx::query_as::<_, PhoneLoginCode>(
        r#"
        SELECT *
        FROM phone_login_codes
        WHERE phone_number = $1
          AND used_at_utc IS NULL
          AND expires_at_utc > $2
        ORDER BY created_at_utc DESC
        LIMIT 1
        "#,
    )
    .bind(phone_number)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Spend a code. The guard on `used_at_utc` means only one caller ever
/// sees `true` for a given row.
pub async fn mark_used(pool: &PgPool, code_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE phone_login_codes
        SET used_at_utc = $2
        WHERE id = $1 AND used_at_utc IS NULL
        "#,
    )
    .bind(code_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Drop expired or spent codes. Meant for periodic housekeeping.
pub async fn purge_stale(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM phone_login_codes WHERE used_at_utc IS NOT NULL OR expires_at_utc <= $1",
    )
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
