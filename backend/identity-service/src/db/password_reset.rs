/// One-time password-reset credentials. The secret never touches the
/// table; only its digest is stored.
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub async fn create_reset_token(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &str,
    ttl_minutes: i64,
) -> Result<PasswordResetRecord> {
    let now = Utc::now();

    let record = sqlx::query_as::<_, PasswordResetRecord>(
        r#"
        INSERT INTO password_resets (
            id, user_id, token_hash, expires_at, is_used, created_at
        )
        VALUES ($1, $2, $3, $4, FALSE, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(token_hash)
    .bind(now + Duration::minutes(ttl_minutes))
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(record)
}

/// Look up a reset credential that is still spendable
pub async fn find_usable(pool: &PgPool, token_hash: &str) -> Result<Option<PasswordResetRecord>> {
    let record = sqlx::query_as::<_, PasswordResetRecord>(
        r#"
        SELECT *
        FROM password_resets
        WHERE token_hash = $1
          AND is_used = FALSE
          AND expires_at > $2
        "#,
    )
    .bind(token_hash)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Spend a reset credential. The WHERE clause guards against double use,
/// so only one caller ever sees `true`.
pub async fn mark_token_used(pool: &PgPool, reset_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE password_resets
        SET is_used = TRUE, used_at = $2
        WHERE id = $1 AND is_used = FALSE
        "#,
    )
    .bind(reset_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
