/// Refresh-token store. Rotation is a single conditional UPDATE plus an
/// INSERT in one transaction, so two racing presentations of the same
/// token can never both win.
use crate::error::Result;
use crate::models::RefreshTokenRecord;
use chrono::{Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// The identity attached to a token that was successfully rotated
#[derive(Debug, Clone)]
pub struct RotationOutcome {
    pub user_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub new_record: RefreshTokenRecord,
}

/// Persist a freshly issued refresh token
pub async fn create(
    pool: &PgPool,
    user_id: Uuid,
    branch_id: Option<Uuid>,
    token_hash: &str,
    ttl_days: i64,
) -> Result<RefreshTokenRecord> {
    let now = Utc::now();

    let record = sqlx::query_as::<_, RefreshTokenRecord>(
        r#"
        INSERT INTO refresh_tokens (
            id, user_id, branch_id, token_hash,
            created_at_utc, expires_at_utc
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(branch_id)
    .bind(token_hash)
    .bind(now)
    .bind(now + Duration::days(ttl_days))
    .fetch_one(pool)
    .await?;

    Ok(record)
}

/// Same as [`create`] but rides an open transaction
pub async fn create_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    branch_id: Option<Uuid>,
    token_hash: &str,
    ttl_days: i64,
) -> Result<RefreshTokenRecord> {
    let now = Utc::now();

    let record = sqlx::query_as::<_, RefreshTokenRecord>(
        r#"
        INSERT INTO refresh_tokens (
            id, user_id, branch_id, token_hash,
            created_at_utc, expires_at_utc
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(branch_id)
    .bind(token_hash)
    .bind(now)
    .bind(now + Duration::days(ttl_days))
    .fetch_one(&mut **tx)
    .await?;

    Ok(record)
}

pub async fn find_by_hash(pool: &PgPool, token_hash: &str) -> Result<Option<RefreshTokenRecord>> {
    let record =
        sqlx::query_as::<_, RefreshTokenRecord>("SELECT * FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(pool)
            .await?;

    Ok(record)
}

/// Atomically consume a live token and mint its replacement.
///
/// The UPDATE only matches a row that is unrevoked and unexpired, so of
/// any number of concurrent callers presenting the same secret exactly
/// one observes `rows_affected == 1`. Losers get `Ok(None)` and must be
/// treated as unauthorized. The expiry check is strict: a token whose
/// `expires_at_utc` equals the current instant is already dead.
pub async fn consume_for_rotation(
    pool: &PgPool,
    presented_hash: &str,
    replacement_hash: &str,
    ttl_days: i64,
) -> Result<Option<RotationOutcome>> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, RefreshTokenRecord>(
        r#"
        UPDATE refresh_tokens
        SET revoked_at_utc = $2, replaced_by_token_hash = $3
        WHERE token_hash = $1
          AND revoked_at_utc IS NULL
          AND expires_at_utc > $2
        RETURNING *
        "#,
    )
    .bind(presented_hash)
    .bind(now)
    .bind(replacement_hash)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(consumed) = row else {
        tx.rollback().await?;
        return Ok(None);
    };

    let new_record = create_in_tx(
        &mut tx,
        consumed.user_id,
        consumed.branch_id,
        replacement_hash,
        ttl_days,
    )
    .await?;

    tx.commit().await?;

    Ok(Some(RotationOutcome {
        user_id: consumed.user_id,
        branch_id: consumed.branch_id,
        new_record,
    }))
}

/// Revoke every live token a principal holds (logout-everywhere)
pub async fn revoke_all_for_user(pool: &PgPool, user_id: Uuid) -> Result<u64> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked_at_utc = $2
        WHERE user_id = $1 AND revoked_at_utc IS NULL AND expires_at_utc > $2
        "#,
    )
    .bind(user_id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
