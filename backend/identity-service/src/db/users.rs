/// Principal database operations
use crate::db;
use crate::error::{IdentityError, Result};
use crate::models::User;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Fields required to create a principal
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub branch_id: Option<Uuid>,
    pub email: Option<String>,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub password_hash: String,
    pub is_active: bool,
}

/// Find principal by email login handle.
///
/// The same email may legitimately exist under different branches, so the
/// result order is pinned: the oldest active account wins, never whichever
/// row the planner happens to visit first.
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT * FROM users
        WHERE email = $1
        ORDER BY is_active DESC, created_at_utc ASC
        LIMIT 1
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Find principal by phone number. An active principal wins over inactive
/// rows that share the number.
pub async fn find_by_phone(pool: &PgPool, phone: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE phone_number = $1 ORDER BY is_active DESC LIMIT 1",
    )
    .bind(phone)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Find principal by id
pub async fn find_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

/// Insert a principal inside an open transaction.
///
/// A unique-constraint hit surfaces as `Conflict` naming the resource that
/// actually collided, resolved from the violated index.
pub async fn create_user(tx: &mut Transaction<'_, Postgres>, new_user: &NewUser) -> Result<User> {
    let now = Utc::now();

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (
            id, branch_id, email, full_name, phone_number,
            password_hash, is_active, created_at_utc
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(new_user.id)
    .bind(new_user.branch_id)
    .bind(&new_user.email)
    .bind(&new_user.full_name)
    .bind(&new_user.phone_number)
    .bind(&new_user.password_hash)
    .bind(new_user.is_active)
    .bind(now)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            let constraint = e
                .as_database_error()
                .and_then(|db_err| db_err.constraint())
                .unwrap_or_default();
            if constraint == "users_active_phone_key" {
                IdentityError::Conflict(
                    "A user with this phone number already exists.".to_string(),
                )
            } else {
                IdentityError::Conflict(
                    "A user with this branch and email already exists.".to_string(),
                )
            }
        } else {
            IdentityError::from(e)
        }
    })?;

    Ok(user)
}

/// Replace a principal's credential hash
pub async fn update_password_hash(pool: &PgPool, user_id: Uuid, password_hash: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET password_hash = $1, updated_at_utc = $2
        WHERE id = $3
        "#,
    )
    .bind(password_hash)
    .bind(Utc::now())
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Resolve a principal's role names
pub async fn get_roles(pool: &PgPool, user_id: Uuid) -> Result<Vec<String>> {
    let roles = sqlx::query_scalar::<_, String>(
        r#"
        SELECT r.name
        FROM user_roles ur
        JOIN roles r ON r.id = ur.role_id
        WHERE ur.user_id = $1
        ORDER BY r.name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(roles)
}

/// Assign a role inside an open transaction. The role must already exist.
pub async fn assign_role(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    role_id: Uuid,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_roles (user_id, role_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, role_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(role_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Strip every role from a principal inside an open transaction
pub async fn clear_roles(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}
