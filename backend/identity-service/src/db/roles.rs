/// Role catalog queries
use crate::error::Result;
use crate::models::RoleRecord;
use sqlx::PgPool;

pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<RoleRecord>> {
    let role = sqlx::query_as::<_, RoleRecord>("SELECT * FROM roles WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    Ok(role)
}

pub async fn list(pool: &PgPool) -> Result<Vec<RoleRecord>> {
    let roles = sqlx::query_as::<_, RoleRecord>("SELECT * FROM roles ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(roles)
}

/// Insert a role if no row with the same name exists. Returns true when a
/// row was written, false when the name was already present. Existing rows
/// are never modified, which is what makes seeding idempotent.
pub async fn insert_if_absent(pool: &PgPool, record: &RoleRecord) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO roles (id, name, description, is_system)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(record.id)
    .bind(&record.name)
    .bind(&record.description)
    .bind(record.is_system)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
