/// Tenant, branch and membership queries
use crate::db;
use crate::error::{IdentityError, Result};
use crate::models::{Branch, Tenant, TenantMembership};
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

pub async fn find_by_id(pool: &PgPool, tenant_id: Uuid) -> Result<Option<Tenant>> {
    let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?;

    Ok(tenant)
}

pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Tenant>> {
    let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    Ok(tenant)
}

pub async fn create_tenant(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
    legal_name: Option<&str>,
) -> Result<Tenant> {
    let tenant = sqlx::query_as::<_, Tenant>(
        r#"
        INSERT INTO tenants (id, name, legal_name, is_active, created_at_utc)
        VALUES ($1, $2, $3, TRUE, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(legal_name)
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            IdentityError::Conflict(format!("A tenant named '{name}' already exists."))
        } else {
            IdentityError::from(e)
        }
    })?;

    Ok(tenant)
}

pub async fn create_membership(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    user_id: Uuid,
    role: &str,
) -> Result<TenantMembership> {
    let membership = sqlx::query_as::<_, TenantMembership>(
        r#"
        INSERT INTO tenant_users (id, tenant_id, user_id, role, is_active, created_at_utc)
        VALUES ($1, $2, $3, $4, TRUE, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(user_id)
    .bind(role)
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            IdentityError::Conflict("The user already belongs to this tenant.".to_string())
        } else {
            IdentityError::from(e)
        }
    })?;

    Ok(membership)
}

pub async fn find_membership(
    pool: &PgPool,
    tenant_id: Uuid,
    user_id: Uuid,
) -> Result<Option<TenantMembership>> {
    let membership = sqlx::query_as::<_, TenantMembership>(
        "SELECT * FROM tenant_users WHERE tenant_id = $1 AND user_id = $2",
    )
    .bind(tenant_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(membership)
}

pub async fn create_branch(
    pool: &PgPool,
    tenant_id: Uuid,
    name: &str,
    code: Option<&str>,
) -> Result<Branch> {
    let branch = sqlx::query_as::<_, Branch>(
        r#"
        INSERT INTO branches (id, tenant_id, name, code, is_active, created_at_utc)
        VALUES ($1, $2, $3, $4, TRUE, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(name)
    .bind(code)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            IdentityError::Conflict(format!(
                "A branch named '{name}' already exists in this tenant."
            ))
        } else {
            IdentityError::from(e)
        }
    })?;

    Ok(branch)
}

pub async fn list_branches(pool: &PgPool, tenant_id: Uuid) -> Result<Vec<Branch>> {
    let branches =
        sqlx::query_as::<_, Branch>("SELECT * FROM branches WHERE tenant_id = $1 ORDER BY name")
            .bind(tenant_id)
            .fetch_all(pool)
            .await?;

    Ok(branches)
}

pub async fn find_branch(pool: &PgPool, branch_id: Uuid) -> Result<Option<Branch>> {
    let branch = sqlx::query_as::<_, Branch>("SELECT * FROM branches WHERE id = $1")
        .bind(branch_id)
        .fetch_optional(pool)
        .await?;

    Ok(branch)
}
