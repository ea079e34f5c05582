use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Role label on the membership created for a tenant's creator
pub const OWNER_MEMBERSHIP_ROLE: &str = "Owner";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub legal_name: Option<String>,
    pub is_active: bool,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Branch {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub is_active: bool,
    pub created_at_utc: DateTime<Utc>,
}

/// Links a principal to a tenant with a role label, unique per (tenant, user).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TenantMembership {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub is_active: bool,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTenantRequest {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    pub legal_name: Option<String>,
}

/// Tenant creation elevates the creator to manager and returns a fresh
/// session for the elevated principal alongside the tenant id.
#[derive(Debug, Clone, Serialize)]
pub struct CreateTenantResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in_minutes: i64,
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBranchRequest {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    pub code: Option<String>,
}
