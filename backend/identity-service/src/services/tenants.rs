/// Tenant provisioning: create a tenant with its Owner membership in one
/// transaction, elevate the creating principal to manager, then mint a
/// session for the elevated principal.
///
/// The tenant + membership insert is the atomicity boundary. The role
/// reassignment and session mint run after that commit; if they fail the
/// tenant stays. Collapsing everything into one transaction would close
/// that window and is the stronger design, but the committed tenant is the
/// contract callers rely on today, so a post-commit failure is surfaced as
/// an error with the tenant intact.
use mesa_crypto::{generate_opaque_secret, hash_secret, AccessTokenIssuer};
use sqlx::PgPool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db::{refresh_tokens, roles, tenants, users};
use crate::error::{IdentityError, Result};
use crate::models::tenant::{
    CreateBranchRequest, CreateTenantRequest, CreateTenantResponse, OWNER_MEMBERSHIP_ROLE,
};
use crate::models::{Branch, Role, Tenant};

pub struct TenantService {
    pool: PgPool,
    issuer: Arc<AccessTokenIssuer>,
}

impl TenantService {
    pub fn new(pool: PgPool, issuer: Arc<AccessTokenIssuer>) -> Self {
        Self { pool, issuer }
    }

    /// Create a tenant and elevate its creator to manager.
    ///
    /// Tenant creation is a one-way privilege escalation: whatever roles
    /// the creator held before are stripped and replaced with exactly
    /// `manager`. That is intentional; creating a tenant always yields
    /// manager-level control of it.
    #[instrument(skip(self, request, ct), fields(tenant_name = %request.name, user_id = %creating_user_id))]
    pub async fn create_tenant(
        &self,
        request: CreateTenantRequest,
        creating_user_id: Uuid,
        ct: &CancellationToken,
    ) -> Result<CreateTenantResponse> {
        request
            .validate()
            .map_err(|e| IdentityError::Validation(e.to_string()))?;

        if tenants::find_by_name(&self.pool, &request.name)
            .await?
            .is_some()
        {
            return Err(IdentityError::Conflict(format!(
                "A tenant named '{}' already exists.",
                request.name
            )));
        }

        if ct.is_cancelled() {
            return Err(IdentityError::Cancelled);
        }

        // Atomicity boundary: tenant and Owner membership land together or
        // not at all.
        let mut tx = self.pool.begin().await?;
        let tenant =
            tenants::create_tenant(&mut tx, &request.name, request.legal_name.as_deref()).await?;
        tenants::create_membership(&mut tx, tenant.id, creating_user_id, OWNER_MEMBERSHIP_ROLE)
            .await?;
        tx.commit().await?;

        // Post-commit tail. Failures from here on leave the tenant in
        // place and surface as errors.
        let elevated = match self.elevate_to_manager(creating_user_id).await {
            Ok(user) => user,
            Err(e) => {
                warn!(
                    tenant_id = %tenant.id,
                    error = %e,
                    "Tenant committed but role elevation failed"
                );
                return Err(e);
            }
        };

        let session = self.mint_session(&elevated).await?;

        info!(tenant_id = %tenant.id, user_id = %creating_user_id, "Created tenant");

        Ok(CreateTenantResponse {
            access_token: session.0,
            refresh_token: session.1,
            token_type: "Bearer".to_string(),
            expires_in_minutes: self.issuer.config().access_token_minutes,
            id: tenant.id,
        })
    }

    pub async fn get_tenant(&self, tenant_id: Uuid) -> Result<Tenant> {
        tenants::find_by_id(&self.pool, tenant_id)
            .await?
            .ok_or_else(|| IdentityError::NotFound(format!("Tenant {tenant_id} not found")))
    }

    /// Create a branch under an existing tenant. Duplicate (tenant, name)
    /// pairs are a `Conflict`.
    #[instrument(skip(self, request), fields(tenant_id = %tenant_id, branch_name = %request.name))]
    pub async fn create_branch(
        &self,
        tenant_id: Uuid,
        request: CreateBranchRequest,
    ) -> Result<Branch> {
        request
            .validate()
            .map_err(|e| IdentityError::Validation(e.to_string()))?;

        if tenants::find_by_id(&self.pool, tenant_id).await?.is_none() {
            return Err(IdentityError::NotFound(format!(
                "Tenant {tenant_id} not found"
            )));
        }

        let branch = tenants::create_branch(
            &self.pool,
            tenant_id,
            &request.name,
            request.code.as_deref(),
        )
        .await?;

        info!(branch_id = %branch.id, "Created branch");
        Ok(branch)
    }

    pub async fn get_branch(&self, branch_id: Uuid) -> Result<Branch> {
        tenants::find_branch(&self.pool, branch_id)
            .await?
            .ok_or_else(|| IdentityError::NotFound(format!("Branch {branch_id} not found")))
    }

    pub async fn list_branches(&self, tenant_id: Uuid) -> Result<Vec<Branch>> {
        if tenants::find_by_id(&self.pool, tenant_id).await?.is_none() {
            return Err(IdentityError::NotFound(format!(
                "Tenant {tenant_id} not found"
            )));
        }
        tenants::list_branches(&self.pool, tenant_id).await
    }

    /// Strip every role the principal holds and assign exactly `manager`.
    /// The manager role must already be seeded.
    async fn elevate_to_manager(&self, user_id: Uuid) -> Result<crate::models::User> {
        let user = users::find_by_id(&self.pool, user_id)
            .await?
            .ok_or_else(|| IdentityError::NotFound(format!("User {user_id} not found")))?;

        let manager = roles::find_by_name(&self.pool, Role::Manager.as_str())
            .await?
            .ok_or_else(|| {
                IdentityError::Internal("Manager role has not been seeded".to_string())
            })?;

        let mut tx = self.pool.begin().await?;
        users::clear_roles(&mut tx, user.id).await?;
        users::assign_role(&mut tx, user.id, manager.id).await?;
        tx.commit().await?;

        Ok(user)
    }

    async fn mint_session(&self, user: &crate::models::User) -> Result<(String, String)> {
        let roles = users::get_roles(&self.pool, user.id).await?;

        let access_token = self.issuer.create_access_token(
            user.id,
            user.email.as_deref(),
            user.branch_id,
            &roles,
        )?;

        let refresh_secret = generate_opaque_secret();
        refresh_tokens::create(
            &self.pool,
            user.id,
            user.branch_id,
            &hash_secret(&refresh_secret),
            self.issuer.config().refresh_token_days,
        )
        .await?;

        Ok((access_token, refresh_secret))
    }
}
