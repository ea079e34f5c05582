/// Auth orchestrator: register, login, refresh, manager-create-user,
/// phone-first login, PIN login, set-PIN and role seeding.
///
/// Registration writes the principal, its role assignment and the pending
/// `UserRegistered` event row in one transaction. If the event cannot be
/// enqueued the whole registration rolls back, so no principal ever exists
/// without a downstream projection on the way.
use mesa_crypto::{generate_opaque_secret, hash_secret, AccessTokenIssuer};
use mesa_events::{DomainEvent, EventEnvelope, UserRegistered};
use sqlx::PgPool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db::{outbox, password_reset, refresh_tokens, roles, users};
use crate::error::{IdentityError, Result};
use crate::models::user::{
    FirstPhoneLoginRequest, LoginRequest, LoginResponse, ManagerCreateUserRequest,
    ManagerCreateUserResponse, PhoneLoginRequest, PhoneLoginResponse, RefreshRequest,
    RefreshResponse, RegisterRequest, RegisterResponse,
};
use crate::models::{Role, RoleRecord, User};
use crate::security;
use crate::services::phone_verify::PhoneVerification;
use crate::validators;

/// Event source tag stamped on every envelope this service emits
const EVENT_SOURCE: &str = "identity";

/// How long a one-time reset credential minted by set-PIN stays valid
const RESET_TOKEN_TTL_MINUTES: i64 = 15;

pub struct AuthService {
    pool: PgPool,
    issuer: Arc<AccessTokenIssuer>,
    phone_verifier: Arc<dyn PhoneVerification>,
}

impl AuthService {
    pub fn new(
        pool: PgPool,
        issuer: Arc<AccessTokenIssuer>,
        phone_verifier: Arc<dyn PhoneVerification>,
    ) -> Self {
        Self {
            pool,
            issuer,
            phone_verifier,
        }
    }

    // ---------------------------------------------------------------------
    // Register
    // ---------------------------------------------------------------------

    #[instrument(skip(self, request, ct), fields(email = %request.email))]
    pub async fn register(
        &self,
        request: RegisterRequest,
        ct: &CancellationToken,
    ) -> Result<RegisterResponse> {
        request
            .validate()
            .map_err(|e| IdentityError::Validation(e.to_string()))?;
        if !validators::validate_password(&request.password) {
            return Err(IdentityError::Validation(
                "Password must be at least 6 characters with upper, lower and digit".to_string(),
            ));
        }
        if let Some(phone) = request.phone.as_deref() {
            ensure_valid_phone(phone)?;
        }

        let role = self.resolve_role(request.role.as_deref()).await?;
        let password_hash = security::hash_password(&request.password)?;

        ensure_not_cancelled(ct)?;

        let new_user = users::NewUser {
            id: Uuid::new_v4(),
            branch_id: request.branch_id,
            email: Some(request.email.clone()),
            full_name: request.full_name.clone(),
            phone_number: request.phone.clone(),
            password_hash,
            is_active: request.is_active.unwrap_or(true),
        };

        let mut tx = self.pool.begin().await?;

        let user = users::create_user(&mut tx, &new_user).await?;
        users::assign_role(&mut tx, user.id, role.id).await?;

        let event = UserRegistered {
            user_id: user.id,
            branch_id: user.branch_id,
            email: request.email,
            full_name: user.full_name.clone(),
            phone: user.phone_number.clone(),
            role: role.name.clone(),
            is_active: user.is_active,
            registered_at_utc: user.created_at_utc,
            pin_hash: request.pin_hash,
        };
        enqueue_event(&mut tx, &event).await?;

        tx.commit().await?;

        info!(user_id = %user.id, role = %role.name, "Registered principal");

        Ok(RegisterResponse {
            id: user.id,
            email: user.email,
            branch_id: user.branch_id,
            full_name: user.full_name,
            phone_number: user.phone_number,
            role: role.name,
        })
    }

    // ---------------------------------------------------------------------
    // Password login
    // ---------------------------------------------------------------------

    /// Missing principal, inactive principal and wrong password all come
    /// back as the same `Unauthorized`, so login gives no enumeration
    /// signal.
    #[instrument(skip(self, request, ct))]
    pub async fn login(
        &self,
        request: LoginRequest,
        ct: &CancellationToken,
    ) -> Result<LoginResponse> {
        if !validators::validate_email(&request.email) {
            return Err(IdentityError::Validation(
                "A valid email address is required".to_string(),
            ));
        }

        let user = users::find_by_email(&self.pool, &request.email)
            .await?
            .filter(|u| u.is_active)
            .ok_or(IdentityError::Unauthorized)?;

        security::verify_password(&request.password, &user.password_hash)?;

        ensure_not_cancelled(ct)?;

        let (access_token, refresh_secret, roles) = self.mint_session(&user).await?;

        Ok(LoginResponse {
            access_token,
            refresh_token: refresh_secret,
            token_type: "Bearer".to_string(),
            expires_in_minutes: self.issuer.config().access_token_minutes,
            id: user.id,
            email: user.email,
            branch_id: user.branch_id,
            roles,
        })
    }

    // ---------------------------------------------------------------------
    // Refresh rotation
    // ---------------------------------------------------------------------

    /// Exchange a live refresh secret for a fresh session. Unknown, expired,
    /// revoked and concurrently spent tokens all collapse to `Unauthorized`.
    #[instrument(skip_all)]
    pub async fn refresh(
        &self,
        request: RefreshRequest,
        ct: &CancellationToken,
    ) -> Result<RefreshResponse> {
        if request.refresh_token.trim().is_empty() {
            return Err(IdentityError::Validation(
                "Refresh token must not be empty".to_string(),
            ));
        }

        ensure_not_cancelled(ct)?;

        let presented_hash = hash_secret(&request.refresh_token);
        let new_secret = generate_opaque_secret();
        let new_hash = hash_secret(&new_secret);

        let outcome = refresh_tokens::consume_for_rotation(
            &self.pool,
            &presented_hash,
            &new_hash,
            self.issuer.config().refresh_token_days,
        )
        .await?
        .ok_or(IdentityError::Unauthorized)?;

        // The presented token is already spent at this point. An inactive
        // or vanished principal still fails closed; its session chain just
        // ends here.
        let user = users::find_by_id(&self.pool, outcome.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(IdentityError::Unauthorized)?;

        let roles = users::get_roles(&self.pool, user.id).await?;
        let access_token = self.issuer.create_access_token(
            user.id,
            user.email.as_deref(),
            user.branch_id,
            &roles,
        )?;

        Ok(RefreshResponse {
            access_token,
            refresh_token: new_secret,
            token_type: "Bearer".to_string(),
            expires_in_minutes: self.issuer.config().access_token_minutes,
        })
    }

    // ---------------------------------------------------------------------
    // Manager-create-user (phone-first provisioning)
    // ---------------------------------------------------------------------

    /// The OTP goes out before the principal row is written. No row may
    /// exist for a phone number that never received a verification, so a
    /// failed send aborts with nothing persisted.
    #[instrument(skip(self, request, ct), fields(phone = %request.phone))]
    pub async fn manager_create_user(
        &self,
        request: ManagerCreateUserRequest,
        ct: &CancellationToken,
    ) -> Result<ManagerCreateUserResponse> {
        request
            .validate()
            .map_err(|e| IdentityError::Validation(e.to_string()))?;
        ensure_valid_phone(&request.phone)?;

        let role = self.resolve_role(request.role.as_deref()).await?;

        if users::find_by_phone(&self.pool, &request.phone)
            .await?
            .is_some()
        {
            // The one flow that names the duplicate resource to the caller.
            return Err(IdentityError::Conflict(format!(
                "Phone number {} is already registered.",
                request.phone
            )));
        }

        ensure_not_cancelled(ct)?;

        let verification_sid = self.phone_verifier.start_verification(&request.phone).await?;

        // Placeholder credential until the user sets a PIN; random, so the
        // account is unreachable by password until then.
        let placeholder = security::hash_password(&generate_opaque_secret())?;

        let new_user = users::NewUser {
            id: Uuid::new_v4(),
            branch_id: request.branch_id,
            email: request.email.clone(),
            full_name: request.full_name.clone(),
            phone_number: Some(request.phone.clone()),
            password_hash: placeholder,
            is_active: true,
        };

        let mut tx = self.pool.begin().await?;

        let user = users::create_user(&mut tx, &new_user).await.map_err(|e| {
            if matches!(e, IdentityError::Conflict(_)) {
                IdentityError::Conflict(format!(
                    "Phone number {} is already registered.",
                    request.phone
                ))
            } else {
                e
            }
        })?;
        users::assign_role(&mut tx, user.id, role.id).await?;

        let event = UserRegistered {
            user_id: user.id,
            branch_id: user.branch_id,
            email: request.email.unwrap_or_default(),
            full_name: user.full_name.clone(),
            phone: user.phone_number.clone(),
            role: role.name.clone(),
            is_active: user.is_active,
            registered_at_utc: user.created_at_utc,
            pin_hash: request.pin_hash,
        };
        enqueue_event(&mut tx, &event).await?;

        tx.commit().await?;

        info!(user_id = %user.id, "Provisioned phone-first principal");

        Ok(ManagerCreateUserResponse {
            id: user.id,
            phone_number: request.phone,
            full_name: user.full_name,
            role: role.name,
            verification_sid,
        })
    }

    // ---------------------------------------------------------------------
    // Phone logins
    // ---------------------------------------------------------------------

    /// First contact: converts possession of the phone into possession of
    /// a session. Any verification failure, including a provider fault,
    /// fails closed as `Unauthorized`.
    #[instrument(skip(self, request, ct), fields(phone = %request.phone))]
    pub async fn first_phone_login(
        &self,
        request: FirstPhoneLoginRequest,
        ct: &CancellationToken,
    ) -> Result<PhoneLoginResponse> {
        ensure_valid_phone(&request.phone)?;

        let user = users::find_by_phone(&self.pool, &request.phone)
            .await?
            .filter(|u| u.is_active)
            .ok_or(IdentityError::Unauthorized)?;

        let approved = match self
            .phone_verifier
            .check_verification(&request.phone, &request.code)
            .await
        {
            Ok(approved) => approved,
            Err(e) => {
                warn!(error = %e, "Phone verification check failed; rejecting login");
                false
            }
        };
        if !approved {
            return Err(IdentityError::Unauthorized);
        }

        ensure_not_cancelled(ct)?;

        let (access_token, refresh_secret, roles) = self.mint_session(&user).await?;

        Ok(PhoneLoginResponse {
            access_token,
            refresh_token: refresh_secret,
            token_type: "Bearer".to_string(),
            expires_in_minutes: self.issuer.config().access_token_minutes,
            id: user.id,
            phone_number: user.phone_number,
            branch_id: user.branch_id,
            roles,
        })
    }

    /// Subsequent logins: the PIN is just a password with relaxed
    /// composition rules, verified by the same hasher.
    #[instrument(skip(self, request, ct), fields(phone = %request.phone))]
    pub async fn phone_login(
        &self,
        request: PhoneLoginRequest,
        ct: &CancellationToken,
    ) -> Result<PhoneLoginResponse> {
        ensure_valid_phone(&request.phone)?;

        let user = users::find_by_phone(&self.pool, &request.phone)
            .await?
            .filter(|u| u.is_active)
            .ok_or(IdentityError::Unauthorized)?;

        security::verify_password(&request.pin, &user.password_hash)?;

        ensure_not_cancelled(ct)?;

        let (access_token, refresh_secret, roles) = self.mint_session(&user).await?;

        Ok(PhoneLoginResponse {
            access_token,
            refresh_token: refresh_secret,
            token_type: "Bearer".to_string(),
            expires_in_minutes: self.issuer.config().access_token_minutes,
            id: user.id,
            phone_number: user.phone_number,
            branch_id: user.branch_id,
            roles,
        })
    }

    // ---------------------------------------------------------------------
    // Set PIN
    // ---------------------------------------------------------------------

    /// Replace the credential behind a phone number via a one-time reset
    /// credential. The acting principal must be the phone's owner; a phone
    /// number alone never authorizes a credential change.
    #[instrument(skip(self, request, ct), fields(acting_user_id = %acting_user_id))]
    pub async fn set_pin(
        &self,
        acting_user_id: Uuid,
        request: crate::models::user::SetPinRequest,
        ct: &CancellationToken,
    ) -> Result<()> {
        ensure_valid_phone(&request.phone)?;
        if !validators::validate_pin(&request.new_pin) {
            return Err(IdentityError::Validation(
                "PIN must be 4 to 8 digits".to_string(),
            ));
        }

        let user = users::find_by_phone(&self.pool, &request.phone)
            .await?
            .filter(|u| u.is_active)
            .ok_or(IdentityError::Unauthorized)?;

        if user.id != acting_user_id {
            return Err(IdentityError::Unauthorized);
        }

        ensure_not_cancelled(ct)?;

        // Mint and immediately spend a one-time reset credential so the
        // change leaves the same audit trail as any password reset.
        let reset_secret = generate_opaque_secret();
        let reset_hash = hash_secret(&reset_secret);
        password_reset::create_reset_token(&self.pool, user.id, &reset_hash, RESET_TOKEN_TTL_MINUTES)
            .await?;

        let reset = password_reset::find_usable(&self.pool, &reset_hash)
            .await?
            .ok_or(IdentityError::Unauthorized)?;
        if !password_reset::mark_token_used(&self.pool, reset.id).await? {
            return Err(IdentityError::Unauthorized);
        }

        let pin_hash = security::hash_password(&request.new_pin)?;
        users::update_password_hash(&self.pool, user.id, &pin_hash).await?;

        // A credential change ends every session issued under the old one.
        let revoked = refresh_tokens::revoke_all_for_user(&self.pool, user.id).await?;

        info!(user_id = %user.id, revoked_sessions = revoked, "PIN updated");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Role seeding
    // ---------------------------------------------------------------------

    /// Idempotent: inserts any role from the closed vocabulary that is not
    /// already present and never touches existing rows.
    pub async fn seed_roles(&self) -> Result<()> {
        seed_roles(&self.pool).await
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    /// Resolve the requested role (default waiter) against the closed
    /// vocabulary, then require its seeded row to exist.
    async fn resolve_role(&self, requested: Option<&str>) -> Result<RoleRecord> {
        let name = requested.unwrap_or(Role::Waiter.as_str());
        let role = Role::from_str(name).ok_or_else(|| {
            IdentityError::Validation(format!("Unknown role '{name}'"))
        })?;

        roles::find_by_name(&self.pool, role.as_str())
            .await?
            .ok_or_else(|| {
                IdentityError::Validation(format!(
                    "Role '{}' has not been seeded",
                    role.as_str()
                ))
            })
    }

    /// Issue the access token + refresh secret pair for a verified
    /// principal. The plaintext refresh secret exists only in the return
    /// value; storage keeps its digest.
    async fn mint_session(&self, user: &User) -> Result<(String, String, Vec<String>)> {
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

        Ok((access_token, refresh_secret, roles))
    }
}

/// Seed the closed role vocabulary; safe to call on every startup.
pub async fn seed_roles(pool: &PgPool) -> Result<()> {
    for role in Role::ALL {
        let record = RoleRecord::seed(role);
        if roles::insert_if_absent(pool, &record).await? {
            info!(role = %record.name, is_system = record.is_system, "Seeded role");
        }
    }
    Ok(())
}

/// Write an event row into the outbox inside the caller's transaction
async fn enqueue_event<E: DomainEvent>(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event: &E,
) -> Result<()> {
    let aggregate_id = event.aggregate_id();
    let envelope = EventEnvelope::new(EVENT_SOURCE, event);
    let payload = serde_json::to_value(&envelope)?;

    outbox::insert_event(tx, E::AGGREGATE_TYPE, aggregate_id, E::EVENT_TYPE, &payload).await?;
    Ok(())
}

fn ensure_valid_phone(phone: &str) -> Result<()> {
    if !validators::validate_phone(phone) {
        return Err(IdentityError::Validation(
            "Phone number must be in E.164 format".to_string(),
        ));
    }
    Ok(())
}

fn ensure_not_cancelled(ct: &CancellationToken) -> Result<()> {
    if ct.is_cancelled() {
        return Err(IdentityError::Cancelled);
    }
    Ok(())
}

// Flow coverage lives in the integration tests; these only exercise the
// pieces with no database behind them.
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_cancelled_token_is_rejected() {
        let ct = CancellationToken::new();
        assert!(ensure_not_cancelled(&ct).is_ok());

        ct.cancel();
        assert!(matches!(
            ensure_not_cancelled(&ct),
            Err(IdentityError::Cancelled)
        ));
    }

    #[test]
    fn test_event_envelope_payload_shape() {
        let event = UserRegistered {
            user_id: Uuid::new_v4(),
            branch_id: None,
            email: "a@x.com".to_string(),
            full_name: "Ada".to_string(),
            phone: None,
            role: "waiter".to_string(),
            is_active: true,
            registered_at_utc: Utc::now(),
            pin_hash: None,
        };
        let envelope = EventEnvelope::new(EVENT_SOURCE, &event);
        let payload = serde_json::to_value(&envelope).unwrap();

        assert_eq!(payload["source"], "identity");
        assert_eq!(payload["data"]["role"], "waiter");
    }
}
