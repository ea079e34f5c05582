use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Principal - core identity entity.
///
/// The login handle is either the email (scoped unique per branch) or the
/// phone number (unique across active principals).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub branch_id: Option<Uuid>,
    pub email: Option<String>,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: Option<DateTime<Utc>>,
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
    pub branch_id: Option<Uuid>,
    #[validate(length(min = 1, max = 128))]
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub pin_hash: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ManagerCreateUserRequest {
    #[validate(length(min = 1, max = 128))]
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub branch_id: Option<Uuid>,
    pub role: Option<String>,
    pub pin_hash: Option<String>,
}

/// First contact: possession of the phone is proven by an OTP code, no
/// password or PIN involved.
#[derive(Debug, Clone, Deserialize)]
pub struct FirstPhoneLoginRequest {
    pub phone: String,
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhoneLoginRequest {
    pub phone: String,
    pub pin: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetPinRequest {
    pub phone: String,
    pub new_pin: String,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    pub id: Uuid,
    pub email: Option<String>,
    pub branch_id: Option<Uuid>,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub role: String,
}

/// Session payload returned by every token-minting flow.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in_minutes: i64,
    pub id: Uuid,
    pub email: Option<String>,
    pub branch_id: Option<Uuid>,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in_minutes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManagerCreateUserResponse {
    pub id: Uuid,
    pub phone_number: String,
    pub full_name: String,
    pub role: String,
    pub verification_sid: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhoneLoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in_minutes: i64,
    pub id: Uuid,
    pub phone_number: Option<String>,
    pub branch_id: Option<Uuid>,
    pub roles: Vec<String>,
}
