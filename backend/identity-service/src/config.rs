//! Configuration for the identity service
//!
//! Loads settings from environment variables, with a `.env` file picked up in
//! development builds. The JWT section is converted into the immutable
//! [`JwtConfig`] injected into the token issuer at construction; nothing here
//! is a process-wide mutable singleton.

use anyhow::{Context, Result};
use mesa_crypto::JwtConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::info;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub phone_verify: PhoneVerifySettings,
    pub outbox: OutboxSettings,
}

impl Settings {
    pub fn load() -> Result<Self> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
            info!("Loaded .env file for development");
        }

        Ok(Settings {
            database: DatabaseSettings::from_env()?,
            jwt: JwtSettings::from_env()?,
            phone_verify: PhoneVerifySettings::from_env(),
            outbox: OutboxSettings::from_env()?,
        })
    }
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: u64,
}

impl DatabaseSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,
            acquire_timeout: env::var("DATABASE_ACQUIRE_TIMEOUT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid DATABASE_ACQUIRE_TIMEOUT")?,
        })
    }
}

/// JWT signing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtSettings {
    pub signing_key: String,
    pub issuer: String,
    pub audience: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
}

impl JwtSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            signing_key: env::var("JWT_SIGNING_KEY").context("JWT_SIGNING_KEY must be set")?,
            issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "mesa".to_string()),
            audience: env::var("JWT_AUDIENCE").unwrap_or_else(|_| "mesa-clients".to_string()),
            access_token_minutes: env::var("JWT_ACCESS_TOKEN_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("Invalid JWT_ACCESS_TOKEN_MINUTES")?,
            refresh_token_days: env::var("JWT_REFRESH_TOKEN_DAYS")
                .unwrap_or_else(|_| "14".to_string())
                .parse()
                .context("Invalid JWT_REFRESH_TOKEN_DAYS")?,
        })
    }

    pub fn to_jwt_config(&self) -> JwtConfig {
        JwtConfig {
            signing_key: self.signing_key.clone(),
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            access_token_minutes: self.access_token_minutes,
            refresh_token_days: self.refresh_token_days,
        }
    }
}

/// Twilio Verify settings; all optional. The gateway reports `NotConfigured`
/// at call time when credentials are absent, matching the boundary contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneVerifySettings {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub verify_service_sid: Option<String>,
    /// Use locally persisted codes instead of the external provider
    /// (development / on-prem installs without Twilio).
    pub use_local_codes: bool,
}

impl PhoneVerifySettings {
    fn from_env() -> Self {
        Self {
            account_sid: env::var("TWILIO_ACCOUNT_SID").ok().filter(|v| !v.is_empty()),
            auth_token: env::var("TWILIO_AUTH_TOKEN").ok().filter(|v| !v.is_empty()),
            verify_service_sid: env::var("TWILIO_VERIFY_SERVICE_SID")
                .ok()
                .filter(|v| !v.is_empty()),
            use_local_codes: env::var("PHONE_VERIFY_LOCAL_CODES")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.account_sid.is_some() && self.auth_token.is_some() && self.verify_service_sid.is_some()
    }
}

/// Outbox dispatcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxSettings {
    pub poll_interval_ms: u64,
    pub batch_size: i64,
    pub max_retries: i32,
}

impl OutboxSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            poll_interval_ms: env::var("OUTBOX_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "1500".to_string())
                .parse()
                .context("Invalid OUTBOX_POLL_INTERVAL_MS")?,
            batch_size: env::var("OUTBOX_BATCH_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .context("Invalid OUTBOX_BATCH_SIZE")?,
            max_retries: env::var("OUTBOX_MAX_RETRIES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid OUTBOX_MAX_RETRIES")?,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_verify_is_configured() {
        let settings = PhoneVerifySettings {
            account_sid: Some("AC123".to_string()),
            auth_token: Some("token".to_string()),
            verify_service_sid: Some("VA123".to_string()),
            use_local_codes: false,
        };
        assert!(settings.is_configured());

        let missing = PhoneVerifySettings {
            account_sid: Some("AC123".to_string()),
            auth_token: None,
            verify_service_sid: Some("VA123".to_string()),
            use_local_codes: false,
        };
        assert!(!missing.is_configured());
    }
}
