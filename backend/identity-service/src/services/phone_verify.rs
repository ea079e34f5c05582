/// Phone possession checks behind a trait so the auth flows never care
/// which provider is wired in.
///
/// Two implementations ship:
/// - `TwilioVerifyClient` calls the Twilio Verify v2 REST API
/// - `LocalPhoneVerifier` stores hashed one-time codes in Postgres, for
///   environments with no external provider
use async_trait::async_trait;
use mesa_crypto::{digest_eq, generate_numeric_code, hash_secret};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::PhoneVerifySettings;
use crate::db::phone_login_codes;
use crate::error::{IdentityError, Result};

/// How long a locally issued code stays valid
const LOCAL_CODE_TTL_MINUTES: i64 = 10;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PhoneVerification: Send + Sync {
    /// Send a one-time code to the given E.164 number. Returns the
    /// provider's correlating sid when it has one.
    async fn start_verification(&self, phone: &str) -> Result<Option<String>>;

    /// Check a code the caller presented. `Ok(false)` means the code was
    /// wrong or stale; transport and provider faults are errors.
    async fn check_verification(&self, phone: &str, code: &str) -> Result<bool>;
}

/// Pick the provider the configuration asks for
pub fn build_verifier(settings: &PhoneVerifySettings, pool: PgPool) -> Arc<dyn PhoneVerification> {
    if settings.use_local_codes || !settings.is_configured() {
        if !settings.use_local_codes {
            warn!("Twilio Verify credentials missing; falling back to local phone codes");
        }
        Arc::new(LocalPhoneVerifier::new(pool))
    } else {
        Arc::new(TwilioVerifyClient::new(settings.clone()))
    }
}

// -------------------------------------------------------------------------
// Twilio Verify
// -------------------------------------------------------------------------

pub struct TwilioVerifyClient {
    http: reqwest::Client,
    settings: PhoneVerifySettings,
}

#[derive(Debug, Deserialize)]
struct VerificationResponse {
    sid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerificationCheckResponse {
    status: String,
}

impl TwilioVerifyClient {
    pub fn new(settings: PhoneVerifySettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    /// Credentials are checked at call time, not construction, so a
    /// half-configured deployment fails the phone flows and nothing else.
    fn credentials(&self) -> Result<(&str, &str, &str)> {
        match (
            self.settings.account_sid.as_deref(),
            self.settings.auth_token.as_deref(),
            self.settings.verify_service_sid.as_deref(),
        ) {
            (Some(sid), Some(token), Some(service)) => Ok((sid, token, service)),
            _ => Err(IdentityError::NotConfigured(
                "Phone verification provider is not configured".to_string(),
            )),
        }
    }
}

#[async_trait]
impl PhoneVerification for TwilioVerifyClient {
    async fn start_verification(&self, phone: &str) -> Result<Option<String>> {
        let (account_sid, auth_token, service_sid) = self.credentials()?;

        let url = format!("https://verify.twilio.com/v2/Services/{service_sid}/Verifications");

        let response = self
            .http
            .post(&url)
            .basic_auth(account_sid, Some(auth_token))
            .form(&[("To", phone), ("Channel", "sms")])
            .send()
            .await
            .map_err(|e| IdentityError::Provider(format!("Twilio request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::Provider(format!(
                "Twilio Verify returned {status}: {body}"
            )));
        }

        let verification: VerificationResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Provider(format!("Twilio response malformed: {e}")))?;

        info!(phone = %phone, "Started phone verification");
        Ok(verification.sid)
    }

    async fn check_verification(&self, phone: &str, code: &str) -> Result<bool> {
        let (account_sid, auth_token, service_sid) = self.credentials()?;

        let url = format!("https://verify.twilio.com/v2/Services/{service_sid}/VerificationCheck");

        let response = self
            .http
            .post(&url)
            .basic_auth(account_sid, Some(auth_token))
            .form(&[("To", phone), ("Code", code)])
            .send()
            .await
            .map_err(|e| IdentityError::Provider(format!("Twilio request failed: {e}")))?;

        // Twilio answers 404 for an unknown or expired verification; that
        // is a failed check, not a provider fault.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::Provider(format!(
                "Twilio Verify returned {status}: {body}"
            )));
        }

        let check: VerificationCheckResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Provider(format!("Twilio response malformed: {e}")))?;

        Ok(check.status == "approved")
    }
}

// -------------------------------------------------------------------------
// Local code store
// -------------------------------------------------------------------------

pub struct LocalPhoneVerifier {
    pool: PgPool,
}

impl LocalPhoneVerifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PhoneVerification for LocalPhoneVerifier {
    async fn start_verification(&self, phone: &str) -> Result<Option<String>> {
        // Spent and expired rows have no further use; clear them out before
        // issuing the next code.
        let purged = phone_login_codes::purge_stale(&self.pool).await?;
        if purged > 0 {
            info!(purged, "Purged stale phone login codes");
        }

        let code = generate_numeric_code();
        let code_hash = hash_secret(&code);

        let record =
            phone_login_codes::insert(&self.pool, phone, &code_hash, LOCAL_CODE_TTL_MINUTES)
                .await?;

        // There is no SMS channel here; surface the code in the logs so
        // operators and dev setups can complete the flow.
        info!(phone = %phone, code = %code, "Issued local phone login code");
        Ok(Some(record.id.to_string()))
    }

    async fn check_verification(&self, phone: &str, code: &str) -> Result<bool> {
        let Some(record) = phone_login_codes::find_live(&self.pool, phone).await? else {
            return Ok(false);
        };

        // Compare in constant time; the presented code is caller input.
        if !digest_eq(&record.code_hash, &hash_secret(code)) {
            return Ok(false);
        }

        phone_login_codes::mark_used(&self.pool, record.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gateway_contract_via_trait_object() {
        let mut mock = MockPhoneVerification::new();
        mock.expect_start_verification()
            .returning(|_| Ok(Some("VE123".to_string())));
        mock.expect_check_verification()
            .returning(|_, code| Ok(code == "482913"));

        let gateway: Arc<dyn PhoneVerification> = Arc::new(mock);

        let sid = gateway.start_verification("+15551234567").await.unwrap();
        assert_eq!(sid.as_deref(), Some("VE123"));
        assert!(gateway
            .check_verification("+15551234567", "482913")
            .await
            .unwrap());
        assert!(!gateway
            .check_verification("+15551234567", "000000")
            .await
            .unwrap());
    }

    #[test]
    fn test_half_configured_twilio_reports_not_configured() {
        let client = TwilioVerifyClient::new(PhoneVerifySettings {
            account_sid: Some("AC123".to_string()),
            auth_token: None,
            verify_service_sid: Some("VA123".to_string()),
            use_local_codes: false,
        });

        assert!(matches!(
            client.credentials(),
            Err(IdentityError::NotConfigured(_))
        ));
    }
}
