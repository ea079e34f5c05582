/// Access token issuance for Mesa services
///
/// HS256 JWTs carrying the verified principal's identity and scope. The
/// issuer is a pure function of (principal, roles, signing key, clock): no
/// I/O, no side effects. A missing or empty signing key is a construction
/// error, surfaced at startup rather than at issuance time.
use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

/// Immutable signing configuration, injected at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub signing_key: String,
    pub issuer: String,
    pub audience: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
}

/// Claims carried by an access token.
///
/// `branch_id` and `email` are omitted from the payload entirely when the
/// principal has none, rather than serialized as null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (principal id)
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    pub roles: Vec<String>,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Builds signed, time-boxed access tokens from verified principals.
#[derive(Clone)]
pub struct AccessTokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    config: JwtConfig,
}

impl AccessTokenIssuer {
    pub fn new(config: JwtConfig) -> Result<Self> {
        if config.signing_key.trim().is_empty() {
            return Err(anyhow!("JWT signing key must not be empty"));
        }

        let encoding_key = EncodingKey::from_secret(config.signing_key.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.signing_key.as_bytes());

        Ok(Self {
            encoding_key,
            decoding_key,
            config,
        })
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Create an access token for a verified principal and its resolved roles.
    pub fn create_access_token(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        branch_id: Option<Uuid>,
        roles: &[String],
    ) -> Result<String> {
        let now = Utc::now();
        let expires_at = now + Duration::minutes(self.config.access_token_minutes);

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.map(str::to_owned),
            branch_id: branch_id.map(|id| id.to_string()),
            roles: roles.to_vec(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(JWT_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| anyhow!("Failed to sign access token: {e}"))
    }

    /// Validate a token's signature, issuer, audience and expiry.
    pub fn decode_access_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| anyhow!("Token validation failed: {e}"))?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_issuer() -> AccessTokenIssuer {
        AccessTokenIssuer::new(JwtConfig {
            signing_key: "test-signing-key-with-enough-length".to_string(),
            issuer: "mesa".to_string(),
            audience: "mesa-clients".to_string(),
            access_token_minutes: 60,
            refresh_token_days: 14,
        })
        .expect("valid test config")
    }

    #[test]
    fn test_empty_signing_key_rejected() {
        let result = AccessTokenIssuer::new(JwtConfig {
            signing_key: "   ".to_string(),
            issuer: "mesa".to_string(),
            audience: "mesa-clients".to_string(),
            access_token_minutes: 60,
            refresh_token_days: 14,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_round_trip_claims() {
        let issuer = test_issuer();
        let user_id = Uuid::new_v4();
        let branch_id = Uuid::new_v4();
        let roles = vec!["waiter".to_string(), "cashier".to_string()];

        let token = issuer
            .create_access_token(user_id, Some("a@x.com"), Some(branch_id), &roles)
            .expect("token issued");

        let claims = issuer.decode_access_token(&token).expect("token decodes");
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email.as_deref(), Some("a@x.com"));
        assert_eq!(claims.branch_id, Some(branch_id.to_string()));
        assert_eq!(claims.roles, roles);
        assert_eq!(claims.iss, "mesa");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_branch_claim_omitted_when_absent() {
        let issuer = test_issuer();
        let token = issuer
            .create_access_token(Uuid::new_v4(), None, None, &["waiter".to_string()])
            .expect("token issued");

        // Decode the raw payload: absent scope must not appear as a claim at all.
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
        let payload = token.split('.').nth(1).expect("jwt has payload segment");
        let raw = URL_SAFE_NO_PAD.decode(payload).expect("payload is base64");
        let json: serde_json::Value = serde_json::from_slice(&raw).expect("payload is json");
        assert!(json.get("branch_id").is_none());
        assert!(json.get("email").is_none());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let issuer = test_issuer();
        let other = AccessTokenIssuer::new(JwtConfig {
            signing_key: "a-completely-different-signing-key".to_string(),
            issuer: "mesa".to_string(),
            audience: "mesa-clients".to_string(),
            access_token_minutes: 60,
            refresh_token_days: 14,
        })
        .expect("valid config");

        let token = issuer
            .create_access_token(Uuid::new_v4(), None, None, &[])
            .expect("token issued");
        assert!(other.decode_access_token(&token).is_err());
    }
}
