use thiserror::Error;

pub type Result<T> = std::result::Result<T, IdentityError>;

#[derive(Debug, Error)]
pub enum IdentityError {
    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Bad credential, inactive account, invalid/expired/revoked token or
    /// OTP. Deliberately carries no detail: callers must not learn which
    /// sub-check failed.
    #[error("Unauthorized")]
    Unauthorized,

    /// Duplicate tenant name, phone number or branch name. The one failure
    /// class that names the offending resource.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    /// Phone verification provider credentials are absent
    #[error("{0}")]
    NotConfigured(String),

    /// Phone verification provider transport/API failure
    #[error("Verification provider error: {0}")]
    Provider(String),

    /// The caller's cancellation signal fired before any write committed
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IdentityError {
    /// Whether this failure may be shown to callers verbatim.
    ///
    /// `Unauthorized` is always surfaced as-is; database/internal detail is
    /// not client material.
    pub fn is_client_safe(&self) -> bool {
        !matches!(
            self,
            IdentityError::Database(_) | IdentityError::Internal(_)
        )
    }
}

impl From<sqlx::Error> for IdentityError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        IdentityError::Database(err.to_string())
    }
}

impl From<anyhow::Error> for IdentityError {
    fn from(err: anyhow::Error) -> Self {
        IdentityError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for IdentityError {
    fn from(err: serde_json::Error) -> Self {
        IdentityError::Internal(format!("Serialization error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_has_no_detail() {
        assert_eq!(IdentityError::Unauthorized.to_string(), "Unauthorized");
    }

    #[test]
    fn test_conflict_names_the_resource() {
        let err = IdentityError::Conflict("Phone number already registered.".to_string());
        assert_eq!(err.to_string(), "Phone number already registered.");
    }

    #[test]
    fn test_internal_errors_are_not_client_safe() {
        assert!(!IdentityError::Database("boom".into()).is_client_safe());
        assert!(!IdentityError::Internal("boom".into()).is_client_safe());
        assert!(IdentityError::Unauthorized.is_client_safe());
        assert!(IdentityError::Conflict("dup".into()).is_client_safe());
    }
}
