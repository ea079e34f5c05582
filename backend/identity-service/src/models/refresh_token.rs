use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One session continuation.
///
/// Mutated exactly once in its lifetime: the moment it is consumed for
/// rotation it transitions from live to revoked and is linked forward to its
/// replacement. Rows are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub token_hash: String,
    pub created_at_utc: DateTime<Utc>,
    pub expires_at_utc: DateTime<Utc>,
    pub revoked_at_utc: Option<DateTime<Utc>>,
    pub replaced_by_token_hash: Option<String>,
}

impl RefreshTokenRecord {
    /// Expiry is an inclusive cutoff: a token whose expiry equals `now` is
    /// already expired.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at_utc.is_none() && self.expires_at_utc > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(expires_at: DateTime<Utc>, revoked: Option<DateTime<Utc>>) -> RefreshTokenRecord {
        RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            branch_id: None,
            token_hash: "HASH".to_string(),
            created_at_utc: Utc::now(),
            expires_at_utc: expires_at,
            revoked_at_utc: revoked,
            replaced_by_token_hash: None,
        }
    }

    #[test]
    fn test_live_token() {
        let now = Utc::now();
        assert!(record(now + Duration::days(1), None).is_live(now));
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let now = Utc::now();
        assert!(!record(now, None).is_live(now));
    }

    #[test]
    fn test_revoked_token_is_dead() {
        let now = Utc::now();
        assert!(!record(now + Duration::days(1), Some(now)).is_live(now));
    }
}
