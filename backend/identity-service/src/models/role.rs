use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Closed role vocabulary.
///
/// Storage keeps role names as text; this enum is the boundary where names
/// are checked against the fixed set at orchestration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    StockManager,
    Director,
    Waiter,
    Cashier,
    Chef,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Admin,
        Role::Manager,
        Role::StockManager,
        Role::Director,
        Role::Waiter,
        Role::Cashier,
        Role::Chef,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::StockManager => "stockmanager",
            Role::Director => "director",
            Role::Waiter => "waiter",
            Role::Cashier => "cashier",
            Role::Chef => "chef",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "manager" => Some(Role::Manager),
            "stockmanager" => Some(Role::StockManager),
            "director" => Some(Role::Director),
            "waiter" => Some(Role::Waiter),
            "cashier" => Some(Role::Cashier),
            "chef" => Some(Role::Chef),
            _ => None,
        }
    }

    /// System roles cannot be deleted or renamed by tenant actors.
    pub fn is_system(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager | Role::Director)
    }
}

/// Persisted role row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoleRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
}

impl RoleRecord {
    pub fn seed(role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: role.as_str().to_string(),
            description: None,
            is_system: role.is_system(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_names() {
        for role in Role::ALL {
            assert_eq!(Role::from_str(role.as_str()), Some(role));
        }
    }

    #[test]
    fn test_from_str_normalizes() {
        assert_eq!(Role::from_str("  Waiter "), Some(Role::Waiter));
        assert_eq!(Role::from_str("MANAGER"), Some(Role::Manager));
        assert_eq!(Role::from_str("sommelier"), None);
    }

    #[test]
    fn test_system_roles() {
        let system: Vec<_> = Role::ALL.iter().filter(|r| r.is_system()).collect();
        assert_eq!(system.len(), 3);
        assert!(Role::Admin.is_system());
        assert!(Role::Manager.is_system());
        assert!(Role::Director.is_system());
        assert!(!Role::Waiter.is_system());
    }
}
