use chrono::{DateTime, Utc};
/// Event schema registry for Mesa back-office modules
///
/// Defines the versioned domain events the identity core emits and the
/// excluded collaborators (orders, tables, user projections) consume.
/// Consumers must be idempotent on the aggregate id: delivery through the
/// outbox is at-least-once.
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// Current schema version for all events
pub const SCHEMA_VERSION: u32 = 1;

/// A typed domain event with a stable wire name and owning aggregate.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync {
    /// Stable event type name, e.g. "user.registered"
    const EVENT_TYPE: &'static str;

    /// Aggregate this event belongs to, e.g. "user"
    const AGGREGATE_TYPE: &'static str;

    /// Id of the entity the event is about
    fn aggregate_id(&self) -> Uuid;
}

/// Base envelope wrapping every published event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    /// Unique event id for idempotency and tracing
    pub event_id: Uuid,
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
    /// Schema version for compatibility checking
    pub schema_version: u32,
    /// Source module that generated the event
    pub source: String,
    /// Actual event payload
    pub data: T,
}

impl<T> EventEnvelope<T> {
    pub fn new(source: impl Into<String>, data: T) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            schema_version: SCHEMA_VERSION,
            source: source.into(),
            data,
        }
    }
}

// ============================================================================
// IDENTITY MODULE EVENTS
// ============================================================================

/// Published when a principal has been durably created.
///
/// Consumed by the user-projection and counter handlers; they key off
/// `user_id` to stay idempotent under redelivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRegistered {
    pub user_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub registered_at_utc: DateTime<Utc>,
    pub pin_hash: Option<String>,
}

impl DomainEvent for UserRegistered {
    const EVENT_TYPE: &'static str = "user.registered";
    const AGGREGATE_TYPE: &'static str = "user";

    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

// ============================================================================
// ORDERS MODULE EVENTS
// ============================================================================

/// Published by the orders collaborator; shares the publish-after-commit
/// pattern but is not owned by the identity core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub branch_id: Uuid,
}

impl DomainEvent for OrderCreated {
    const EVENT_TYPE: &'static str = "order.created";
    const AGGREGATE_TYPE: &'static str = "order";

    fn aggregate_id(&self) -> Uuid {
        self.order_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_registered_round_trip() {
        let event = UserRegistered {
            user_id: Uuid::new_v4(),
            branch_id: None,
            email: "a@x.com".to_string(),
            full_name: "Ada".to_string(),
            phone: Some("+15551234567".to_string()),
            role: "waiter".to_string(),
            is_active: true,
            registered_at_utc: Utc::now(),
            pin_hash: None,
        };

        let json = serde_json::to_value(&event).expect("serializes");
        let back: UserRegistered = serde_json::from_value(json).expect("deserializes");
        assert_eq!(back.user_id, event.user_id);
        assert_eq!(back.role, "waiter");
    }

    #[test]
    fn test_envelope_carries_schema_version() {
        let envelope = EventEnvelope::new(
            "identity",
            OrderCreated {
                order_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                branch_id: Uuid::new_v4(),
            },
        );
        assert_eq!(envelope.schema_version, SCHEMA_VERSION);
        assert_eq!(envelope.source, "identity");
    }
}
