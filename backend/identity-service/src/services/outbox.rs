/// Outbox dispatcher: drains pending event rows and hands them to the
/// registered handlers. Delivery is at-least-once; a handler that has run
/// but whose row fails to be marked published will see the event again,
/// so every handler must be idempotent on the aggregate id.
use async_trait::async_trait;
use mesa_events::DomainEvent;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::OutboxSettings;
use crate::db::outbox::{self, OutboxRecord};
use crate::error::Result;

/// A subscriber for one event type. Handlers receive the full envelope
/// payload as stored in the outbox row.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Wire name of the event this handler consumes, e.g. "user.registered"
    fn event_type(&self) -> &'static str;

    async fn handle(&self, payload: &serde_json::Value) -> anyhow::Result<()>;
}

/// Registry of handlers keyed by event type. Replaces in-process
/// reflection-based dispatch with an explicit subscription table.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Vec<Arc<dyn EventHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers
            .entry(handler.event_type())
            .or_default()
            .push(handler);
    }

    fn handlers_for(&self, event_type: &str) -> &[Arc<dyn EventHandler>] {
        self.handlers
            .get(event_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Spawn the background dispatcher task. It polls until the shutdown
/// token fires, finishing the in-flight batch before exiting.
pub fn spawn_dispatcher(
    pool: PgPool,
    registry: Arc<HandlerRegistry>,
    settings: OutboxSettings,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    info!(
        poll_interval_ms = settings.poll_interval_ms,
        batch_size = settings.batch_size,
        max_retries = settings.max_retries,
        "Starting outbox dispatcher"
    );

    if registry.is_empty() {
        warn!("Outbox dispatcher starting with no registered handlers; events will retry until exhausted");
    }

    tokio::spawn(async move {
        loop {
            if let Err(err) = process_batch(&pool, &registry, &settings).await {
                error!(error = %err, "Outbox batch failed");
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Outbox dispatcher shutting down");
                    break;
                }
                _ = tokio::time::sleep(settings.poll_interval()) => {}
            }
        }
    })
}

async fn process_batch(
    pool: &PgPool,
    registry: &HandlerRegistry,
    settings: &OutboxSettings,
) -> Result<()> {
    let records = outbox::fetch_unpublished(pool, settings.batch_size, settings.max_retries).await?;

    if records.is_empty() {
        return Ok(());
    }

    debug!(count = records.len(), "Dispatching outbox events");

    for record in records {
        dispatch_one(pool, registry, &record).await?;
    }

    Ok(())
}

async fn dispatch_one(
    pool: &PgPool,
    registry: &HandlerRegistry,
    record: &OutboxRecord,
) -> Result<()> {
    let handlers = registry.handlers_for(&record.event_type);

    if handlers.is_empty() {
        outbox::mark_failed(
            pool,
            record.id,
            &format!("No handler registered for '{}'", record.event_type),
        )
        .await?;
        return Ok(());
    }

    for handler in handlers {
        if let Err(err) = handler.handle(&record.payload).await {
            warn!(
                event_id = %record.id,
                event_type = %record.event_type,
                aggregate_id = %record.aggregate_id,
                retry_count = record.retry_count,
                error = %err,
                "Outbox event handler failed"
            );
            outbox::mark_failed(pool, record.id, &err.to_string()).await?;
            return Ok(());
        }
    }

    outbox::mark_published(pool, record.id).await?;
    debug!(
        event_id = %record.id,
        event_type = %record.event_type,
        "Outbox event delivered"
    );

    Ok(())
}

/// Default projection handler: writes a structured log line per
/// registration. Stands in for the downstream user-projection consumer,
/// which keys off the user id and is therefore idempotent.
pub struct RegistrationLogHandler;

#[async_trait]
impl EventHandler for RegistrationLogHandler {
    fn event_type(&self) -> &'static str {
        mesa_events::UserRegistered::EVENT_TYPE
    }

    async fn handle(&self, payload: &serde_json::Value) -> anyhow::Result<()> {
        let envelope: mesa_events::EventEnvelope<mesa_events::UserRegistered> =
            serde_json::from_value(payload.clone())?;

        info!(
            user_id = %envelope.data.user_id,
            role = %envelope.data.role,
            "User registered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        fn event_type(&self) -> &'static str {
            "user.registered"
        }

        async fn handle(&self, _payload: &serde_json::Value) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_registry_routes_by_event_type() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(CountingHandler {
            calls: Arc::clone(&calls),
        }));

        assert_eq!(registry.handlers_for("user.registered").len(), 1);
        assert!(registry.handlers_for("order.created").is_empty());
    }

    #[test]
    fn test_registration_log_handler_event_type() {
        let handler = RegistrationLogHandler;
        assert_eq!(handler.event_type(), mesa_events::UserRegistered::EVENT_TYPE);
    }

    #[tokio::test]
    async fn test_handler_receives_envelope_payload() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = CountingHandler {
            calls: Arc::clone(&calls),
        };

        handler
            .handle(&serde_json::json!({"data": {}}))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
