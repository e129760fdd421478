//! Synchronous publish/subscribe keyed by event kind.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use crate::{DomainEvent, EventError, EventKind};

/// Reacts to published events.
///
/// `handle` runs on the publisher's task, so it must return quickly.
/// Slow work (network, disk) belongs in a task the handler spawns.
pub trait EventHandler: Send + Sync + 'static {
    fn handle(&self, event: &DomainEvent) -> Result<(), EventError>;
}

impl<F> EventHandler for F
where
    F: Fn(&DomainEvent) -> Result<(), EventError> + Send + Sync + 'static,
{
    fn handle(&self, event: &DomainEvent) -> Result<(), EventError> {
        self(event)
    }
}

/// What happened during one [`EventBus::publish`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Handlers invoked.
    pub delivered: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

/// Registry of event handlers.
///
/// Handlers for one kind run in registration order. A handler that
/// returns `Err` or panics is logged and skipped; the rest still run and
/// the publisher never sees the failure.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<Arc<dyn EventHandler>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for events of `kind`.
    pub fn subscribe(&self, kind: EventKind, handler: impl EventHandler) {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        handlers.entry(kind).or_default().push(Arc::new(handler));
        tracing::debug!(event = %kind, "event handler subscribed");
    }

    /// Number of handlers registered for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Delivers `event` to every handler registered for its kind.
    pub fn publish(&self, event: &DomainEvent) -> PublishReport {
        let kind = event.kind();
        // Snapshot the list so a handler may subscribe without deadlocking.
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        let mut report = PublishReport::default();
        for (index, handler) in handlers.iter().enumerate() {
            report.delivered += 1;
            match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!(event = %kind, index, error = %e, "event handler failed");
                }
                Err(_) => {
                    report.failed += 1;
                    tracing::error!(event = %kind, index, "event handler panicked");
                }
            }
        }

        tracing::debug!(
            event = %kind,
            delivered = report.delivered,
            failed = report.failed,
            "event published"
        );
        report
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<_, _> =
            handlers.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}
