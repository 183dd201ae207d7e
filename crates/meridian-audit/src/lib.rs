//! The audit/event bus: a durable, append-mostly stream of `AuditEvent`s
//! fanned out to one or more `Shipper` sinks. Idempotency is keyed on
//! `event.id`, so a shipper that retries a partially-acknowledged batch
//! never double-counts. A `CircuitBreaker` wraps each shipper so one
//! failing sink cannot stall the others or block the bus itself.

pub mod breaker;
pub mod event;
pub mod shipper;

pub use breaker::{CircuitBreaker, CircuitState};
pub use event::AuditEvent;
pub use shipper::{FileShipper, ShipError, Shipper, StdoutShipper, WebhookShipper};

use std::collections::HashSet;
use std::sync::Mutex;

/// Fans a batch of events out to every registered shipper, each guarded
/// by its own circuit breaker, and deduplicates by `event.id` against
/// events already seen in this process's lifetime.
pub struct AuditBus {
    sinks: Vec<(Box<dyn Shipper>, CircuitBreaker)>,
    seen: Mutex<HashSet<String>>,
}

impl AuditBus {
    pub fn new(sinks: Vec<Box<dyn Shipper>>) -> Self {
        Self {
            sinks: sinks.into_iter().map(|s| (s, CircuitBreaker::new(5, chrono::Duration::seconds(30)))).collect(),
            seen: Mutex::new(HashSet::new()),
        }
    }

    pub async fn emit(&self, events: &[AuditEvent]) {
        let fresh: Vec<AuditEvent> = {
            let mut seen = self.seen.lock().expect("audit bus dedup lock poisoned");
            events
                .iter()
                .filter(|e| seen.insert(e.id.clone()))
                .cloned()
                .collect()
        };
        if fresh.is_empty() {
            return;
        }

        for (sink, breaker) in &self.sinks {
            if !breaker.allow_request() {
                tracing::warn!("audit sink skipped, circuit open");
                continue;
            }
            match sink.ship(&fresh).await {
                Ok(()) => breaker.record_success(),
                Err(err) => {
                    tracing::error!(error = %err, "audit sink failed");
                    breaker.record_failure();
                }
            }
        }
    }
}
