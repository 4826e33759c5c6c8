//! Change event emission.
//!
//! The emitter turns a store mutation into a [`ChangeEvent`] and hands it
//! to the broker for topic-routed publish. It is called strictly after the
//! mutation is visible to subsequent reads, and at most once per mutation.

use bytes::Bytes;
use keva_broker::{Broker, BrokerError};
use keva_protocol::{codec, topics, ChangeEvent, CodecError, Entry, EventKind};
use std::sync::Arc;
use thiserror::Error;
use tracing::{trace, warn};

/// Emission errors.
#[derive(Debug, Error)]
pub enum EmitError {
    /// Failed to encode the event.
    #[error("Event encoding failed: {0}")]
    Codec(#[from] CodecError),

    /// The broker rejected the publish.
    #[error("Event publish failed: {0}")]
    Broker(#[from] BrokerError),
}

/// Publishes change events to the events topic.
pub struct EventEmitter {
    broker: Arc<dyn Broker>,
}

impl EventEmitter {
    /// Create an emitter over a broker.
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    /// Emit one change event for a mutated entry.
    ///
    /// The routing key is the entry's key, so queues bound with an exact
    /// filter only see their own key's events. Events are fire-and-forget:
    /// returns the number of queues the event reached, which is zero when
    /// nothing is bound.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or publishing fails. The mutation has
    /// already happened; callers surface this as an internal failure rather
    /// than retrying, keeping emission at-most-once.
    pub async fn emit(&self, kind: EventKind, entry: Entry) -> Result<usize, EmitError> {
        let event = ChangeEvent::new(kind, entry);
        let payload: Bytes = codec::encode(&event)?;

        let delivered = self
            .broker
            .publish(topics::EVENTS, &event.routing_key, payload)
            .await?;

        trace!(
            kind = %event.kind,
            key = %event.routing_key,
            recipients = delivered,
            "Emitted change event"
        );
        Ok(delivered)
    }

    /// Emit one REMOVED event per entry of a bulk clear.
    ///
    /// Uses the pre-clear snapshot so subscribers filtering on a specific
    /// key still observe that key's removal. Per-key order holds trivially
    /// (one event per key); cross-key order is unspecified.
    ///
    /// # Errors
    ///
    /// Stops at the first failing emit; events already published stay
    /// published.
    pub async fn emit_removed(&self, entries: Vec<Entry>) -> Result<(), EmitError> {
        for entry in entries {
            if let Err(e) = self.emit(EventKind::Removed, entry).await {
                warn!(error = %e, "Bulk removal emission aborted");
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keva_broker::MemoryBroker;

    async fn bound_broker(filter: &str) -> Arc<MemoryBroker> {
        let broker = Arc::new(MemoryBroker::new());
        broker
            .bind_queue("test-q", filter, topics::EVENTS)
            .await
            .unwrap();
        broker
    }

    #[tokio::test]
    async fn test_emit_routes_by_key() {
        let broker = bound_broker("Key1").await;
        let emitter = EventEmitter::new(broker.clone());

        let reached = emitter
            .emit(EventKind::Added, Entry::new("Key1", "Value1"))
            .await
            .unwrap();
        assert_eq!(reached, 1);

        let missed = emitter
            .emit(EventKind::Added, Entry::new("Key2", "Value2"))
            .await
            .unwrap();
        assert_eq!(missed, 0);

        let mut rx = broker.consume("test-q").await.unwrap();
        let event: ChangeEvent = codec::decode(&rx.recv().await.unwrap().payload).unwrap();
        assert_eq!(event.kind, EventKind::Added);
        assert_eq!(event.entry, Entry::new("Key1", "Value1"));
    }

    #[tokio::test]
    async fn test_emit_removed_one_event_per_entry() {
        let broker = bound_broker("*").await;
        let emitter = EventEmitter::new(broker.clone());

        let entries = vec![
            Entry::new("A", "1"),
            Entry::new("B", "2"),
            Entry::new("C", "3"),
        ];
        emitter.emit_removed(entries).await.unwrap();

        let mut rx = broker.consume("test-q").await.unwrap();
        let mut keys = Vec::new();
        for _ in 0..3 {
            let event: ChangeEvent = codec::decode(&rx.recv().await.unwrap().payload).unwrap();
            assert_eq!(event.kind, EventKind::Removed);
            keys.push(event.routing_key);
        }
        keys.sort();
        assert_eq!(keys, vec!["A", "B", "C"]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_emit_without_bindings() {
        let broker = Arc::new(MemoryBroker::new());
        let emitter = EventEmitter::new(broker);

        // Fire-and-forget: no bindings is not an error.
        let reached = emitter
            .emit(EventKind::Modified, Entry::new("Key1", "Value1"))
            .await
            .unwrap();
        assert_eq!(reached, 0);
    }
}
