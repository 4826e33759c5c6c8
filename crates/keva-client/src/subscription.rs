//! Client subscription handle.
//!
//! A handle represents a queue the service bound for change events. The
//! queue buffers from bind time, so events that arrived before `start` is
//! called are delivered first, then live events follow until cancellation.

use crate::rpc::ClientError;
use keva_broker::Broker;
use keva_protocol::{codec, ChangeEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A bound event queue with explicit start and cancel.
pub struct SubscriptionHandle {
    broker: Arc<dyn Broker>,
    queue: String,
    task: Mutex<Option<JoinHandle<()>>>,
    cancelled: AtomicBool,
}

impl SubscriptionHandle {
    /// Wrap a queue the service has already bound.
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>, queue: impl Into<String>) -> Self {
        Self {
            broker,
            queue: queue.into(),
            task: Mutex::new(None),
            cancelled: AtomicBool::new(false),
        }
    }

    /// The name of the bound queue.
    #[must_use]
    pub fn queue_name(&self) -> &str {
        &self.queue
    }

    /// Begin delivering events to `on_event`.
    ///
    /// Everything buffered since bind time is delivered first, then live
    /// events until the subscription is cancelled. A subscription can be
    /// started once.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue is gone (already cancelled) or already
    /// has a consumer.
    pub async fn start<F>(&self, mut on_event: F) -> Result<(), ClientError>
    where
        F: FnMut(ChangeEvent) + Send + 'static,
    {
        let mut rx = self.broker.consume(&self.queue).await?;
        let queue = self.queue.clone();

        let task = tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                match codec::decode::<ChangeEvent>(&delivery.payload) {
                    Ok(event) => on_event(event),
                    Err(e) => warn!(queue = %queue, error = %e, "Undecodable change event"),
                }
            }
            debug!(queue = %queue, "Subscription drained");
        });

        if let Ok(mut slot) = self.task.lock() {
            *slot = Some(task);
        }
        Ok(())
    }

    /// Cancel the subscription. Immediate and idempotent.
    ///
    /// Unbinds the queue, so no new events are buffered or delivered after
    /// this returns. Events already buffered may still be drained by a
    /// concurrently running `start` callback; the delivery task ends once
    /// the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns an error only on internal broker failure.
    pub async fn cancel(&self) -> Result<(), ClientError> {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.broker.unbind_queue(&self.queue).await?;
        debug!(queue = %self.queue, "Subscription cancelled");
        Ok(())
    }

    /// Whether `cancel` has completed at least once.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        // The queue itself is released by cancel; a still-running delivery
        // task must not outlive the handle.
        if let Ok(mut slot) = self.task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keva_broker::MemoryBroker;
    use keva_protocol::{topics, Entry, EventKind};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    async fn publish_event(broker: &MemoryBroker, kind: EventKind, key: &str, value: &str) {
        let event = ChangeEvent::new(kind, Entry::new(key, value));
        let payload = codec::encode(&event).unwrap();
        broker
            .publish(topics::EVENTS, key, payload)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_start_delivers_buffered_then_live() {
        let broker = Arc::new(MemoryBroker::new());
        broker
            .bind_queue("sub-q", "*", topics::EVENTS)
            .await
            .unwrap();

        // Events arrive before any consumer is attached.
        publish_event(&broker, EventKind::Added, "Key1", "Value1").await;
        publish_event(&broker, EventKind::Added, "Key2", "Value2").await;

        let handle = SubscriptionHandle::new(broker.clone(), "sub-q");
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle
            .start(move |event| {
                let _ = tx.send(event);
            })
            .await
            .unwrap();

        let first = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        let second = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(first.routing_key, "Key1");
        assert_eq!(second.routing_key, "Key2");

        // Live events keep flowing after the buffered ones.
        publish_event(&broker, EventKind::Modified, "Key1", "Value3").await;
        let third = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(third.kind, EventKind::Modified);
    }

    #[tokio::test]
    async fn test_cancel_stops_new_events() {
        let broker = Arc::new(MemoryBroker::new());
        broker
            .bind_queue("sub-q", "*", topics::EVENTS)
            .await
            .unwrap();

        let handle = SubscriptionHandle::new(broker.clone(), "sub-q");
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle
            .start(move |event| {
                let _ = tx.send(event);
            })
            .await
            .unwrap();

        handle.cancel().await.unwrap();
        assert!(handle.is_cancelled());

        publish_event(&broker, EventKind::Added, "Key1", "late").await;
        assert!(timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let broker = Arc::new(MemoryBroker::new());
        broker
            .bind_queue("sub-q", "*", topics::EVENTS)
            .await
            .unwrap();

        let handle = SubscriptionHandle::new(broker, "sub-q");
        handle.cancel().await.unwrap();
        handle.cancel().await.unwrap();
    }

    #[tokio::test]
    async fn test_independent_subscriptions() {
        let broker = Arc::new(MemoryBroker::new());
        broker
            .bind_queue("all-q", "*", topics::EVENTS)
            .await
            .unwrap();
        broker
            .bind_queue("k1-q", "Key1", topics::EVENTS)
            .await
            .unwrap();

        let all = SubscriptionHandle::new(broker.clone(), "all-q");
        let only_k1 = SubscriptionHandle::new(broker.clone(), "k1-q");

        let (all_tx, mut all_rx) = mpsc::unbounded_channel();
        let (k1_tx, mut k1_rx) = mpsc::unbounded_channel();
        all.start(move |ev| {
            let _ = all_tx.send(ev);
        })
        .await
        .unwrap();
        only_k1
            .start(move |ev| {
                let _ = k1_tx.send(ev);
            })
            .await
            .unwrap();

        publish_event(&broker, EventKind::Added, "Key1", "a").await;
        publish_event(&broker, EventKind::Added, "Key2", "b").await;

        // Wildcard subscription sees both; the filtered one only Key1.
        assert_eq!(
            timeout(Duration::from_secs(1), all_rx.recv()).await.unwrap().unwrap().routing_key,
            "Key1"
        );
        assert_eq!(
            timeout(Duration::from_secs(1), all_rx.recv()).await.unwrap().unwrap().routing_key,
            "Key2"
        );
        assert_eq!(
            timeout(Duration::from_secs(1), k1_rx.recv()).await.unwrap().unwrap().routing_key,
            "Key1"
        );

        // Cancelling one subscription does not affect the other.
        only_k1.cancel().await.unwrap();
        publish_event(&broker, EventKind::Removed, "Key1", "a").await;
        assert_eq!(
            timeout(Duration::from_secs(1), all_rx.recv()).await.unwrap().unwrap().kind,
            EventKind::Removed
        );
        assert!(timeout(Duration::from_millis(100), k1_rx.recv())
            .await
            .unwrap()
            .is_none());
    }
}
