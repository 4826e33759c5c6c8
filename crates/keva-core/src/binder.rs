//! Subscription binding.
//!
//! Binding a caller-supplied queue to the events topic is a prerequisite,
//! not a consequence, of reading a snapshot for subscription purposes: the
//! dispatcher binds before executing the read that produces the snapshot
//! returned in the same response, closing the window in which a mutation
//! could be missed by both.

use keva_broker::{Broker, BrokerError};
use keva_protocol::topics;
use std::sync::Arc;
use tracing::debug;

/// Binds delivery queues to the events topic with a key filter.
pub struct SubscriptionBinder {
    broker: Arc<dyn Broker>,
}

impl SubscriptionBinder {
    /// Create a binder over a broker.
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    /// Bind `queue` to the events topic.
    ///
    /// Only events whose routing key equals `key_filter` are delivered,
    /// or every event when the filter is the wildcard. The queue buffers
    /// from this point on.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue name is invalid or the broker fails.
    pub async fn bind(&self, queue: &str, key_filter: &str) -> Result<(), BrokerError> {
        self.broker
            .bind_queue(queue, key_filter, topics::EVENTS)
            .await?;
        debug!(queue = %queue, filter = %key_filter, "Subscription bound");
        Ok(())
    }

    /// Release a queue's binding. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error only on internal broker failure.
    pub async fn unbind(&self, queue: &str) -> Result<(), BrokerError> {
        self.broker.unbind_queue(queue).await?;
        debug!(queue = %queue, "Subscription unbound");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use keva_broker::MemoryBroker;

    #[tokio::test]
    async fn test_bind_captures_later_events() {
        let broker = Arc::new(MemoryBroker::new());
        let binder = SubscriptionBinder::new(broker.clone());

        binder.bind("sub-q", "*").await.unwrap();
        broker
            .publish(topics::EVENTS, "Key1", Bytes::from_static(b"ev"))
            .await
            .unwrap();

        let mut rx = broker.consume("sub-q").await.unwrap();
        assert_eq!(rx.recv().await.unwrap().routing_key, "Key1");
    }

    #[tokio::test]
    async fn test_unbind_idempotent() {
        let broker = Arc::new(MemoryBroker::new());
        let binder = SubscriptionBinder::new(broker);

        binder.bind("sub-q", "Key1").await.unwrap();
        binder.unbind("sub-q").await.unwrap();
        binder.unbind("sub-q").await.unwrap();
    }
}
