//! In-process broker implementation.
//!
//! `MemoryBroker` routes published payloads to bound queues using lock-free
//! maps. It is the reference implementation used for wiring the service and
//! its tests; a networked broker plugs in behind the same trait.

use crate::traits::{validate_queue_name, Broker, BrokerError, Delivery};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Whether a routing filter matches a routing key.
///
/// `"*"` matches every key; anything else matches exactly.
fn filter_matches(filter: &str, routing_key: &str) -> bool {
    filter == "*" || filter == routing_key
}

/// A queue with its delivery channel.
///
/// The receiver is parked here until a consumer attaches, so the queue
/// buffers every matching delivery from bind time onward.
struct QueueSlot {
    tx: mpsc::UnboundedSender<Delivery>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Delivery>>>,
}

impl QueueSlot {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }
}

/// An in-process topic-routed broker.
pub struct MemoryBroker {
    /// Bindings indexed by topic: topic -> (queue name -> routing filter).
    bindings: DashMap<String, DashMap<String, String>>,
    /// Queues indexed by name.
    queues: DashMap<String, QueueSlot>,
}

impl MemoryBroker {
    /// Create a new broker with no topics or queues.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bindings: DashMap::new(),
            queues: DashMap::new(),
        }
    }

    /// Check if a queue exists.
    #[must_use]
    pub fn queue_exists(&self, queue: &str) -> bool {
        self.queues.contains_key(queue)
    }

    /// Get the number of queues bound to a topic.
    #[must_use]
    pub fn binding_count(&self, topic: &str) -> usize {
        self.bindings.get(topic).map(|b| b.len()).unwrap_or(0)
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(
        &self,
        topic: &str,
        routing_key: &str,
        payload: Bytes,
    ) -> Result<usize, BrokerError> {
        let mut delivered = 0;

        if let Some(bound) = self.bindings.get(topic) {
            for binding in bound.iter() {
                let (queue, filter) = (binding.key(), binding.value());
                if !filter_matches(filter, routing_key) {
                    continue;
                }
                if let Some(slot) = self.queues.get(queue) {
                    let delivery = Delivery {
                        topic: topic.to_string(),
                        routing_key: routing_key.to_string(),
                        payload: payload.clone(),
                    };
                    // A send failure means the consumer side is gone; the
                    // queue is torn down by unbind, not here.
                    if slot.tx.send(delivery).is_ok() {
                        delivered += 1;
                    }
                }
            }
        }

        trace!(topic = %topic, routing_key = %routing_key, recipients = delivered, "Published payload");
        Ok(delivered)
    }

    async fn bind_queue(
        &self,
        queue: &str,
        routing_filter: &str,
        topic: &str,
    ) -> Result<(), BrokerError> {
        validate_queue_name(queue).map_err(BrokerError::InvalidQueue)?;

        // Create the queue before installing the binding so a delivery
        // racing the bind never sees a binding without a queue.
        self.queues
            .entry(queue.to_string())
            .or_insert_with(QueueSlot::new);

        self.bindings
            .entry(topic.to_string())
            .or_default()
            .insert(queue.to_string(), routing_filter.to_string());

        debug!(queue = %queue, filter = %routing_filter, topic = %topic, "Bound queue");
        Ok(())
    }

    async fn unbind_queue(&self, queue: &str) -> Result<(), BrokerError> {
        let mut removed = false;
        for bound in self.bindings.iter() {
            if bound.remove(queue).is_some() {
                removed = true;
            }
        }

        // Dropping the slot drops the sender; an attached consumer drains
        // what is buffered and then sees the channel close.
        if self.queues.remove(queue).is_some() {
            removed = true;
        }

        if removed {
            debug!(queue = %queue, "Unbound queue");
        }
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<mpsc::UnboundedReceiver<Delivery>, BrokerError> {
        let slot = self
            .queues
            .get(queue)
            .ok_or_else(|| BrokerError::QueueNotFound(queue.to_string()))?;

        let rx = slot
            .rx
            .lock()
            .map_err(|e| BrokerError::Internal(e.to_string()))?
            .take();

        match rx {
            Some(rx) => {
                debug!(queue = %queue, "Consumer attached");
                Ok(rx)
            }
            None => {
                warn!(queue = %queue, "Second consumer rejected");
                Err(BrokerError::AlreadyConsumed(queue.to_string()))
            }
        }
    }
}
