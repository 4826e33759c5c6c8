//! Broker abstraction for Keva.
//!
//! These traits define the narrow interface the service core consumes,
//! keeping it agnostic of the actual message transport.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

/// Maximum queue name length.
pub const MAX_QUEUE_NAME_LENGTH: usize = 256;

/// Validate a queue name.
///
/// # Errors
///
/// Returns an error message if the queue name is invalid.
pub fn validate_queue_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Queue name cannot be empty");
    }
    if name.len() > MAX_QUEUE_NAME_LENGTH {
        return Err("Queue name too long");
    }
    if name.starts_with('$') {
        return Err("Queue names starting with '$' are reserved");
    }
    // Check for valid ASCII printable characters
    if !name.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        return Err("Queue name contains invalid characters");
    }
    Ok(())
}

/// A payload delivered to a bound queue.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Topic the payload was published to.
    pub topic: String,
    /// Routing key it was published with.
    pub routing_key: String,
    /// Opaque payload bytes.
    pub payload: Bytes,
}

/// Broker errors.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Invalid queue name.
    #[error("Invalid queue name: {0}")]
    InvalidQueue(&'static str),

    /// Queue not found.
    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    /// Queue already has a consumer.
    #[error("Queue already consumed: {0}")]
    AlreadyConsumed(String),

    /// Failed to publish a payload.
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    /// Internal broker error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A topic-routed publish/subscribe broker.
///
/// Payloads published to a topic are delivered to every queue bound to
/// that topic whose routing filter matches the payload's routing key.
/// A filter of `"*"` matches every routing key; any other filter matches
/// exactly. Delivery to a bound queue is ordered per routing key.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Publish a payload to a topic.
    ///
    /// Returns the number of queues the payload was delivered to.
    /// Publishing to a topic with no bindings is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker cannot accept the payload.
    async fn publish(
        &self,
        topic: &str,
        routing_key: &str,
        payload: Bytes,
    ) -> Result<usize, BrokerError>;

    /// Bind a queue to a topic with a routing filter.
    ///
    /// The queue is created on first bind and buffers deliveries from that
    /// moment, whether or not a consumer is attached. Rebinding an existing
    /// queue replaces its filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue name is invalid.
    async fn bind_queue(
        &self,
        queue: &str,
        routing_filter: &str,
        topic: &str,
    ) -> Result<(), BrokerError>;

    /// Remove a queue's bindings and release the queue.
    ///
    /// Idempotent: unbinding an unknown queue is a no-op. Deliveries already
    /// buffered may still be drained by an attached consumer; nothing new is
    /// buffered after unbind returns.
    ///
    /// # Errors
    ///
    /// Returns an error only on internal broker failure.
    async fn unbind_queue(&self, queue: &str) -> Result<(), BrokerError>;

    /// Attach the single consumer of a queue.
    ///
    /// Returns a receiver yielding everything buffered since bind time,
    /// then live deliveries until the queue is unbound.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue does not exist or already has a
    /// consumer.
    async fn consume(&self, queue: &str) -> Result<mpsc::UnboundedReceiver<Delivery>, BrokerError>;
}
