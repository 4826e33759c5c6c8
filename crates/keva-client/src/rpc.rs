//! Client-side RPC over the broker.
//!
//! The client binds a private reply queue on the replies topic, publishes
//! encoded requests routed by that queue's name, and resolves pending calls
//! as correlated responses arrive. Correlation never blocks indefinitely on
//! its own; a caller that wants a deadline wraps `call` in a timeout and
//! treats expiry as failure.

use crate::subscription::SubscriptionHandle;
use dashmap::DashMap;
use keva_broker::{Broker, BrokerError};
use keva_protocol::{codec, topics, CodecError, Entry, Request, RequestId, Response, WILDCARD};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Broker operation failed.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// Payload could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The reply queue closed before a response arrived.
    #[error("Disconnected before a response arrived")]
    Disconnected,
}

/// Counter ensuring unique queue names even within the same nanosecond.
static QUEUE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique queue name with the given prefix.
fn generate_queue_name(prefix: &str) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let counter = QUEUE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}.{timestamp:x}.{counter}")
}

/// A client issuing verb requests and receiving correlated responses.
pub struct RpcClient {
    broker: Arc<dyn Broker>,
    reply_queue: String,
    next_id: AtomicU64,
    pending: Arc<DashMap<RequestId, oneshot::Sender<Response>>>,
    pump: JoinHandle<()>,
}

impl RpcClient {
    /// Connect a client: bind a private reply queue and start the
    /// response pump.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply queue cannot be bound or consumed.
    pub async fn connect(broker: Arc<dyn Broker>) -> Result<Self, ClientError> {
        let reply_queue = generate_queue_name("keva.reply");
        broker
            .bind_queue(&reply_queue, &reply_queue, topics::REPLIES)
            .await?;
        let mut rx = broker.consume(&reply_queue).await?;

        let pending: Arc<DashMap<RequestId, oneshot::Sender<Response>>> = Arc::new(DashMap::new());
        let pump_pending = Arc::clone(&pending);
        let pump = tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                match codec::decode::<Response>(&delivery.payload) {
                    Ok(response) => match pump_pending.remove(&response.id) {
                        Some((_, tx)) => {
                            // The caller may have given up already.
                            let _ = tx.send(response);
                        }
                        None => {
                            warn!(id = response.id, "Response with no pending request");
                        }
                    },
                    Err(e) => warn!(error = %e, "Undecodable response"),
                }
            }
        });

        debug!(reply_queue = %reply_queue, "Client connected");
        Ok(Self {
            broker,
            reply_queue,
            next_id: AtomicU64::new(1),
            pending,
            pump,
        })
    }

    fn next_id(&self) -> RequestId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Issue a request and await its correlated response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be encoded or published, or
    /// if the client disconnects before the response arrives.
    pub async fn call(&self, request: Request) -> Result<Response, ClientError> {
        let id = request.id;
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        let payload = match codec::encode(&request) {
            Ok(payload) => payload,
            Err(e) => {
                self.pending.remove(&id);
                return Err(e.into());
            }
        };

        if let Err(e) = self
            .broker
            .publish(topics::REQUESTS, &self.reply_queue, payload)
            .await
        {
            self.pending.remove(&id);
            return Err(e.into());
        }

        rx.await.map_err(|_| ClientError::Disconnected)
    }

    /// GET a single key; absence yields an empty response, not an error.
    ///
    /// # Errors
    ///
    /// Propagates transport failures from [`Self::call`].
    pub async fn get(&self, key: &str) -> Result<Response, ClientError> {
        self.call(Request::get(self.next_id(), key)).await
    }

    /// GET all entries.
    ///
    /// # Errors
    ///
    /// Propagates transport failures from [`Self::call`].
    pub async fn get_all(&self) -> Result<Response, ClientError> {
        self.call(Request::get(self.next_id(), WILDCARD)).await
    }

    /// PUT a key/value pair.
    ///
    /// # Errors
    ///
    /// Propagates transport failures from [`Self::call`].
    pub async fn put(&self, key: &str, value: &str) -> Result<Response, ClientError> {
        self.call(Request::put(self.next_id(), key, value)).await
    }

    /// DELETE a single key.
    ///
    /// # Errors
    ///
    /// Propagates transport failures from [`Self::call`].
    pub async fn delete(&self, key: &str) -> Result<Response, ClientError> {
        self.call(Request::delete(self.next_id(), key)).await
    }

    /// DELETE all entries.
    ///
    /// # Errors
    ///
    /// Propagates transport failures from [`Self::call`].
    pub async fn delete_all(&self) -> Result<Response, ClientError> {
        self.call(Request::delete(self.next_id(), WILDCARD)).await
    }

    /// Subscribe to change events for `key_filter` (a key or `"*"`).
    ///
    /// Issues a GET carrying a fresh subscription queue name. The service
    /// binds the queue before taking the snapshot returned here, so no
    /// mutation can be missing from both the snapshot and the queue.
    ///
    /// # Errors
    ///
    /// Propagates transport failures from [`Self::call`].
    pub async fn subscribe(
        &self,
        key_filter: &str,
    ) -> Result<(Vec<Entry>, SubscriptionHandle), ClientError> {
        let queue = generate_queue_name("keva.sub");
        let snapshot = self
            .call(Request::get(self.next_id(), key_filter).with_subscription_queue(&queue))
            .await?;

        debug!(queue = %queue, filter = %key_filter, "Subscribed");
        let handle = SubscriptionHandle::new(Arc::clone(&self.broker), queue);
        Ok((snapshot.entries, handle))
    }

    /// Disconnect: stop the response pump and release the reply queue.
    ///
    /// Pending calls resolve with [`ClientError::Disconnected`].
    pub async fn close(self) {
        self.pump.abort();
        self.pending.clear();
        if let Err(e) = self.broker.unbind_queue(&self.reply_queue).await {
            warn!(reply_queue = %self.reply_queue, error = %e, "Reply queue release failed");
        }
        debug!(reply_queue = %self.reply_queue, "Client closed");
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
