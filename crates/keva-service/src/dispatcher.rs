//! Request dispatching.
//!
//! The dispatcher is stateless across requests beyond the store. Every
//! request, valid or not, produces exactly one correlated response; errors
//! never propagate past this boundary.

use crate::metrics;
use keva_broker::{Broker, BrokerError};
use keva_core::{EntityStore, EventEmitter, SubscriptionBinder};
use keva_protocol::{EventKind, Request, Response, Verb, WILDCARD};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Dispatcher limits.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum accepted value size in bytes for PUT.
    pub max_value_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_value_size: 64 * 1024,
        }
    }
}

/// Routes verb requests to store operations and emits change events.
pub struct RequestDispatcher {
    store: Arc<EntityStore>,
    emitter: EventEmitter,
    binder: SubscriptionBinder,
    config: DispatcherConfig,
}

impl RequestDispatcher {
    /// Create a dispatcher with default limits over a fresh store.
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self::with_config(broker, DispatcherConfig::default())
    }

    /// Create a dispatcher with custom limits.
    #[must_use]
    pub fn with_config(broker: Arc<dyn Broker>, config: DispatcherConfig) -> Self {
        Self {
            store: Arc::new(EntityStore::new()),
            emitter: EventEmitter::new(broker.clone()),
            binder: SubscriptionBinder::new(broker),
            config,
        }
    }

    /// The dispatcher's store.
    #[must_use]
    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    /// Handle one request. Always produces a response carrying the
    /// request's correlation id.
    pub async fn dispatch(&self, request: Request) -> Response {
        let start = Instant::now();
        let verb = request.verb;

        let response = self.dispatch_inner(request).await;

        metrics::record_request(verb, response.status);
        metrics::record_latency(start.elapsed().as_secs_f64());
        metrics::set_store_entries(self.store.len());

        response
    }

    async fn dispatch_inner(&self, request: Request) -> Response {
        // The bind must be installed before the snapshot read or mutation
        // this request performs, so a mutation invisible in the returned
        // state is necessarily captured by the queue.
        if let Some(queue) = request.subscription_queue() {
            let filter = if request.key.is_empty() {
                WILDCARD
            } else {
                request.key.as_str()
            };

            if let Err(e) = self.binder.bind(queue, filter).await {
                warn!(id = request.id, queue = %queue, error = %e, "Subscription bind failed");
                return match e {
                    BrokerError::InvalidQueue(_) => Response::bad_request(request.id, e.to_string()),
                    _ => Response::internal_error(request.id, e.to_string()),
                };
            }
            metrics::record_subscription();
            debug!(id = request.id, queue = %queue, filter = %filter, "Subscription bound");
        }

        match request.verb {
            Verb::Get => self.handle_get(&request),
            Verb::Put => self.handle_put(request).await,
            Verb::Post => {
                // Deliberate stub reserved for future use.
                Response::bad_request(request.id, "POST is not supported by this service")
            }
            Verb::Delete => self.handle_delete(request).await,
        }
    }

    fn handle_get(&self, request: &Request) -> Response {
        if request.key.is_empty() {
            return Response::bad_request(request.id, "GET requires a key");
        }

        let entries = if request.key == WILDCARD {
            self.store.get_all()
        } else {
            // Absence is not an error for GET; the result set is empty.
            self.store.get(&request.key).into_iter().collect()
        };

        debug!(id = request.id, key = %request.key, count = entries.len(), "GET");
        Response::ok(request.id, entries)
    }

    async fn handle_put(&self, request: Request) -> Response {
        let Request { id, key, value, .. } = request;

        let value = match value {
            Some(value) if !key.is_empty() => value,
            _ => {
                return Response::bad_request(id, "PUT requires both a key and a value");
            }
        };

        if value.len() > self.config.max_value_size {
            return Response::bad_request(
                id,
                format!(
                    "value exceeds maximum size of {} bytes",
                    self.config.max_value_size
                ),
            );
        }

        let (entry, created) = self.store.put(key, value);
        let kind = if created {
            EventKind::Added
        } else {
            EventKind::Modified
        };

        if let Err(e) = self.emitter.emit(kind, entry.clone()).await {
            warn!(id = id, key = %entry.key, error = %e, "Event emission failed");
            return Response::internal_error(id, e.to_string());
        }
        metrics::record_event(kind);

        debug!(id = id, key = %entry.key, created = created, "PUT");
        if created {
            Response::created(id, entry)
        } else {
            Response::updated(id, entry)
        }
    }

    async fn handle_delete(&self, request: Request) -> Response {
        if request.key.is_empty() {
            return Response::bad_request(request.id, "DELETE requires a key");
        }

        if request.key == WILDCARD {
            let removed = self.store.delete_all();
            if let Err(e) = self.emitter.emit_removed(removed.clone()).await {
                warn!(id = request.id, error = %e, "Event emission failed");
                return Response::internal_error(request.id, e.to_string());
            }
            for _ in &removed {
                metrics::record_event(EventKind::Removed);
            }

            debug!(id = request.id, removed = removed.len(), "DELETE *");
            return Response::deleted(request.id, removed);
        }

        match self.store.delete(&request.key) {
            Ok(entry) => {
                if let Err(e) = self.emitter.emit(EventKind::Removed, entry.clone()).await {
                    warn!(id = request.id, key = %entry.key, error = %e, "Event emission failed");
                    return Response::internal_error(request.id, e.to_string());
                }
                metrics::record_event(EventKind::Removed);

                debug!(id = request.id, key = %entry.key, "DELETE");
                Response::deleted(request.id, vec![entry])
            }
            Err(e) => {
                debug!(id = request.id, key = %request.key, "DELETE of absent key");
                Response::bad_request(request.id, e.to_string())
            }
        }
    }
}
