//! RPC serve loop.
//!
//! Requests arrive as encoded payloads on the service's request queue; the
//! delivery's routing key names the caller's reply queue. Every delivery
//! produces exactly one response on the replies topic, even when the
//! request cannot be decoded.

use crate::dispatcher::RequestDispatcher;
use crate::metrics;
use anyhow::{Context, Result};
use keva_broker::Broker;
use keva_protocol::{codec, topics, Request, Response, WILDCARD};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Default request queue name.
pub const DEFAULT_REQUEST_QUEUE: &str = "keva.rpc";

/// Run the serve loop until the request queue closes.
///
/// # Errors
///
/// Returns an error if the request queue cannot be bound or consumed.
pub async fn serve(
    broker: Arc<dyn Broker>,
    dispatcher: Arc<RequestDispatcher>,
    request_queue: &str,
) -> Result<()> {
    broker
        .bind_queue(request_queue, WILDCARD, topics::REQUESTS)
        .await
        .context("Failed to bind request queue")?;

    let mut rx = broker
        .consume(request_queue)
        .await
        .context("Failed to consume request queue")?;

    info!(queue = %request_queue, "Keva RPC service listening");

    while let Some(delivery) = rx.recv().await {
        let reply_to = delivery.routing_key;

        let response = match codec::decode::<Request>(&delivery.payload) {
            Ok(request) => {
                debug!(id = request.id, verb = %request.verb, key = %request.key, "Request received");
                dispatcher.dispatch(request).await
            }
            Err(e) => {
                // The envelope itself is unreadable; the correlation id is
                // unknown, so the caller sees id 0.
                warn!(error = %e, "Undecodable request");
                metrics::record_error("decode");
                Response::internal_error(0, format!("failed to decode request: {e}"))
            }
        };

        match codec::encode(&response) {
            Ok(payload) => {
                if let Err(e) = broker.publish(topics::REPLIES, &reply_to, payload).await {
                    warn!(reply_to = %reply_to, error = %e, "Failed to publish response");
                    metrics::record_error("publish");
                }
            }
            Err(e) => {
                error!(id = response.id, error = %e, "Failed to encode response");
                metrics::record_error("encode");
            }
        }
    }

    info!(queue = %request_queue, "Request queue closed; serve loop exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use keva_broker::MemoryBroker;
    use keva_protocol::Status;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn start_service(broker: Arc<MemoryBroker>) {
        let dispatcher = Arc::new(RequestDispatcher::new(broker.clone() as Arc<dyn Broker>));
        let serve_broker = broker.clone() as Arc<dyn Broker>;
        tokio::spawn(async move {
            let _ = serve(serve_broker, dispatcher, DEFAULT_REQUEST_QUEUE).await;
        });

        // Wait for the serve loop to bind its request queue.
        while !broker.queue_exists(DEFAULT_REQUEST_QUEUE) {
            tokio::task::yield_now().await;
        }
    }

    async fn call(broker: &MemoryBroker, reply_queue: &str, request: &Request) -> Response {
        let payload = codec::encode(request).unwrap();
        broker
            .publish(topics::REQUESTS, reply_queue, payload)
            .await
            .unwrap();

        let mut rx = broker.consume(reply_queue).await.unwrap();
        let delivery = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        codec::decode(&delivery.payload).unwrap()
    }

    #[tokio::test]
    async fn test_serve_round_trip() {
        let broker = Arc::new(MemoryBroker::new());
        broker
            .bind_queue("reply-1", "reply-1", topics::REPLIES)
            .await
            .unwrap();
        start_service(broker.clone()).await;

        let response = call(&broker, "reply-1", &Request::put(7, "Key1", "Value1")).await;
        assert_eq!(response.id, 7);
        assert_eq!(response.status, Status::Created);
    }

    #[tokio::test]
    async fn test_serve_answers_undecodable_request() {
        let broker = Arc::new(MemoryBroker::new());
        broker
            .bind_queue("reply-2", "reply-2", topics::REPLIES)
            .await
            .unwrap();
        start_service(broker.clone()).await;

        broker
            .publish(
                topics::REQUESTS,
                "reply-2",
                Bytes::from_static(&[0, 0, 0, 2, 0xc1, 0xc1]),
            )
            .await
            .unwrap();

        let mut rx = broker.consume("reply-2").await.unwrap();
        let delivery = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let response: Response = codec::decode(&delivery.payload).unwrap();
        assert_eq!(response.id, 0);
        assert_eq!(response.status, Status::InternalError);
    }

    #[tokio::test]
    async fn test_dispatcher_survives_bad_requests() {
        let broker = Arc::new(MemoryBroker::new());
        broker
            .bind_queue("reply-3", "reply-3", topics::REPLIES)
            .await
            .unwrap();
        start_service(broker.clone()).await;

        let payload = codec::encode(&Request::delete(1, "missing")).unwrap();
        broker
            .publish(topics::REQUESTS, "reply-3", payload)
            .await
            .unwrap();
        let payload = codec::encode(&Request::put(2, "Key1", "Value1")).unwrap();
        broker
            .publish(topics::REQUESTS, "reply-3", payload)
            .await
            .unwrap();

        let mut rx = broker.consume("reply-3").await.unwrap();
        let first: Response = codec::decode(
            &timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap()
                .payload,
        )
        .unwrap();
        let second: Response = codec::decode(
            &timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap()
                .payload,
        )
        .unwrap();

        assert_eq!(first.status, Status::BadRequest);
        assert_eq!(second.status, Status::Created);
    }
}
