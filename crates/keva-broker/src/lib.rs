//! # keva-broker
//!
//! Topic-routed publish/subscribe boundary for the Keva service.
//!
//! The service core never talks to a wire protocol directly; it publishes
//! opaque payloads to topics and binds named queues with routing-key
//! filters. Everything behind that boundary is a [`Broker`] implementation.
//!
//! - **traits** - the `Broker` trait, deliveries, and errors
//! - **memory** - an in-process broker used for wiring and tests
//!
//! ```rust,ignore
//! use keva_broker::{Broker, MemoryBroker};
//!
//! let broker = MemoryBroker::new();
//! broker.bind_queue("events-q", "*", "keva.events").await?;
//! broker.publish("keva.events", "Key1", payload).await?;
//! let mut rx = broker.consume("events-q").await?;
//! ```

pub mod memory;
pub mod traits;

pub use memory::MemoryBroker;
pub use traits::{validate_queue_name, Broker, BrokerError, Delivery};
