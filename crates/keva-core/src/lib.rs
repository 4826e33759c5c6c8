//! # keva-core
//!
//! Core state and eventing for the Keva key/value service.
//!
//! This crate provides the building blocks between the wire contract and
//! the broker boundary:
//!
//! - **EntityStore** - concurrent key/value table with CRUD semantics
//! - **EventEmitter** - turns store mutations into published change events
//! - **SubscriptionBinder** - binds delivery queues to the events topic
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐     ┌──────────────┐     ┌────────────┐
//! │ Dispatcher │────▶│ EntityStore  │     │   Broker   │
//! └────────────┘     └──────────────┘     └────────────┘
//!        │                                      ▲
//!        │           ┌──────────────┐           │
//!        ├──────────▶│ EventEmitter │───────────┤
//!        │           └──────────────┘           │
//!        │           ┌──────────────┐           │
//!        └──────────▶│    Binder    │───────────┘
//!                    └──────────────┘
//! ```

pub mod binder;
pub mod emitter;
pub mod store;

pub use binder::SubscriptionBinder;
pub use emitter::{EmitError, EventEmitter};
pub use store::{EntityStore, StoreError};
