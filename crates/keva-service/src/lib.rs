//! # keva-service
//!
//! Server side of the Keva key/value eventing service.
//!
//! - **dispatcher** - routes verb requests to store operations, binds
//!   subscriptions before the snapshot they accompany, and maps outcomes
//!   to response statuses
//! - **rpc** - the serve loop consuming encoded requests from the broker
//! - **config** - TOML/environment configuration
//! - **metrics** - Prometheus instrumentation

pub mod config;
pub mod dispatcher;
pub mod metrics;
pub mod rpc;

pub use config::Config;
pub use dispatcher::{DispatcherConfig, RequestDispatcher};
