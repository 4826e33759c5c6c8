//! # keva-client
//!
//! Client side of the Keva key/value eventing service.
//!
//! - **RpcClient** - issues verb requests over the broker and correlates
//!   responses by id; callers apply their own timeout around a call
//! - **SubscriptionHandle** - a bound event queue with explicit
//!   `start(callback)` and `cancel()`
//!
//! ## Example
//!
//! ```rust,ignore
//! let client = RpcClient::connect(broker).await?;
//!
//! let (snapshot, handle) = client.subscribe("*").await?;
//! client.put("Key1", "Value1").await?;
//!
//! handle.start(|event| println!("{:?}", event)).await?;
//! ```

pub mod rpc;
pub mod subscription;

pub use rpc::{ClientError, RpcClient};
pub use subscription::SubscriptionHandle;
