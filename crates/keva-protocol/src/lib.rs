//! # keva-protocol
//!
//! Wire contract for the Keva key/value eventing service.
//!
//! This crate defines everything that crosses the broker boundary:
//!
//! - `Entry` / `ChangeEvent` - stored pairs and the mutation events they produce
//! - `Request` / `Response` - verb-based RPC envelopes with correlation ids
//! - `codec` - length-prefixed MessagePack encoding for all of the above
//! - `topics` / `headers` - well-known routing names
//!
//! ## Example
//!
//! ```rust
//! use keva_protocol::{codec, Request};
//!
//! let request = Request::put(1, "greeting", "hello");
//!
//! // Encode and decode
//! let encoded = codec::encode(&request).unwrap();
//! let decoded: Request = codec::decode(&encoded).unwrap();
//! ```

pub mod codec;
pub mod entry;
pub mod envelope;

pub use codec::{decode, encode, CodecError};
pub use entry::{ChangeEvent, Entry, EventKind, WILDCARD};
pub use envelope::{Request, RequestId, Response, Status, Verb};

/// Well-known topic names on the broker.
pub mod topics {
    /// Topic carrying `ChangeEvent` payloads, routed by entry key.
    pub const EVENTS: &str = "keva.events";
    /// Topic carrying encoded `Request`s, routed by the caller's reply queue.
    pub const REQUESTS: &str = "keva.requests";
    /// Topic carrying encoded `Response`s, routed by reply queue name.
    pub const REPLIES: &str = "keva.replies";
}

/// Well-known envelope header names.
pub mod headers {
    /// Names the queue a caller wants bound for change events before the
    /// request's snapshot or mutation executes.
    pub const SUBSCRIPTION_QUEUE: &str = "x-subscription-queue";
}
