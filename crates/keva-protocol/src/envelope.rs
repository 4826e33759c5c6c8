//! Request and response envelopes.
//!
//! Every request carries an opaque correlation id; the matching response
//! carries the same id. Requests may additionally name a subscription queue
//! in their header map, which the dispatcher binds before executing the verb.

use crate::entry::Entry;
use crate::headers;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque correlation token linking a request to its response.
pub type RequestId = u64;

/// Request verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Put,
    Post,
    Delete,
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verb::Get => write!(f, "GET"),
            Verb::Put => write!(f, "PUT"),
            Verb::Post => write!(f, "POST"),
            Verb::Delete => write!(f, "DELETE"),
        }
    }
}

/// Response status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Successful read.
    Ok,
    /// PUT inserted a new entry.
    Created,
    /// PUT replaced an existing entry.
    Updated,
    /// DELETE removed one or more entries.
    Deleted,
    /// Client-caused failure: missing fields, unsupported verb, delete of
    /// an absent key.
    BadRequest,
    /// Unexpected failure while processing the request.
    InternalError,
}

impl Status {
    /// Whether this status reports a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Status::BadRequest | Status::InternalError)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::Created => write!(f, "CREATED"),
            Status::Updated => write!(f, "UPDATED"),
            Status::Deleted => write!(f, "DELETED"),
            Status::BadRequest => write!(f, "BAD_REQUEST"),
            Status::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}

/// A verb-based request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, echoed back in the response.
    pub id: RequestId,
    /// Request verb.
    pub verb: Verb,
    /// Target key, or the wildcard `"*"`.
    pub key: String,
    /// Value for PUT.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Header map; see [`crate::headers`] for well-known names.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

impl Request {
    /// Create a GET request.
    #[must_use]
    pub fn get(id: RequestId, key: impl Into<String>) -> Self {
        Self {
            id,
            verb: Verb::Get,
            key: key.into(),
            value: None,
            headers: HashMap::new(),
        }
    }

    /// Create a PUT request.
    #[must_use]
    pub fn put(id: RequestId, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id,
            verb: Verb::Put,
            key: key.into(),
            value: Some(value.into()),
            headers: HashMap::new(),
        }
    }

    /// Create a POST request.
    #[must_use]
    pub fn post(id: RequestId, key: impl Into<String>) -> Self {
        Self {
            id,
            verb: Verb::Post,
            key: key.into(),
            value: None,
            headers: HashMap::new(),
        }
    }

    /// Create a DELETE request.
    #[must_use]
    pub fn delete(id: RequestId, key: impl Into<String>) -> Self {
        Self {
            id,
            verb: Verb::Delete,
            key: key.into(),
            value: None,
            headers: HashMap::new(),
        }
    }

    /// Set a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Name the queue to bind for change events before the verb executes.
    #[must_use]
    pub fn with_subscription_queue(self, queue: impl Into<String>) -> Self {
        self.with_header(headers::SUBSCRIPTION_QUEUE, queue)
    }

    /// The subscription queue named by this request, if any.
    #[must_use]
    pub fn subscription_queue(&self) -> Option<&str> {
        self.headers.get(headers::SUBSCRIPTION_QUEUE).map(String::as_str)
    }
}

/// A response, always correlated to the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Same id as the request.
    pub id: RequestId,
    /// Outcome of the request.
    pub status: Status,
    /// Result entries; empty for errors and absent keys.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<Entry>,
    /// Human-readable error message for BAD_REQUEST / INTERNAL_ERROR.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Create a successful read response.
    #[must_use]
    pub fn ok(id: RequestId, entries: Vec<Entry>) -> Self {
        Self {
            id,
            status: Status::Ok,
            entries,
            error: None,
        }
    }

    /// Create a CREATED response for a fresh entry.
    #[must_use]
    pub fn created(id: RequestId, entry: Entry) -> Self {
        Self {
            id,
            status: Status::Created,
            entries: vec![entry],
            error: None,
        }
    }

    /// Create an UPDATED response for a replaced entry.
    #[must_use]
    pub fn updated(id: RequestId, entry: Entry) -> Self {
        Self {
            id,
            status: Status::Updated,
            entries: vec![entry],
            error: None,
        }
    }

    /// Create a DELETED response carrying the removed entries.
    #[must_use]
    pub fn deleted(id: RequestId, entries: Vec<Entry>) -> Self {
        Self {
            id,
            status: Status::Deleted,
            entries,
            error: None,
        }
    }

    /// Create a BAD_REQUEST response.
    #[must_use]
    pub fn bad_request(id: RequestId, message: impl Into<String>) -> Self {
        Self {
            id,
            status: Status::BadRequest,
            entries: Vec::new(),
            error: Some(message.into()),
        }
    }

    /// Create an INTERNAL_ERROR response.
    #[must_use]
    pub fn internal_error(id: RequestId, message: impl Into<String>) -> Self {
        Self {
            id,
            status: Status::InternalError,
            entries: Vec::new(),
            error: Some(message.into()),
        }
    }
}
