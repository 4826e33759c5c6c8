//! Stored entries and the change events emitted when they mutate.

use serde::{Deserialize, Serialize};

/// The wildcard key, meaning "all keys" in GET, DELETE, and
/// subscription filters.
pub const WILDCARD: &str = "*";

/// A key/value pair stored by the service.
///
/// Entries are immutable once constructed; a mutation replaces the entry
/// under a key, never edits it in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique key within the store.
    pub key: String,
    /// Value stored under the key.
    pub value: String,
}

impl Entry {
    /// Create a new entry.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The kind of mutation a [`ChangeEvent`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    /// A previously absent key was inserted.
    Added,
    /// An existing key's value was replaced.
    Modified,
    /// An entry was removed.
    Removed,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Added => write!(f, "ADDED"),
            EventKind::Modified => write!(f, "MODIFIED"),
            EventKind::Removed => write!(f, "REMOVED"),
        }
    }
}

/// A notification describing exactly one mutation to one [`Entry`].
///
/// Events are fire-and-forget at publish time; the routing key lets the
/// broker filter delivery to bound queues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// What happened to the entry.
    pub kind: EventKind,
    /// The resulting entry (for REMOVED, the entry as it was removed).
    pub entry: Entry,
    /// Routing discriminator, always equal to `entry.key`.
    pub routing_key: String,
}

impl ChangeEvent {
    /// Create a change event for an entry. The routing key is derived from
    /// the entry's key.
    #[must_use]
    pub fn new(kind: EventKind, entry: Entry) -> Self {
        let routing_key = entry.key.clone();
        Self {
            kind,
            entry,
            routing_key,
        }
    }

    /// Create an ADDED event.
    #[must_use]
    pub fn added(entry: Entry) -> Self {
        Self::new(EventKind::Added, entry)
    }

    /// Create a MODIFIED event.
    #[must_use]
    pub fn modified(entry: Entry) -> Self {
        Self::new(EventKind::Modified, entry)
    }

    /// Create a REMOVED event.
    #[must_use]
    pub fn removed(entry: Entry) -> Self {
        Self::new(EventKind::Removed, entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let entry = Entry::new("Key1", "Value1");
        assert_eq!(entry.key, "Key1");
        assert_eq!(entry.value, "Value1");
    }

    #[test]
    fn test_change_event_routing_key() {
        let event = ChangeEvent::added(Entry::new("Key1", "Value1"));
        assert_eq!(event.routing_key, "Key1");
        assert_eq!(event.kind, EventKind::Added);
    }

    #[test]
    fn test_event_kind_display() {
        assert_eq!(EventKind::Added.to_string(), "ADDED");
        assert_eq!(EventKind::Modified.to_string(), "MODIFIED");
        assert_eq!(EventKind::Removed.to_string(), "REMOVED");
    }
}
