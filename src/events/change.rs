//! Change events as delivered by a configuration transport.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    /// Metric/log label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        }
    }
}

/// A single key change. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    key: String,
    #[serde(default)]
    old_value: Option<String>,
    #[serde(default)]
    new_value: Option<String>,
    kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(
        key: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
        kind: ChangeKind,
    ) -> Self {
        Self {
            key: key.into(),
            old_value,
            new_value,
            kind,
        }
    }

    pub fn added(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, None, Some(value.into()), ChangeKind::Added)
    }

    pub fn modified(
        key: impl Into<String>,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self::new(
            key,
            Some(old_value.into()),
            Some(new_value.into()),
            ChangeKind::Modified,
        )
    }

    pub fn deleted(key: impl Into<String>, old_value: impl Into<String>) -> Self {
        Self::new(key, Some(old_value.into()), None, ChangeKind::Deleted)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn old_value(&self) -> Option<&str> {
        self.old_value.as_deref()
    }

    pub fn new_value(&self) -> Option<&str> {
        self.new_value.as_deref()
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }
}

/// Events delivered together by one configuration push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    id: Uuid,
    events: Vec<ChangeEvent>,
}

impl ChangeBatch {
    /// Wrap events in a batch with a fresh correlation id.
    pub fn new(events: Vec<ChangeEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            events,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let json = r#"{"key":"gateway.routes[0].uri","old_value":"http://a","new_value":"http://b","kind":"MODIFIED"}"#;
        let event: ChangeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind(), ChangeKind::Modified);
        assert_eq!(event.old_value(), Some("http://a"));
        assert_eq!(event.new_value(), Some("http://b"));

        let deleted: ChangeEvent =
            serde_json::from_str(r#"{"key":"gateway.routes[0].id","kind":"DELETED"}"#).unwrap();
        assert_eq!(deleted.old_value(), None);
    }

    #[test]
    fn test_batches_get_distinct_ids() {
        let a = ChangeBatch::new(vec![]);
        let b = ChangeBatch::new(vec![]);
        assert_ne!(a.id(), b.id());
        assert!(a.is_empty());
    }
}
