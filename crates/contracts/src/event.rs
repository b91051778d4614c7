//! Event - the unit fanned out to subscribers

use serde::{Deserialize, Serialize};

/// A published event
///
/// Immutable once created. `id` is what a reconnecting client reports as its
/// last seen identifier; `event` is the optional type name carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier
    pub id: String,

    /// Event type name (None = default "message")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    /// UTF-8 payload
    pub data: String,
}

impl Event {
    /// Create an untyped event
    pub fn new(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            event: None,
            data: data.into(),
        }
    }

    /// Set the event type name
    pub fn with_event(mut self, name: impl Into<String>) -> Self {
        self.event = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_omits_missing_type() {
        let json = serde_json::to_string(&Event::new("7", "hello")).unwrap();
        assert_eq!(json, r#"{"id":"7","data":"hello"}"#);
    }

    #[test]
    fn test_event_json_with_type() {
        let ev: Event =
            serde_json::from_str(r#"{"id":"8","event":"alert","data":"x"}"#).unwrap();
        assert_eq!(ev, Event::new("8", "x").with_event("alert"));
    }
}
