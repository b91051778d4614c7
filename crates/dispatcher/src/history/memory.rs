//! MemoryHistory - bounded in-memory replay buffer per channel

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use contracts::{Event, EventStream, HistorySource};
use futures::StreamExt;
use parking_lot::RwLock;
use tracing::debug;

/// Ring buffer of recent events, one per channel
///
/// Cloning shares the underlying buffers, so the same instance can be
/// registered with the dispatcher and appended to by publishers.
#[derive(Debug, Clone)]
pub struct MemoryHistory {
    channels: Arc<RwLock<HashMap<String, VecDeque<Event>>>>,
    capacity: usize,
}

impl MemoryHistory {
    /// Create a history keeping at most `capacity` events per channel
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Record an event, evicting the oldest once the channel is full
    pub fn append(&self, channel: &str, event: Event) {
        let mut channels = self.channels.write();
        let buffer = channels.entry(channel.to_string()).or_default();
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(event);
    }

    /// Retained events for a channel
    pub fn len(&self, channel: &str) -> usize {
        self.channels.read().get(channel).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, channel: &str) -> bool {
        self.len(channel) == 0
    }

    /// Events after `last_event_id`
    ///
    /// - id retained: everything after it
    /// - id not retained but numeric: retained events with a greater numeric id
    /// - otherwise: everything retained
    fn events_after(&self, channel: &str, last_event_id: &str) -> Vec<Event> {
        let channels = self.channels.read();
        let Some(buffer) = channels.get(channel) else {
            return Vec::new();
        };

        if let Some(pos) = buffer.iter().rposition(|e| e.id == last_event_id) {
            return buffer.iter().skip(pos + 1).cloned().collect();
        }

        match last_event_id.parse::<u64>() {
            Ok(last) => buffer
                .iter()
                .filter(|e| e.id.parse::<u64>().is_ok_and(|id| id > last))
                .cloned()
                .collect(),
            Err(_) => buffer.iter().cloned().collect(),
        }
    }
}

impl HistorySource for MemoryHistory {
    fn replay(&self, channel: &str, last_event_id: &str) -> EventStream {
        let events = self.events_after(channel, last_event_id);
        debug!(
            channel,
            last_event_id,
            count = events.len(),
            "MemoryHistory replay snapshot"
        );
        futures::stream::iter(events).boxed()
    }
}
