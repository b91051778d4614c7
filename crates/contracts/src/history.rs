//! HistorySource trait - pluggable per-channel replay provider
//!
//! The dispatcher never stores events itself. Replay to reconnecting
//! subscribers is delegated to whatever source is registered for a channel.

use futures::stream::BoxStream;

use crate::Event;

/// Lazy, finite, oldest-first sequence of events
pub type EventStream = BoxStream<'static, Event>;

/// Provider of past events for one or more channels
///
/// # Contract
///
/// - `replay` returns the events that occurred on `channel` strictly after
///   `last_event_id`, oldest first
/// - the stream must be finite and must not stall indefinitely
/// - implementations must tolerate concurrent calls for different
///   `(channel, last_event_id)` pairs
///
/// # Example
///
/// ```ignore
/// use futures::StreamExt;
///
/// let source = |_channel: &str, _last: &str| -> EventStream {
///     futures::stream::iter(vec![Event::new("6", "late")]).boxed()
/// };
/// dispatcher.register_history("news", source).await?;
/// ```
pub trait HistorySource: Send + Sync {
    /// Events on `channel` after `last_event_id`
    fn replay(&self, channel: &str, last_event_id: &str) -> EventStream;
}

impl<F> HistorySource for F
where
    F: Fn(&str, &str) -> EventStream + Send + Sync,
{
    fn replay(&self, channel: &str, last_event_id: &str) -> EventStream {
        self(channel, last_event_id)
    }
}
