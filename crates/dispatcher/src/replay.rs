//! Replay task - history first, then staged live events
//!
//! While a replay runs the dispatcher routes live events for the subscription
//! into a staging queue instead of its delivery path. The task drains the
//! history source onto the path, then forwards the staging queue for the rest
//! of the subscription's life. A subscriber therefore sees history in source
//! order followed by live events in dispatch order. Live events that repeat a
//! replayed id are skipped until the first live event history did not cover.

use std::collections::HashSet;
use std::sync::Arc;

use async_channel::Receiver;
use contracts::{Event, HistorySource};
use futures::StreamExt;
use tracing::{debug, instrument};

use crate::metrics::DispatcherMetrics;
use crate::subscription::{DeliveryPath, SubscriptionKey};

/// How a replay task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReplayOutcome {
    /// History exhausted and the staging queue closed by the dispatcher
    Completed { replayed: u64 },
    /// The delivery path closed underneath the task
    PathClosed { replayed: u64 },
}

pub(crate) struct ReplayTask {
    pub key: SubscriptionKey,
    pub last_event_id: String,
    pub source: Arc<dyn HistorySource>,
    pub path: DeliveryPath,
    pub staged: Receiver<Event>,
    pub metrics: Arc<DispatcherMetrics>,
}

impl ReplayTask {
    /// Spawn onto the runtime; the task is detached
    pub fn spawn(self) {
        tokio::spawn(self.run());
    }

    #[instrument(
        name = "replay_task",
        skip(self),
        fields(subscription = %self.key.id, channel = %self.key.channel, last_event_id = %self.last_event_id)
    )]
    pub async fn run(self) -> ReplayOutcome {
        self.metrics.inc_replays_started();
        observability::record_replay_started(&self.key.channel);

        let outcome = self.drive().await;

        let replayed = match outcome {
            ReplayOutcome::Completed { replayed } | ReplayOutcome::PathClosed { replayed } => {
                replayed
            }
        };
        self.metrics.inc_replays_finished();
        self.metrics.add_replayed_events(replayed);
        observability::record_replay_finished(&self.key.channel, replayed);
        debug!(?outcome, "Replay task finished");

        outcome
    }

    async fn drive(&self) -> ReplayOutcome {
        let mut history = self.source.replay(&self.key.channel, &self.last_event_id);
        let mut replayed_ids = HashSet::new();
        let mut replayed = 0u64;

        while let Some(event) = history.next().await {
            let id = event.id.clone();
            if self.path.push(event).await.is_err() {
                return ReplayOutcome::PathClosed { replayed };
            }
            // Empty ids carry no identity and are never deduplicated
            if !id.is_empty() {
                replayed_ids.insert(id);
            }
            replayed += 1;
        }

        debug!(replayed, "History drained, switching to live");

        // The first live event that history did not cover marks the end of
        // the overlap; from there on ids are never checked.
        while let Ok(event) = self.staged.recv().await {
            if !replayed_ids.is_empty() {
                if replayed_ids.remove(&event.id) {
                    continue;
                }
                replayed_ids = HashSet::new();
            }
            if self.path.push(event).await.is_err() {
                return ReplayOutcome::PathClosed { replayed };
            }
        }

        ReplayOutcome::Completed { replayed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::Subscription;
    use contracts::EventStream;

    fn source(ids: &'static [&'static str]) -> Arc<dyn HistorySource> {
        Arc::new(move |_channel: &str, _last: &str| -> EventStream {
            futures::stream::iter(ids.iter().map(|id| Event::new(*id, "history"))).boxed()
        })
    }

    fn task(
        sub: &Subscription,
        source: Arc<dyn HistorySource>,
        staged: Receiver<Event>,
    ) -> ReplayTask {
        ReplayTask {
            key: sub.key(),
            last_event_id: sub.last_event_id().to_string(),
            source,
            path: sub.path().clone(),
            staged,
            metrics: Arc::new(DispatcherMetrics::new()),
        }
    }

    #[tokio::test]
    async fn test_history_before_staged_live() {
        let (sub, mut rx) = Subscription::new("news", "5", 16);
        let (staged_tx, staged_rx) = async_channel::bounded(16);

        // Live event staged before the history is even read
        staged_tx.send(Event::new("9", "live")).await.unwrap();
        drop(staged_tx);

        let outcome = task(&sub, source(&["6", "7", "8"]), staged_rx).run().await;
        assert_eq!(outcome, ReplayOutcome::Completed { replayed: 3 });

        let mut ids = Vec::new();
        while let Ok(Some(event)) = rx.try_recv() {
            ids.push(event.id);
        }
        assert_eq!(ids, vec!["6", "7", "8", "9"]);
    }

    #[tokio::test]
    async fn test_live_duplicate_of_history_is_skipped() {
        let (sub, mut rx) = Subscription::new("news", "5", 16);
        let (staged_tx, staged_rx) = async_channel::bounded(16);
        staged_tx.send(Event::new("8", "live")).await.unwrap();
        staged_tx.send(Event::new("9", "live")).await.unwrap();
        drop(staged_tx);

        task(&sub, source(&["6", "7", "8"]), staged_rx).run().await;

        let mut ids = Vec::new();
        while let Ok(Some(event)) = rx.try_recv() {
            ids.push(event.id);
        }
        assert_eq!(ids, vec!["6", "7", "8", "9"]);
    }

    #[tokio::test]
    async fn test_empty_ids_are_never_deduplicated() {
        let (sub, mut rx) = Subscription::new("news", "5", 16);
        let (staged_tx, staged_rx) = async_channel::bounded(16);
        staged_tx.send(Event::new("", "live")).await.unwrap();
        drop(staged_tx);

        task(&sub, source(&["6", ""]), staged_rx).run().await;

        let mut events = Vec::new();
        while let Ok(Some(event)) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 3);
        assert_eq!(events[2], Event::new("", "live"));
    }

    #[tokio::test]
    async fn test_reused_id_after_catch_up_is_delivered() {
        let (sub, mut rx) = Subscription::new("news", "5", 16);
        let (staged_tx, staged_rx) = async_channel::bounded(16);
        let replay = tokio::spawn(task(&sub, source(&["6", "7"]), staged_rx).run());

        assert_eq!(rx.recv().await.unwrap().id, "6");
        assert_eq!(rx.recv().await.unwrap().id, "7");

        // A copy of "7" routed only after the history drained is still a duplicate
        staged_tx.send(Event::new("7", "late copy")).await.unwrap();
        staged_tx.send(Event::new("8", "live")).await.unwrap();
        // Past the overlap: a reused id is an ordinary live event
        staged_tx.send(Event::new("6", "reused")).await.unwrap();
        drop(staged_tx);
        replay.await.unwrap();

        let mut events = Vec::new();
        while let Ok(Some(event)) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events, vec![Event::new("8", "live"), Event::new("6", "reused")]);
    }

    #[tokio::test]
    async fn test_closed_path_ends_replay_early() {
        let (sub, rx) = Subscription::new("news", "5", 1);
        let (_staged_tx, staged_rx) = async_channel::bounded(1);
        drop(rx);

        let outcome = task(&sub, source(&["6", "7", "8"]), staged_rx).run().await;
        assert_eq!(outcome, ReplayOutcome::PathClosed { replayed: 0 });
    }

    #[tokio::test]
    async fn test_metrics_recorded() {
        let (sub, _rx) = Subscription::new("news", "5", 16);
        let (staged_tx, staged_rx) = async_channel::bounded(1);
        drop(staged_tx);

        let replay = task(&sub, source(&["6", "7"]), staged_rx);
        let metrics = Arc::clone(&replay.metrics);
        replay.run().await;

        assert_eq!(metrics.replays_started(), 1);
        assert_eq!(metrics.replays_finished(), 1);
        assert_eq!(metrics.replayed_events(), 2);
    }
}
