//! DispatcherHandle - the cloneable front door to a running dispatcher

use std::sync::Arc;

use contracts::{Event, HistorySource};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

use crate::dispatcher::{Command, RoutingSnapshot, ShutdownReport};
use crate::error::{DeliveryClosed, DispatcherError};
use crate::metrics::{DispatcherMetrics, MetricsSnapshot};
use crate::subscription::{DeliveryReceiver, Subscription, SubscriptionKey};

/// Handle to a running dispatcher
///
/// Every operation becomes a command on the dispatcher mailbox. Once the
/// dispatcher has shut down, every operation returns
/// [`DispatcherError::Closed`].
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<Command>,
    metrics: Arc<DispatcherMetrics>,
    queue_capacity: usize,
}

impl DispatcherHandle {
    pub(crate) fn new(
        tx: mpsc::Sender<Command>,
        metrics: Arc<DispatcherMetrics>,
        queue_capacity: usize,
    ) -> Self {
        Self {
            tx,
            metrics,
            queue_capacity,
        }
    }

    async fn send(&self, command: Command) -> Result<(), DispatcherError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| DispatcherError::Closed)
    }

    /// Associate a history source with a channel, replacing any previous one
    ///
    /// Replays already in progress keep the source they started with.
    pub async fn register_history<S>(
        &self,
        channel: impl Into<String>,
        source: S,
    ) -> Result<(), DispatcherError>
    where
        S: HistorySource + 'static,
    {
        self.register_history_arc(channel, Arc::new(source)).await
    }

    pub async fn register_history_arc(
        &self,
        channel: impl Into<String>,
        source: Arc<dyn HistorySource>,
    ) -> Result<(), DispatcherError> {
        self.send(Command::RegisterHistory {
            channel: channel.into(),
            source,
        })
        .await
    }

    /// Subscribe to a channel
    ///
    /// A non-empty `last_event_id` requests replay from the channel's history
    /// source, if one is registered. The returned [`Subscriber`] yields
    /// events until it is unsubscribed, evicted, or the dispatcher shuts down.
    #[instrument(name = "dispatcher_subscribe", skip(self, channel, last_event_id))]
    pub async fn subscribe(
        &self,
        channel: impl Into<String>,
        last_event_id: impl Into<String>,
    ) -> Result<Subscriber, DispatcherError> {
        let (subscription, receiver) =
            Subscription::new(channel, last_event_id, self.queue_capacity);
        let key = subscription.key();
        self.subscribe_with(subscription).await?;
        Ok(Subscriber { key, receiver })
    }

    /// Hand a pre-built subscription to the dispatcher
    ///
    /// If the dispatcher is closed the subscription's path is closed as it is
    /// dropped along with the rejected command.
    pub async fn subscribe_with(&self, subscription: Subscription) -> Result<(), DispatcherError> {
        self.send(Command::Subscribe(subscription)).await
    }

    /// Remove a subscription and close its path; unknown keys are a no-op
    pub async fn unsubscribe(&self, key: &SubscriptionKey) -> Result<(), DispatcherError> {
        self.send(Command::Unsubscribe(key.clone())).await
    }

    /// Unsubscribe without awaiting, for use from `Drop`
    ///
    /// Falls back to a spawned send when the mailbox is momentarily full.
    pub fn unsubscribe_detached(&self, key: SubscriptionKey) {
        match self.tx.try_send(Command::Unsubscribe(key)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(command)) => {
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    let tx = self.tx.clone();
                    runtime.spawn(async move {
                        let _ = tx.send(command).await;
                    });
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Dispatcher closed, unsubscribe skipped");
            }
        }
    }

    /// Publish an event to every listed channel
    ///
    /// Duplicate channel names deliver once. Channels with no subscribers are
    /// a no-op.
    pub async fn publish<I, S>(&self, channels: I, event: Event) -> Result<(), DispatcherError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let channels = channels.into_iter().map(Into::into).collect();
        self.send(Command::Publish { channels, event }).await
    }

    /// Current routing tables
    pub async fn snapshot(&self) -> Result<RoutingSnapshot, DispatcherError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx)).await?;
        rx.await.map_err(|_| DispatcherError::Closed)
    }

    /// Stop the dispatcher, closing every delivery path
    ///
    /// Only the first caller gets a report; later calls are rejected.
    #[instrument(name = "dispatcher_handle_shutdown", skip(self))]
    pub async fn shutdown(&self) -> Result<ShutdownReport, DispatcherError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown(tx)).await?;
        rx.await.map_err(|_| DispatcherError::Closed)
    }

    /// Get current metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Capacity of each subscriber's delivery queue
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Whether the dispatcher has stopped accepting commands
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A live subscription as seen by its consumer
#[derive(Debug)]
pub struct Subscriber {
    key: SubscriptionKey,
    receiver: DeliveryReceiver,
}

impl Subscriber {
    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    /// Next event, or `None` once the path is closed and drained
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Option<Event>, DeliveryClosed> {
        self.receiver.try_recv()
    }

    pub fn into_parts(self) -> (SubscriptionKey, DeliveryReceiver) {
        (self.key, self.receiver)
    }
}
