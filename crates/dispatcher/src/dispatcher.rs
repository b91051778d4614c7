//! Dispatcher - the single owner of routing state
//!
//! All table mutations and routing decisions go through one mailbox and are
//! applied one command at a time, so no two operations ever interleave their
//! effects on the subscription or history tables.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use contracts::{BackpressurePolicy, DeliveryConfig, Event, HistorySource};
use observability::DeliveryOutcome;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::PushError;
use crate::handle::DispatcherHandle;
use crate::metrics::DispatcherMetrics;
use crate::replay::ReplayTask;
use crate::subscription::{DeliveryPath, Subscription, SubscriptionId, SubscriptionKey};

/// Messages accepted by the dispatcher mailbox
pub(crate) enum Command {
    RegisterHistory {
        channel: String,
        source: Arc<dyn HistorySource>,
    },
    Subscribe(Subscription),
    Unsubscribe(SubscriptionKey),
    Publish {
        channels: Vec<String>,
        event: Event,
    },
    Snapshot(oneshot::Sender<RoutingSnapshot>),
    Shutdown(oneshot::Sender<ShutdownReport>),
}

/// Point-in-time view of the routing tables
///
/// A channel exists while it has at least one subscriber or a registered
/// history source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoutingSnapshot {
    pub channels: BTreeMap<String, ChannelSnapshot>,
}

impl RoutingSnapshot {
    /// Subscriber count for a channel (0 when unknown)
    pub fn subscribers(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, |c| c.subscribers)
    }

    pub fn total_subscribers(&self) -> usize {
        self.channels.values().map(|c| c.subscribers).sum()
    }

    pub fn has_history(&self, channel: &str) -> bool {
        self.channels.get(channel).is_some_and(|c| c.has_history)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelSnapshot {
    pub subscribers: usize,
    pub has_history: bool,
}

/// Result of a shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Delivery paths closed by the shutdown
    pub closed: usize,
    /// Commands still queued when the shutdown was processed
    pub discarded: usize,
}

/// One routed subscription
///
/// `inlet` is where live events are pushed: the delivery path itself, or the
/// staging queue of a running replay.
struct Route {
    path: DeliveryPath,
    inlet: DeliveryPath,
}

impl Route {
    /// Close staging and the delivery path; true if this closed the path
    fn close(&self) -> bool {
        let closed = self.path.close();
        self.inlet.close();
        closed
    }
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DeliveryConfig,
    histories: HashMap<String, Arc<dyn HistorySource>>,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(config: DeliveryConfig) -> Self {
        Self {
            config,
            histories: HashMap::new(),
        }
    }

    /// Pre-register a history source for a channel
    pub fn history(self, channel: impl Into<String>, source: impl HistorySource + 'static) -> Self {
        self.history_arc(channel, Arc::new(source))
    }

    /// Pre-register a shared history source for a channel
    pub fn history_arc(mut self, channel: impl Into<String>, source: Arc<dyn HistorySource>) -> Self {
        self.histories.insert(channel.into(), source);
        self
    }

    /// Build the dispatcher and the handle used to reach it
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(histories = self.histories.len())
    )]
    pub fn build(self) -> (Dispatcher, DispatcherHandle) {
        let (tx, mailbox) = mpsc::channel(self.config.mailbox_capacity.max(1));
        let metrics = Arc::new(DispatcherMetrics::new());
        let handle = DispatcherHandle::new(tx, Arc::clone(&metrics), self.config.queue_capacity);

        let dispatcher = Dispatcher {
            config: self.config,
            mailbox,
            routes: HashMap::new(),
            histories: self.histories,
            metrics,
        };
        (dispatcher, handle)
    }
}

/// The dispatcher actor
pub struct Dispatcher {
    config: DeliveryConfig,
    mailbox: mpsc::Receiver<Command>,
    routes: HashMap<String, HashMap<SubscriptionId, Route>>,
    histories: HashMap<String, Arc<dyn HistorySource>>,
    metrics: Arc<DispatcherMetrics>,
}

impl Dispatcher {
    /// Run the dispatcher main loop
    ///
    /// Processes commands until `Shutdown` is received or every handle is
    /// dropped; either way all delivery paths are closed before returning.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) {
        info!(
            backpressure = ?self.config.backpressure,
            queue_capacity = self.config.queue_capacity,
            histories = self.histories.len(),
            "Dispatcher started"
        );

        let mut reply = None;
        while let Some(command) = self.mailbox.recv().await {
            match command {
                Command::RegisterHistory { channel, source } => {
                    self.handle_register_history(channel, source)
                }
                Command::Subscribe(subscription) => self.handle_subscribe(subscription),
                Command::Unsubscribe(key) => self.handle_unsubscribe(&key),
                Command::Publish { channels, event } => {
                    self.handle_publish(&channels, event).await
                }
                Command::Snapshot(tx) => {
                    let _ = tx.send(self.snapshot());
                }
                Command::Shutdown(tx) => {
                    reply = Some(tx);
                    break;
                }
            }
        }

        if reply.is_none() {
            info!("All dispatcher handles dropped, shutting down");
        }

        let closed = self.close_all();
        let discarded = self.discard_pending();
        let report = ShutdownReport { closed, discarded };

        info!(
            closed = report.closed,
            discarded = report.discarded,
            published = self.metrics.published(),
            "Dispatcher shutdown complete"
        );

        if let Some(tx) = reply {
            let _ = tx.send(report);
        }
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    fn handle_register_history(&mut self, channel: String, source: Arc<dyn HistorySource>) {
        let replaced = self.histories.insert(channel.clone(), source).is_some();
        debug!(channel = %channel, replaced, "History source registered");
    }

    fn handle_subscribe(&mut self, subscription: Subscription) {
        if subscription.path().is_closed() {
            debug!(subscription = %subscription.id(), "Subscriber gone before registration");
            return;
        }

        let source = if subscription.wants_replay() {
            self.histories.get(subscription.channel()).cloned()
        } else {
            None
        };
        let (key, last_event_id, path) = subscription.into_parts();

        let inlet = match source {
            Some(source) => {
                let (staging, staged) = DeliveryPath::bounded(self.config.replay_buffer);
                ReplayTask {
                    key: key.clone(),
                    last_event_id,
                    source,
                    path: path.clone(),
                    staged,
                    metrics: Arc::clone(&self.metrics),
                }
                .spawn();
                staging
            }
            None => path.clone(),
        };
        let replaying = !inlet.same_channel(&path);

        let members = self.routes.entry(key.channel.clone()).or_default();
        members.insert(key.id, Route { path, inlet });
        let count = members.len();

        self.refresh_subscriber_gauges(&key.channel, count);
        debug!(
            subscription = %key.id,
            channel = %key.channel,
            replaying,
            subscribers = count,
            "Subscribed"
        );
    }

    fn handle_unsubscribe(&mut self, key: &SubscriptionKey) {
        if let Some(route) = self.remove_route(key) {
            route.close();
            debug!(subscription = %key.id, channel = %key.channel, "Unsubscribed");
        }
    }

    async fn handle_publish(&mut self, channels: &[String], event: Event) {
        self.metrics.inc_published();
        let policy = self.config.backpressure;

        let mut seen = HashSet::new();
        for channel in channels {
            if !seen.insert(channel.as_str()) {
                continue;
            }
            observability::record_event_published(channel);

            let Some(members) = self.routes.get(channel) else {
                continue;
            };

            let mut gone = Vec::new();
            for (id, route) in members {
                let outcome = offer(&route.inlet, event.clone(), policy).await;
                observability::record_delivery(channel, outcome);
                match outcome {
                    DeliveryOutcome::Delivered => self.metrics.inc_delivered(),
                    DeliveryOutcome::Dropped => {
                        self.metrics.inc_dropped();
                        warn!(subscription = %id, channel = %channel, event_id = %event.id, "Queue full, event dropped");
                    }
                    DeliveryOutcome::Evicted => {
                        self.metrics.inc_evicted();
                        warn!(subscription = %id, channel = %channel, event_id = %event.id, "Queue full, subscriber evicted");
                        gone.push(*id);
                    }
                    DeliveryOutcome::Closed => gone.push(*id),
                }
            }

            for id in gone {
                let key = SubscriptionKey {
                    id,
                    channel: channel.clone(),
                };
                if let Some(route) = self.remove_route(&key) {
                    route.close();
                }
            }
        }

        if self.metrics.published().is_multiple_of(100) {
            debug!(published = self.metrics.published(), "Dispatcher progress");
        }
    }

    /// Remove a route, dropping the channel entry once it is empty
    fn remove_route(&mut self, key: &SubscriptionKey) -> Option<Route> {
        let members = self.routes.get_mut(&key.channel)?;
        let route = members.remove(&key.id)?;
        let count = members.len();
        if count == 0 {
            self.routes.remove(&key.channel);
        }
        self.refresh_subscriber_gauges(&key.channel, count);
        Some(route)
    }

    fn refresh_subscriber_gauges(&self, channel: &str, count: usize) {
        observability::record_subscriber_count(channel, count);
        let total: usize = self.routes.values().map(HashMap::len).sum();
        self.metrics.set_active_subscribers(total);
    }

    fn snapshot(&self) -> RoutingSnapshot {
        let mut channels: BTreeMap<String, ChannelSnapshot> = BTreeMap::new();
        for (channel, members) in &self.routes {
            channels.entry(channel.clone()).or_default().subscribers = members.len();
        }
        for channel in self.histories.keys() {
            channels.entry(channel.clone()).or_default().has_history = true;
        }
        RoutingSnapshot { channels }
    }

    /// Close every routed delivery path exactly once and empty the tables
    fn close_all(&mut self) -> usize {
        let mut closed = 0;
        for (channel, members) in self.routes.drain() {
            for route in members.values() {
                if route.close() {
                    closed += 1;
                }
            }
            observability::record_subscriber_count(&channel, 0);
        }
        self.metrics.set_active_subscribers(0);
        closed
    }

    /// Reject everything still queued; pending subscriptions get their paths closed
    fn discard_pending(&mut self) -> usize {
        self.mailbox.close();
        let mut discarded = 0;
        while let Ok(command) = self.mailbox.try_recv() {
            discarded += 1;
            if let Command::Subscribe(subscription) = command {
                subscription.path().close();
            }
        }
        discarded
    }
}

/// Offer an event to one subscriber under the configured policy
async fn offer(inlet: &DeliveryPath, event: Event, policy: BackpressurePolicy) -> DeliveryOutcome {
    match policy {
        BackpressurePolicy::Block => match inlet.push(event).await {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(_) => DeliveryOutcome::Closed,
        },
        BackpressurePolicy::Drop | BackpressurePolicy::Disconnect => match inlet.try_push(event) {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(PushError::Closed) => DeliveryOutcome::Closed,
            Err(PushError::Full(_)) if policy == BackpressurePolicy::Drop => {
                DeliveryOutcome::Dropped
            }
            Err(PushError::Full(_)) => DeliveryOutcome::Evicted,
        },
    }
}

/// Convenience function to build and spawn a dispatcher
#[instrument(name = "dispatcher_create", skip(config))]
pub fn spawn_dispatcher(config: DeliveryConfig) -> (DispatcherHandle, JoinHandle<()>) {
    let (dispatcher, handle) = DispatcherBuilder::new(config).build();
    (handle, dispatcher.spawn())
}
