//! Subscription - per-client routing state and its delivery path
//!
//! The delivery path is a bounded multi-producer, single-consumer queue. The
//! dispatcher and a replay task may both hold producer clones; the streaming
//! handler owns the only receiver.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_channel::{Receiver, Sender, TryRecvError, TrySendError};
use contracts::Event;
use futures::Stream;

use crate::error::{DeliveryClosed, PushError};

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique subscription identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// What a streaming handler keeps to unsubscribe later
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub id: SubscriptionId,
    pub channel: String,
}

/// A connected client's subscription
///
/// Moved into the dispatcher on subscribe. The dispatcher only routes to it
/// and closes its path; the receiving half stays with the handler.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    channel: String,
    last_event_id: String,
    path: DeliveryPath,
}

impl Subscription {
    /// Create a subscription and the receiving end of its delivery path
    ///
    /// An empty `last_event_id` means no replay is requested.
    pub fn new(
        channel: impl Into<String>,
        last_event_id: impl Into<String>,
        capacity: usize,
    ) -> (Self, DeliveryReceiver) {
        let (tx, rx) = async_channel::bounded(capacity.max(1));
        let subscription = Self {
            id: SubscriptionId::next(),
            channel: channel.into(),
            last_event_id: last_event_id.into(),
            path: DeliveryPath { tx },
        };
        (subscription, DeliveryReceiver { rx })
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn last_event_id(&self) -> &str {
        &self.last_event_id
    }

    /// Whether the client reported a last seen identifier
    pub fn wants_replay(&self) -> bool {
        !self.last_event_id.is_empty()
    }

    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey {
            id: self.id,
            channel: self.channel.clone(),
        }
    }

    pub(crate) fn path(&self) -> &DeliveryPath {
        &self.path
    }

    pub(crate) fn into_parts(self) -> (SubscriptionKey, String, DeliveryPath) {
        (
            SubscriptionKey {
                id: self.id,
                channel: self.channel,
            },
            self.last_event_id,
            self.path,
        )
    }
}

/// Producer side of a subscriber's delivery path
///
/// Pushing onto a closed path is never a fault: it yields an error value
/// that producers treat as "stop".
#[derive(Debug, Clone)]
pub struct DeliveryPath {
    tx: Sender<Event>,
}

impl DeliveryPath {
    /// A standalone bounded queue, used for replay staging
    pub(crate) fn bounded(capacity: usize) -> (Self, Receiver<Event>) {
        let (tx, rx) = async_channel::bounded(capacity.max(1));
        (Self { tx }, rx)
    }

    pub(crate) fn same_channel(&self, other: &DeliveryPath) -> bool {
        self.tx.same_channel(&other.tx)
    }

    /// Push without waiting
    pub fn try_push(&self, event: Event) -> Result<(), PushError> {
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(event) => PushError::Full(event),
            TrySendError::Closed(_) => PushError::Closed,
        })
    }

    /// Push, waiting for space while the consumer is slow
    pub async fn push(&self, event: Event) -> Result<(), DeliveryClosed> {
        self.tx.send(event).await.map_err(|_| DeliveryClosed)
    }

    /// Close the path
    ///
    /// Returns `true` only for the call that actually closed it. Events
    /// already queued can still be drained by the receiver.
    pub fn close(&self) -> bool {
        self.tx.close()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of a subscriber's delivery path
#[derive(Debug)]
pub struct DeliveryReceiver {
    rx: Receiver<Event>,
}

impl DeliveryReceiver {
    /// Next event, or `None` once the path is closed and drained
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await.ok()
    }

    /// Non-blocking receive; `Ok(None)` means nothing queued right now
    pub fn try_recv(&mut self) -> Result<Option<Event>, DeliveryClosed> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Closed) => Err(DeliveryClosed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }

    /// Consume as a stream that ends when the path is closed
    pub fn into_stream(self) -> impl Stream<Item = Event> + Send + 'static {
        futures::stream::unfold(self, |mut receiver| async move {
            receiver.recv().await.map(|event| (event, receiver))
        })
    }
}
