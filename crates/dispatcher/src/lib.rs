//! # Dispatcher
//!
//! 频道路由模块。
//!
//! 负责：
//! - 维护频道订阅表与历史源表（单一 actor 串行处理）
//! - 将事件 fan-out 到频道内的所有订阅者
//! - 断线重连时先回放历史，再切换到实时事件
//! - 关闭时每条投递通道恰好关闭一次

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod history;
pub mod metrics;
mod replay;
pub mod subscription;

pub use contracts::{BackpressurePolicy, DeliveryConfig, Event, EventStream, HistorySource};
pub use dispatcher::{
    ChannelSnapshot, Dispatcher, DispatcherBuilder, RoutingSnapshot, ShutdownReport,
    spawn_dispatcher,
};
pub use error::{DeliveryClosed, DispatcherError, PushError};
pub use handle::{DispatcherHandle, Subscriber};
pub use history::MemoryHistory;
pub use metrics::{DispatcherMetrics, MetricsSnapshot};
pub use subscription::{
    DeliveryPath, DeliveryReceiver, Subscription, SubscriptionId, SubscriptionKey,
};
