//! 分发器指标记录模块
//!
//! 通过 `metrics` 门面记录；未安装 recorder 时所有调用均为空操作。

use metrics::{counter, gauge};

/// 单次投递结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// 已进入订阅者队列
    Delivered,
    /// 队列满，事件被丢弃
    Dropped,
    /// 队列满，订阅者被驱逐
    Evicted,
    /// 投递路径已关闭
    Closed,
}

impl DeliveryOutcome {
    /// 指标标签值
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Dropped => "dropped",
            Self::Evicted => "evicted",
            Self::Closed => "closed",
        }
    }
}

/// 记录一次发布 (每个目标频道计一次)
pub fn record_event_published(channel: &str) {
    counter!(
        "broadcaster_events_published_total",
        "channel" => channel.to_string()
    )
    .increment(1);
}

/// 记录单个订阅者的投递结果
pub fn record_delivery(channel: &str, outcome: DeliveryOutcome) {
    counter!(
        "broadcaster_deliveries_total",
        "channel" => channel.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// 记录频道当前订阅者数量
pub fn record_subscriber_count(channel: &str, count: usize) {
    gauge!(
        "broadcaster_subscribers",
        "channel" => channel.to_string()
    )
    .set(count as f64);
}

/// 记录回放任务启动
pub fn record_replay_started(channel: &str) {
    counter!(
        "broadcaster_replays_total",
        "channel" => channel.to_string()
    )
    .increment(1);
}

/// 记录回放任务结束及回放的事件数
pub fn record_replay_finished(channel: &str, replayed: u64) {
    counter!(
        "broadcaster_replayed_events_total",
        "channel" => channel.to_string()
    )
    .increment(replayed);
}
