//! BroadcasterConfig - Config Loader output
//!
//! Describes the whole broadcaster: HTTP surface, delivery tuning and the
//! channels that carry replayable history.

use serde::{Deserialize, Serialize};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete broadcaster configuration
///
/// Every section has defaults, so an empty document is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BroadcasterConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// HTTP streaming surface
    #[serde(default)]
    pub server: ServerConfig,

    /// Dispatcher and per-subscriber queue tuning
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Channels declared up front
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl BroadcasterConfig {
    /// Look up a declared channel by name
    pub fn channel(&self, name: &str) -> Option<&ChannelConfig> {
        self.channels.iter().find(|c| c.name == name)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allow every origin (`Access-Control-Allow-Origin: *`)
    #[serde(default)]
    pub allow_cors: bool,

    /// Keep-alive comment interval in seconds (0 = disabled)
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Path prefix of the streaming endpoint; streams live at `{prefix}/{channel}`
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,
}

impl ServerConfig {
    /// `host:port` string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allow_cors: false,
            keep_alive_secs: default_keep_alive_secs(),
            route_prefix: default_route_prefix(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_keep_alive_secs() -> u64 {
    15
}

fn default_route_prefix() -> String {
    "/events".to_string()
}

/// What the dispatcher does when a subscriber's queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Wait for space; a slow subscriber stalls routing
    Block,
    /// Drop the event for that subscriber only
    Drop,
    /// Evict the subscriber and close its delivery path
    #[default]
    Disconnect,
}

/// Delivery tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Dispatcher mailbox capacity
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Per-subscriber delivery queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Live events buffered per subscriber while its replay is running
    #[serde(default = "default_replay_buffer")]
    pub replay_buffer: usize,

    /// Full-queue policy
    #[serde(default)]
    pub backpressure: BackpressurePolicy,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
            queue_capacity: default_queue_capacity(),
            replay_buffer: default_replay_buffer(),
            backpressure: BackpressurePolicy::default(),
        }
    }
}

fn default_mailbox_capacity() -> usize {
    256
}

fn default_queue_capacity() -> usize {
    64
}

fn default_replay_buffer() -> usize {
    256
}

/// A channel declared in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel name
    pub name: String,

    /// Events retained in memory for replay (0 = no history)
    #[serde(default)]
    pub history_capacity: usize,
}

impl ChannelConfig {
    /// Whether this channel keeps replayable history
    pub fn has_history(&self) -> bool {
        self.history_capacity > 0
    }
}
