//! Shared state for HTTP handlers

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use contracts::BroadcasterConfig;
use dispatcher::{Dispatcher, DispatcherBuilder, DispatcherHandle, MemoryHistory};
use tracing::info;

/// Everything a handler needs, cheap to clone
#[derive(Clone)]
pub struct AppState {
    dispatcher: DispatcherHandle,
    histories: Arc<HashMap<String, MemoryHistory>>,
    keep_alive: Duration,
}

impl AppState {
    pub fn new(dispatcher: DispatcherHandle, keep_alive: Duration) -> Self {
        Self {
            dispatcher,
            histories: Arc::new(HashMap::new()),
            keep_alive,
        }
    }

    /// Attach in-memory histories that `POST /publish` appends to
    pub fn with_histories(mut self, histories: HashMap<String, MemoryHistory>) -> Self {
        self.histories = Arc::new(histories);
        self
    }

    /// Build a dispatcher and matching state from configuration
    ///
    /// Every channel with a non-zero `history_capacity` gets a
    /// [`MemoryHistory`] registered as its history source. The returned
    /// dispatcher still has to be spawned.
    pub fn from_config(config: &BroadcasterConfig) -> (Self, Dispatcher) {
        let mut builder = DispatcherBuilder::new(config.delivery.clone());
        let mut histories = HashMap::new();

        for channel in config.channels.iter().filter(|c| c.has_history()) {
            let history = MemoryHistory::new(channel.history_capacity);
            builder = builder.history(channel.name.clone(), history.clone());
            histories.insert(channel.name.clone(), history);
        }

        info!(
            channels = config.channels.len(),
            histories = histories.len(),
            "Broadcaster state built"
        );

        let (dispatcher, handle) = builder.build();
        let state = Self::new(handle, Duration::from_secs(config.server.keep_alive_secs))
            .with_histories(histories);
        (state, dispatcher)
    }

    pub fn dispatcher(&self) -> &DispatcherHandle {
        &self.dispatcher
    }

    pub fn history(&self, channel: &str) -> Option<&MemoryHistory> {
        self.histories.get(channel)
    }

    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }
}
