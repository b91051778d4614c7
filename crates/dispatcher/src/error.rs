//! Dispatcher error types

use contracts::Event;
use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// The dispatcher has shut down (or is shutting down) and rejects the request
    #[error("dispatcher is closed")]
    Closed,
}

/// Failure of a non-blocking push onto a delivery path
#[derive(Debug, Error)]
pub enum PushError {
    /// Queue full; the event is handed back
    #[error("delivery queue full, event '{}' not queued", .0.id)]
    Full(Event),

    /// Path closed; the push is a no-op
    #[error("delivery path closed")]
    Closed,
}

/// The delivery path was closed before the push completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("delivery path closed")]
pub struct DeliveryClosed;
