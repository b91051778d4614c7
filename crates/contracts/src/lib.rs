//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the broadcaster.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Identity Model
//! - An `Event` is identified by its `id` string, which subscribers echo back as
//!   the "last seen" identifier when they reconnect
//! - Channels are plain string keys and are never created explicitly

mod config;
mod error;
mod event;
mod history;

pub use config::*;
pub use error::*;
pub use event::Event;
pub use history::{EventStream, HistorySource};
