//! History source implementations
//!
//! Contains MemoryHistory.

mod memory;

pub use self::memory::MemoryHistory;
