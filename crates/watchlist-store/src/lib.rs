//! Watchlist Storage
//!
//! Backends for [`screener_core::WatchlistRepository`]: SQLite for normal
//! operation and an in-memory store for tests and throwaway demo runs.

pub mod memory;
pub mod sqlite;

#[cfg(test)]
mod tests;

pub use memory::InMemoryWatchlistStore;
pub use sqlite::SqliteWatchlistStore;

/// Opaque id for a new watchlist item.
pub(crate) fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
