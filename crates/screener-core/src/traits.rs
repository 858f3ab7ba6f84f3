use async_trait::async_trait;
use crate::{NewWatchlistItem, StoreResult, WatchlistItem, WatchlistPatch};

/// Storage for user-scoped watchlist entries.
///
/// Every backend must guarantee at most one item per `(user_id, symbol)`
/// and report a conflicting insert as [`crate::StoreError::Duplicate`].
#[async_trait]
pub trait WatchlistRepository: Send + Sync {
    /// All items owned by `user_id`, newest first.
    async fn list(&self, user_id: &str) -> StoreResult<Vec<WatchlistItem>>;

    async fn find_by_owner_and_symbol(
        &self,
        user_id: &str,
        symbol: &str,
    ) -> StoreResult<Option<WatchlistItem>>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<WatchlistItem>>;

    async fn create(&self, item: NewWatchlistItem) -> StoreResult<WatchlistItem>;

    /// Returns `None` when no item has this id.
    async fn update(&self, id: &str, patch: WatchlistPatch) -> StoreResult<Option<WatchlistItem>>;

    /// Returns whether an item was removed.
    async fn delete(&self, id: &str) -> StoreResult<bool>;

    async fn count(&self, user_id: &str) -> StoreResult<usize>;
}
