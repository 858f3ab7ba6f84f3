use async_trait::async_trait;
use screener_core::{
    timestamp_now, NewWatchlistItem, StoreError, StoreResult, WatchlistItem, WatchlistPatch,
    WatchlistRepository,
};
use tokio::sync::RwLock;

use crate::generate_id;

/// Process-local watchlist. Everything is lost when the process exits.
///
/// Items are kept in insertion order behind a single lock, so each
/// operation (including the duplicate check in `create`) is atomic.
#[derive(Default)]
pub struct InMemoryWatchlistStore {
    items: RwLock<Vec<WatchlistItem>>,
}

impl InMemoryWatchlistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every item for every user.
    pub async fn clear(&self) {
        self.items.write().await.clear();
    }
}

#[async_trait]
impl WatchlistRepository for InMemoryWatchlistStore {
    async fn list(&self, user_id: &str) -> StoreResult<Vec<WatchlistItem>> {
        let items = self.items.read().await;
        // Walk newest insertions first so the stable sort breaks timestamp ties the same way.
        let mut owned: Vec<WatchlistItem> = items
            .iter()
            .rev()
            .filter(|item| item.is_owned_by(user_id))
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn find_by_owner_and_symbol(
        &self,
        user_id: &str,
        symbol: &str,
    ) -> StoreResult<Option<WatchlistItem>> {
        let items = self.items.read().await;
        Ok(items
            .iter()
            .find(|item| item.is_owned_by(user_id) && item.symbol == symbol)
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<WatchlistItem>> {
        let items = self.items.read().await;
        Ok(items.iter().find(|item| item.id == id).cloned())
    }

    async fn create(&self, item: NewWatchlistItem) -> StoreResult<WatchlistItem> {
        let item = WatchlistItem::from_new(generate_id(), item, timestamp_now())?;

        let mut items = self.items.write().await;
        if items
            .iter()
            .any(|existing| existing.is_owned_by(&item.user_id) && existing.symbol == item.symbol)
        {
            return Err(StoreError::Duplicate {
                user_id: item.user_id,
                symbol: item.symbol,
            });
        }

        items.push(item.clone());
        tracing::debug!(id = %item.id, symbol = %item.symbol, "watchlist item stored in memory");
        Ok(item)
    }

    async fn update(&self, id: &str, patch: WatchlistPatch) -> StoreResult<Option<WatchlistItem>> {
        let mut items = self.items.write().await;
        Ok(items.iter_mut().find(|item| item.id == id).map(|item| {
            patch.apply(item, timestamp_now());
            item.clone()
        }))
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut items = self.items.write().await;
        match items.iter().position(|item| item.id == id) {
            Some(index) => {
                items.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count(&self, user_id: &str) -> StoreResult<usize> {
        let items = self.items.read().await;
        Ok(items.iter().filter(|item| item.is_owned_by(user_id)).count())
    }
}
