#[cfg(test)]
mod watchlist_store_tests {
    use crate::{InMemoryWatchlistStore, SqliteWatchlistStore};
    use screener_core::{
        NewWatchlistItem, StoreError, WatchlistPatch, WatchlistRepository, DEFAULT_LABEL,
    };
    use serde_json::{json, Map, Value};

    async fn sqlite_store() -> SqliteWatchlistStore {
        SqliteWatchlistStore::connect("sqlite::memory:")
            .await
            .expect("in-memory SQLite")
    }

    fn metrics(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn new_item(user_id: &str, symbol: &str) -> NewWatchlistItem {
        NewWatchlistItem {
            user_id: user_id.to_string(),
            symbol: symbol.to_string(),
            label: None,
            metrics: metrics(json!({
                "name": format!("{symbol} Ltd"),
                "currentPrice": 101.5,
                "rsi": 48.0,
                "momentumScore": 77
            })),
        }
    }

    async fn check_create_and_find(store: &dyn WatchlistRepository) {
        let created = store.create(new_item("u1", "AAA")).await.unwrap();
        assert_eq!(created.user_id, "u1");
        assert_eq!(created.symbol, "AAA");
        assert_eq!(created.label, DEFAULT_LABEL);
        assert_eq!(created.created_at, created.updated_at);

        let by_id = store.find_by_id(&created.id).await.unwrap();
        assert_eq!(by_id.as_ref(), Some(&created));

        let by_symbol = store.find_by_owner_and_symbol("u1", "AAA").await.unwrap();
        assert_eq!(by_symbol, Some(created));

        assert!(store.find_by_owner_and_symbol("u2", "AAA").await.unwrap().is_none());
        assert!(store.find_by_id("missing").await.unwrap().is_none());
    }

    async fn check_duplicate_rejected(store: &dyn WatchlistRepository) {
        store.create(new_item("u1", "DUP")).await.unwrap();

        let err = store.create(new_item("u1", "DUP")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref symbol, .. } if symbol == "DUP"));
        assert_eq!(store.count("u1").await.unwrap(), 1);

        // same symbol for a different user is fine
        store.create(new_item("u2", "DUP")).await.unwrap();
        assert_eq!(store.count("u2").await.unwrap(), 1);
    }

    async fn check_blank_symbol_rejected(store: &dyn WatchlistRepository) {
        let err = store.create(new_item("u1", "   ")).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
        assert_eq!(store.count("u1").await.unwrap(), 0);
    }

    async fn check_update_only_changes_label(store: &dyn WatchlistRepository) {
        let created = store.create(new_item("u1", "UPD")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let updated = store
            .update(&created.id, WatchlistPatch::label("Breakouts"))
            .await
            .unwrap()
            .expect("item exists");

        assert_eq!(updated.label, "Breakouts");
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.user_id, created.user_id);
        assert_eq!(updated.symbol, created.symbol);
        assert_eq!(updated.metrics, created.metrics);
        assert_eq!(updated.created_at, created.created_at);

        let reloaded = store.find_by_id(&created.id).await.unwrap();
        assert_eq!(reloaded, Some(updated));

        let missing = store.update("missing", WatchlistPatch::label("x")).await.unwrap();
        assert!(missing.is_none());
    }

    async fn check_delete(store: &dyn WatchlistRepository) {
        let created = store.create(new_item("u1", "DEL")).await.unwrap();

        assert!(store.delete(&created.id).await.unwrap());
        assert!(!store.delete(&created.id).await.unwrap());
        assert!(store.find_by_id(&created.id).await.unwrap().is_none());

        // symbol can be added again after removal
        store.create(new_item("u1", "DEL")).await.unwrap();
    }

    async fn check_list_order_and_counts(store: &dyn WatchlistRepository) {
        let mut ids = Vec::new();
        for symbol in ["S1", "S2", "S3", "S4", "S5"] {
            ids.push(store.create(new_item("u1", symbol)).await.unwrap().id);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        store.create(new_item("u2", "OTHER")).await.unwrap();

        assert!(store.delete(&ids[1]).await.unwrap());
        assert!(store.delete(&ids[3]).await.unwrap());

        let listed = store.list("u1").await.unwrap();
        let symbols: Vec<&str> = listed.iter().map(|item| item.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["S5", "S3", "S1"]);
        assert_eq!(store.count("u1").await.unwrap(), 3);
        assert!(listed.iter().all(|item| item.user_id == "u1"));

        assert_eq!(store.list("nobody").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_memory_create_and_find() {
        check_create_and_find(&InMemoryWatchlistStore::new()).await;
    }

    #[tokio::test]
    async fn test_memory_duplicate_rejected() {
        check_duplicate_rejected(&InMemoryWatchlistStore::new()).await;
    }

    #[tokio::test]
    async fn test_memory_blank_symbol_rejected() {
        check_blank_symbol_rejected(&InMemoryWatchlistStore::new()).await;
    }

    #[tokio::test]
    async fn test_memory_update_only_changes_label() {
        check_update_only_changes_label(&InMemoryWatchlistStore::new()).await;
    }

    #[tokio::test]
    async fn test_memory_delete() {
        check_delete(&InMemoryWatchlistStore::new()).await;
    }

    #[tokio::test]
    async fn test_memory_list_order_and_counts() {
        check_list_order_and_counts(&InMemoryWatchlistStore::new()).await;
    }

    #[tokio::test]
    async fn test_memory_clear() {
        let store = InMemoryWatchlistStore::new();
        store.create(new_item("u1", "AAA")).await.unwrap();
        store.create(new_item("u2", "BBB")).await.unwrap();

        store.clear().await;
        assert_eq!(store.count("u1").await.unwrap(), 0);
        assert_eq!(store.count("u2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_memory_concurrent_creates_keep_one() {
        let store = std::sync::Arc::new(InMemoryWatchlistStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.create(new_item("u1", "RACE")).await }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.count("u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_create_and_find() {
        check_create_and_find(&sqlite_store().await).await;
    }

    #[tokio::test]
    async fn test_sqlite_duplicate_rejected() {
        check_duplicate_rejected(&sqlite_store().await).await;
    }

    #[tokio::test]
    async fn test_sqlite_blank_symbol_rejected() {
        check_blank_symbol_rejected(&sqlite_store().await).await;
    }

    #[tokio::test]
    async fn test_sqlite_update_only_changes_label() {
        check_update_only_changes_label(&sqlite_store().await).await;
    }

    #[tokio::test]
    async fn test_sqlite_delete() {
        check_delete(&sqlite_store().await).await;
    }

    #[tokio::test]
    async fn test_sqlite_list_order_and_counts() {
        check_list_order_and_counts(&sqlite_store().await).await;
    }

    #[tokio::test]
    async fn test_sqlite_schema_is_idempotent() {
        let store = sqlite_store().await;
        store.create(new_item("u1", "AAA")).await.unwrap();

        // re-running the schema must not drop existing rows
        store.init_schema().await.unwrap();
        assert_eq!(store.count("u1").await.unwrap(), 1);
    }
}
