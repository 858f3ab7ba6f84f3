use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use screener_core::{
    timestamp_now, NewWatchlistItem, StoreError, StoreResult, WatchlistItem, WatchlistPatch,
    WatchlistRepository,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;

use crate::generate_id;

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, symbol, label, metrics, created_at, updated_at FROM watchlist_items";

/// Durable watchlist backed by a SQLite database.
#[derive(Clone)]
pub struct SqliteWatchlistStore {
    pool: SqlitePool,
}

impl SqliteWatchlistStore {
    /// Open (creating if needed) the database at `database_url` and apply the schema.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(backend)?
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        // Every connection to `:memory:` is a separate database, and closing it drops the data.
        if database_url.contains(":memory:") {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(backend)?;

        let store = Self { pool };
        store.init_schema().await?;
        tracing::info!("Watchlist database ready at {}", database_url);

        Ok(store)
    }

    pub(crate) async fn init_schema(&self) -> StoreResult<()> {
        let schema = include_str!("../schema.sql");

        // sqlx executes one statement per query
        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await.map_err(backend)?;
            }
        }

        Ok(())
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("bad timestamp {raw:?}: {e}")))
}

fn item_from_row(row: &SqliteRow) -> StoreResult<WatchlistItem> {
    let metrics: String = row.try_get("metrics").map_err(backend)?;
    let created_at: String = row.try_get("created_at").map_err(backend)?;
    let updated_at: String = row.try_get("updated_at").map_err(backend)?;

    Ok(WatchlistItem {
        id: row.try_get("id").map_err(backend)?,
        user_id: row.try_get("user_id").map_err(backend)?,
        symbol: row.try_get("symbol").map_err(backend)?,
        label: row.try_get("label").map_err(backend)?,
        metrics: serde_json::from_str(&metrics)?,
        created_at: decode_timestamp(&created_at)?,
        updated_at: decode_timestamp(&updated_at)?,
    })
}

#[async_trait]
impl WatchlistRepository for SqliteWatchlistStore {
    async fn list(&self, user_id: &str) -> StoreResult<Vec<WatchlistItem>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE user_id = ? ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(item_from_row).collect()
    }

    async fn find_by_owner_and_symbol(
        &self,
        user_id: &str,
        symbol: &str,
    ) -> StoreResult<Option<WatchlistItem>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE user_id = ? AND symbol = ?"))
            .bind(user_id)
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<WatchlistItem>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn create(&self, item: NewWatchlistItem) -> StoreResult<WatchlistItem> {
        let item = WatchlistItem::from_new(generate_id(), item, timestamp_now())?;
        let metrics = serde_json::to_string(&item.metrics)?;

        let result = sqlx::query(
            r#"
            INSERT INTO watchlist_items (id, user_id, symbol, label, metrics, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.user_id)
        .bind(&item.symbol)
        .bind(&item.label)
        .bind(&metrics)
        .bind(encode_timestamp(&item.created_at))
        .bind(encode_timestamp(&item.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(item),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::Duplicate {
                    user_id: item.user_id,
                    symbol: item.symbol,
                })
            }
            Err(e) => Err(backend(e)),
        }
    }

    async fn update(&self, id: &str, patch: WatchlistPatch) -> StoreResult<Option<WatchlistItem>> {
        let Some(mut item) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        patch.apply(&mut item, timestamp_now());

        let result = sqlx::query("UPDATE watchlist_items SET label = ?, updated_at = ? WHERE id = ?")
            .bind(&item.label)
            .bind(encode_timestamp(&item.updated_at))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        // Deleted between the read and the write.
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(item))
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM watchlist_items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, user_id: &str) -> StoreResult<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM watchlist_items WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        Ok(count as usize)
    }
}
