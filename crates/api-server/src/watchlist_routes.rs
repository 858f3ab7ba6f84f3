//! Watchlist API Routes
//!
//! CRUD over the caller's saved symbols. Each item keeps the metrics the
//! stock had when it was added.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use screener_core::{
    normalize_symbol, timestamp_now, MetricsInput, NewWatchlistItem, StockData, StoreError,
    WatchlistItem, WatchlistPatch, DEFAULT_LABEL,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::identity::CurrentUser;
use crate::{ApiJson, AppError, AppState};

#[cfg(test)]
#[path = "watchlist_routes_tests.rs"]
mod watchlist_routes_tests;

#[derive(Deserialize)]
pub struct ListQuery {
    pub label: Option<String>,
}

/// Body of `POST /api/watchlist`.
///
/// Metrics may be given field by field, as a full scanned record under
/// `stock`, or both; explicit fields win.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWatchlistRequest {
    pub symbol: Option<String>,
    pub label: Option<String>,
    pub stock: Option<StockData>,
    #[serde(flatten)]
    pub metrics: MetricsInput,
}

#[derive(Deserialize)]
pub struct UpdateWatchlistRequest {
    pub label: Option<String>,
}

pub fn watchlist_routes() -> Router<AppState> {
    Router::new()
        .route("/api/watchlist", get(get_watchlist).post(add_to_watchlist))
        .route(
            "/api/watchlist/:id",
            get(get_watchlist_item)
                .patch(update_watchlist_item)
                .delete(remove_from_watchlist),
        )
}

fn store_err(context: &str, e: StoreError) -> AppError {
    match e {
        StoreError::Duplicate { .. } => {
            AppError::client(StatusCode::CONFLICT, "Stock already in watchlist")
        }
        StoreError::InvalidInput(msg) => AppError::new(
            StatusCode::BAD_REQUEST,
            "Invalid watchlist item",
            anyhow::anyhow!(msg),
        ),
        other => AppError::internal(context, other),
    }
}

/// Load an item and check the caller owns it.
async fn load_owned(
    state: &AppState,
    user: &CurrentUser,
    id: &str,
    context: &str,
) -> Result<WatchlistItem, AppError> {
    let item = state
        .store
        .find_by_id(id)
        .await
        .map_err(|e| store_err(context, e))?
        .ok_or_else(|| AppError::client(StatusCode::NOT_FOUND, "Watchlist item not found"))?;

    if !item.is_owned_by(user.id()) {
        tracing::warn!(id, owner = %item.user_id, caller = %user.id(), "Watchlist ownership mismatch");
        return Err(AppError::client(StatusCode::FORBIDDEN, "Unauthorized"));
    }

    Ok(item)
}

/// List the caller's watchlist, newest first
async fn get_watchlist(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<WatchlistItem>>, AppError> {
    let mut items = state
        .store
        .list(user.id())
        .await
        .map_err(|e| store_err("Failed to fetch watchlist", e))?;

    if let Some(label) = query.label.as_deref().filter(|l| !l.is_empty()) {
        items.retain(|item| item.label == label);
    }

    Ok(Json(items))
}

/// Add symbol to watchlist
async fn add_to_watchlist(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<AddWatchlistRequest>,
) -> Result<(StatusCode, Json<WatchlistItem>), AppError> {
    let AddWatchlistRequest {
        symbol,
        label,
        stock,
        mut metrics,
    } = req;

    let symbol = symbol
        .or_else(|| stock.as_ref().map(|s| s.symbol.clone()))
        .as_deref()
        .and_then(normalize_symbol)
        .ok_or_else(|| AppError::client(StatusCode::BAD_REQUEST, "Symbol is required"))?;

    let existing = state
        .store
        .find_by_owner_and_symbol(user.id(), &symbol)
        .await
        .map_err(|e| store_err("Failed to add to watchlist", e))?;
    if existing.is_some() {
        return Err(AppError::client(StatusCode::CONFLICT, "Stock already in watchlist"));
    }

    if let Some(stock) = &stock {
        metrics.fill_from_stock(stock);
    }

    let label = label
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| DEFAULT_LABEL.to_string());

    let item = state
        .store
        .create(NewWatchlistItem {
            user_id: user.id().to_string(),
            symbol,
            label: Some(label),
            metrics: metrics.snapshot(timestamp_now()),
        })
        .await
        .map_err(|e| store_err("Failed to add to watchlist", e))?;

    tracing::info!(id = %item.id, symbol = %item.symbol, user = %item.user_id, "Added to watchlist");

    Ok((StatusCode::CREATED, Json(item)))
}

async fn get_watchlist_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<WatchlistItem>, AppError> {
    let item = load_owned(&state, &user, &id, "Failed to fetch watchlist item").await?;
    Ok(Json(item))
}

/// Relabel a watchlist item; nothing else is mutable
async fn update_watchlist_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateWatchlistRequest>,
) -> Result<Json<WatchlistItem>, AppError> {
    let label = req
        .label
        .map(|l| l.trim().to_string())
        .ok_or_else(|| AppError::client(StatusCode::BAD_REQUEST, "Label is required"))?;
    let label = if label.is_empty() {
        DEFAULT_LABEL.to_string()
    } else {
        label
    };

    load_owned(&state, &user, &id, "Failed to update watchlist item").await?;

    let updated = state
        .store
        .update(&id, WatchlistPatch::label(label))
        .await
        .map_err(|e| store_err("Failed to update watchlist item", e))?
        .ok_or_else(|| AppError::client(StatusCode::NOT_FOUND, "Watchlist item not found"))?;

    tracing::info!(id = %updated.id, label = %updated.label, "Watchlist item relabelled");

    Ok(Json(updated))
}

/// Remove an item from the caller's watchlist
async fn remove_from_watchlist(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let item = load_owned(&state, &user, &id, "Failed to remove from watchlist").await?;

    let removed = state
        .store
        .delete(&id)
        .await
        .map_err(|e| store_err("Failed to remove from watchlist", e))?;
    if !removed {
        return Err(AppError::client(StatusCode::NOT_FOUND, "Watchlist item not found"));
    }

    tracing::info!(id = %item.id, symbol = %item.symbol, "Removed from watchlist");

    Ok(Json(json!({ "message": "Removed from watchlist" })))
}
