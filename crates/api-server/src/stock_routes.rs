//! Stock scan proxy routes.
//!
//! Thin passthroughs to the external analysis API. The only logic here is
//! response validation and translating upstream failures into status codes.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderName, StatusCode},
    routing::{get, post},
    Json, Router,
};
use scan_client::{filter_stocks, FilterOutcome, ScanError};
use screener_core::{FilterParams, Scenario, StockData};
use serde::Serialize;
use serde_json::Value;

use crate::{ApiJson, AppError, AppState};

#[cfg(test)]
#[path = "stock_routes_tests.rs"]
mod stock_routes_tests;

const SCAN_CACHE_HEADERS: [(HeaderName, &str); 3] = [
    (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "0"),
];

const ANALYZE_CACHE_CONTROL: &str = "public, s-maxage=3600, stale-while-revalidate=86400";

#[derive(Serialize)]
pub struct ScenarioPreset {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub filters: FilterParams,
}

pub fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/api/stocks/scan", get(scan_stocks))
        .route("/api/stocks/filter", post(filter))
        .route("/api/stocks/scenarios", get(list_scenarios))
        .route("/api/analyze", get(analyze).post(analyze_with_filters))
}

/// Map a passthrough failure onto the status the dashboard expects.
fn scan_err(state: &AppState, e: ScanError) -> AppError {
    let base_url = state.scan.base_url();
    match e {
        ScanError::UpstreamStatus { status, .. } => AppError::new(
            status,
            "Stock scan API error",
            anyhow::anyhow!(
                "API returned {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ),
        )
        .with_details(format!(
            "Make sure the stock analysis API server is running on {base_url}"
        )),
        e if e.is_unavailable() => {
            tracing::warn!("Stock scan API unreachable: {}", e);
            AppError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Connection failed",
                anyhow::anyhow!("Could not connect to the stock analysis API server"),
            )
            .with_details(format!(
                "Please make sure the stock analysis API server is running on {base_url}"
            ))
        }
        other => AppError::internal("Internal server error", other),
    }
}

/// Forward every query parameter to the upstream scan endpoint
async fn scan_stocks(
    State(state): State<AppState>,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<([(HeaderName, &'static str); 3], Json<Value>), AppError> {
    let body = state
        .scan
        .scan_raw(&query)
        .await
        .map_err(|e| scan_err(&state, e))?;

    match body.get("data").and_then(Value::as_array) {
        Some(data) => tracing::info!("Stock scan API returned {} results", data.len()),
        None => tracing::info!("Stock scan API returned a response without a data array"),
    }

    Ok((SCAN_CACHE_HEADERS, Json(body)))
}

/// Run dashboard filter state (scenario or advanced) and report the outcome
async fn filter(
    State(state): State<AppState>,
    ApiJson(params): ApiJson<FilterParams>,
) -> Json<FilterOutcome> {
    Json(filter_stocks(&state.scan, &params).await)
}

async fn list_scenarios() -> Json<Vec<ScenarioPreset>> {
    Json(
        Scenario::ALL
            .iter()
            .map(|scenario| ScenarioPreset {
                id: scenario.as_str(),
                label: scenario.label(),
                description: scenario.description(),
                filters: scenario.preset(),
            })
            .collect(),
    )
}

async fn fetch_cached(
    state: &AppState,
    filters: Option<&Value>,
) -> Result<([(HeaderName, &'static str); 1], Json<Vec<StockData>>), AppError> {
    let stocks = state
        .scan
        .fetch_cached(filters)
        .await
        .map_err(|e| AppError::internal("Failed to fetch stock data", e))?;

    Ok(([(header::CACHE_CONTROL, ANALYZE_CACHE_CONTROL)], Json(stocks)))
}

/// Full cached scan, validated record by record
async fn analyze(
    State(state): State<AppState>,
) -> Result<([(HeaderName, &'static str); 1], Json<Vec<StockData>>), AppError> {
    fetch_cached(&state, None).await
}

/// Same as `analyze`, forwarding a filter body. An unparsable body counts as `{}`.
async fn analyze_with_filters(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<([(HeaderName, &'static str); 1], Json<Vec<StockData>>), AppError> {
    let filters = serde_json::from_slice::<Value>(&body)
        .unwrap_or_else(|_| Value::Object(Default::default()));
    tracing::debug!(%filters, "Received analyze filters");

    fetch_cached(&state, Some(&filters)).await
}
