//! Client for the external stock scan service.
//!
//! The scan service owns every technical-analysis computation. This crate
//! only fetches its output: the cached full scan (`POST /scan-cached`) and
//! the filtered scan (`GET /api/stocks/scan`).

pub mod error;
pub mod filter_proxy;
pub mod validation;

pub use error::{ScanError, ScanResult};
pub use filter_proxy::{filter_stocks, FilterOutcome, Notice, NoticeLevel};
pub use validation::{validate_record, validate_results};

use reqwest::Client;
use screener_core::{FilterParams, StockData};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_SCAN_API_URL: &str = "http://127.0.0.1:8000";

/// Connection settings for the scan service.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SCAN_API_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// One page of a filtered scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanPage {
    pub data: Vec<Value>,
    pub total: u64,
}

impl ScanPage {
    /// Normalize a `{data, total}` body. Missing `data` means no matches and a
    /// missing or zero `total` falls back to the page length.
    pub fn from_body(body: Value) -> ScanResult<Self> {
        let Value::Object(mut map) = body else {
            return Err(ScanError::InvalidResponse(
                "Scan API response is not a JSON object".to_string(),
            ));
        };

        let data = match map.remove("data") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(ScanError::InvalidResponse(
                    "Scan API response field `data` is not an array".to_string(),
                ))
            }
        };
        let total = map
            .get("total")
            .and_then(|total| {
                total
                    .as_u64()
                    .or_else(|| total.as_f64().filter(|t| *t >= 0.0).map(|t| t as u64))
            })
            .filter(|total| *total > 0)
            .unwrap_or(data.len() as u64);

        Ok(Self { data, total })
    }
}

#[derive(Clone)]
pub struct ScanClient {
    client: Client,
    base_url: String,
}

impl ScanClient {
    pub fn new(config: ScanConfig) -> ScanResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ScanError::Request)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the cached full scan and validate every record.
    pub async fn fetch_cached(&self, filters: Option<&Value>) -> ScanResult<Vec<StockData>> {
        let url = format!("{}/scan-cached", self.base_url);
        let mut request = self.client.post(&url);
        if let Some(filters) = filters {
            request = request.json(filters);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ScanError::UpstreamStatus {
                status: response.status(),
                detail: None,
            });
        }

        let body: Value = response.json().await?;
        let stocks = validate_results(body)?;
        tracing::debug!("Scan API returned {} cached results", stocks.len());

        Ok(stocks)
    }

    /// Forward query pairs to `/api/stocks/scan` and return the body untouched.
    pub async fn scan_raw(&self, query: &[(String, String)]) -> ScanResult<Value> {
        let url = format!("{}/api/stocks/scan", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| body.get("detail").and_then(Value::as_str).map(str::to_string));
            return Err(ScanError::UpstreamStatus { status, detail });
        }

        Ok(response.json().await?)
    }

    /// Run a filtered scan built from dashboard filter state.
    pub async fn scan(&self, params: &FilterParams) -> ScanResult<ScanPage> {
        let query: Vec<(String, String)> = params
            .to_query_params()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        tracing::debug!(?query, "Filtered scan request");

        ScanPage::from_body(self.scan_raw(&query).await?)
    }
}
