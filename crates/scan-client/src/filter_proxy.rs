//! Filtered scan requests on behalf of the dashboard.
//!
//! Failures never propagate: the caller always gets a (possibly empty)
//! result set and a notice it can show the user.

use screener_core::FilterParams;
use serde::Serialize;
use serde_json::Value;

use crate::{ScanClient, ScanError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Short user-facing message about a filter run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOutcome {
    pub filter_name: String,
    pub stocks: Vec<Value>,
    pub total: u64,
    pub notice: Notice,
}

impl FilterOutcome {
    pub fn is_error(&self) -> bool {
        self.notice.level == NoticeLevel::Error
    }
}

/// Run `params` against the scan service.
pub async fn filter_stocks(client: &ScanClient, params: &FilterParams) -> FilterOutcome {
    let filter_name = params.display_name();

    match client.scan(params).await {
        Ok(page) => {
            tracing::info!(
                filter = %filter_name,
                returned = page.data.len(),
                total = page.total,
                "Filtered scan complete"
            );
            FilterOutcome {
                notice: Notice {
                    level: NoticeLevel::Success,
                    message: format!(
                        "Found {} stocks matching criteria ({} total available)",
                        page.data.len(),
                        page.total
                    ),
                },
                filter_name,
                stocks: page.data,
                total: page.total,
            }
        }
        Err(e) => {
            tracing::warn!(filter = %filter_name, "Failed to fetch filtered stocks: {}", e);
            FilterOutcome {
                filter_name,
                stocks: Vec::new(),
                total: 0,
                notice: Notice {
                    level: NoticeLevel::Error,
                    message: format!("Failed to fetch stocks: {}", failure_cause(&e)),
                },
            }
        }
    }
}

fn failure_cause(e: &ScanError) -> String {
    match e {
        ScanError::UpstreamStatus {
            detail: Some(detail),
            ..
        } => detail.clone(),
        ScanError::UpstreamStatus { status, .. } => {
            format!("HTTP error! status: {}", status.as_u16())
        }
        other => other.to_string(),
    }
}
