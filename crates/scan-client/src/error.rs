use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Could not connect to the stock analysis API server: {0}")]
    Connection(String),

    #[error("Stock analysis API timed out: {0}")]
    Timeout(String),

    #[error("API request failed: {status}")]
    UpstreamStatus {
        status: StatusCode,
        detail: Option<String>,
    },

    #[error("{0}")]
    InvalidResponse(String),

    #[error("Invalid stock data structure: {0}")]
    InvalidRecord(String),

    #[error("HTTP request failed: {0}")]
    Request(reqwest::Error),
}

impl ScanError {
    /// The scan service could not be reached at all (as opposed to answering badly).
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ScanError::Connection(_) | ScanError::Timeout(_))
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ScanError::Timeout(e.to_string())
        } else if e.is_connect() {
            ScanError::Connection(e.to_string())
        } else if e.is_decode() {
            ScanError::InvalidResponse(format!("Malformed JSON from scan API: {e}"))
        } else {
            ScanError::Request(e)
        }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
