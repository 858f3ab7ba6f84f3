use screener_core::StockData;
use serde_json::Value;

use crate::error::{ScanError, ScanResult};

/// Extract and validate the `results` array of a `/scan-cached` response.
///
/// All or nothing: one malformed record rejects the whole batch.
pub fn validate_results(body: Value) -> ScanResult<Vec<StockData>> {
    let results = match body {
        Value::Object(mut map) => map.remove("results"),
        _ => None,
    };

    let Some(Value::Array(records)) = results else {
        return Err(ScanError::InvalidResponse(
            "API response does not contain results array".to_string(),
        ));
    };

    records.into_iter().map(validate_record).collect()
}

/// A record needs a string symbol and name plus numeric price and RSI.
pub fn validate_record(record: Value) -> ScanResult<StockData> {
    let well_formed = record.get("Symbol").is_some_and(Value::is_string)
        && record.get("Name").is_some_and(Value::is_string)
        && record.get("Current Price").is_some_and(Value::is_number)
        && record.get("RSI (14)").is_some_and(Value::is_number);

    if !well_formed {
        return Err(ScanError::InvalidRecord(record.to_string()));
    }

    serde_json::from_value(record.clone())
        .map_err(|e| ScanError::InvalidRecord(format!("{record} ({e})")))
}
