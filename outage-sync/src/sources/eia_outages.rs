use std::time::Duration;

use serde_json::Value;

use crate::{
    config::{EiaConfig, Secret},
    pipeline::{FetchError, FetchedBatch, OutageSource, SyncWindow},
    transform,
};

/// Longest slice of an error body kept for diagnostics.
const MAX_ERROR_BODY: usize = 512;

/// Daily generator outages from the EIA v2 `nuclear-outages` route.
///
/// One request per window: `offset` is always 0 and further pages are not
/// requested.
pub struct EiaOutageSource {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Secret,
}

impl EiaOutageSource {
    pub fn new(base_url: impl Into<String>, api_key: Secret, timeout: Duration) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.without_url()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            api_key,
        })
    }

    pub fn from_config(cfg: &EiaConfig, api_key: Secret) -> Result<Self, FetchError> {
        Self::new(cfg.base_url.clone(), api_key, cfg.timeout())
    }

    /// Query string for `window`, API key excluded.
    pub fn query_params(window: &SyncWindow) -> Vec<(&'static str, String)> {
        vec![
            ("frequency", "daily".to_string()),
            ("data[0]", "capacity".to_string()),
            ("data[1]", "outage".to_string()),
            ("data[2]", "percentOutage".to_string()),
            ("start", window.start_param()),
            ("end", window.end_param()),
            ("sort[0][column]", "period".to_string()),
            ("sort[0][direction]", "desc".to_string()),
            ("offset", "0".to_string()),
        ]
    }

    async fn request(&self, window: &SyncWindow) -> Result<String, FetchError> {
        // Errors are stripped of their URL, which carries the API key.
        let response = self
            .http_client
            .get(&self.base_url)
            .query(&Self::query_params(window))
            .query(&[("api_key", self.api_key.expose())])
            .send()
            .await
            .map_err(|e| FetchError::Network(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.without_url()))
    }
}

#[async_trait::async_trait]
impl OutageSource for EiaOutageSource {
    async fn fetch(&self, window: &SyncWindow) -> Result<FetchedBatch, FetchError> {
        let body = self.request(window).await?;
        let batch = parse_response(&body)?;

        tracing::info!(
            rows = batch.records.len(),
            dropped = batch.dropped,
            "fetched outages from EIA"
        );

        let received = (batch.records.len() + batch.dropped) as u64;
        if let Some(total) = batch.reported_total.filter(|&t| t > received) {
            tracing::warn!(
                total,
                received,
                "EIA reported more rows than one page returned, remaining rows were not fetched"
            );
        }

        Ok(batch)
    }
}

/// Decode a response body into normalized records.
///
/// A body without a `response.data` array is a shape error; an empty array is
/// a valid answer with no rows.
pub fn parse_response(body: &str) -> Result<FetchedBatch, FetchError> {
    let payload: Value = serde_json::from_str(body)?;

    let response = payload
        .get("response")
        .ok_or_else(|| FetchError::Shape("missing 'response' object".to_string()))?;
    let rows = response
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::Shape("missing 'response.data' array".to_string()))?;

    let normalized = transform::normalize_rows(rows);

    Ok(FetchedBatch {
        records: normalized.records,
        dropped: normalized.dropped,
        reported_total: response.get("total").and_then(parse_total),
    })
}

/// `response.total` is published as a string.
fn parse_total(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
