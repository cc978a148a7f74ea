use crate::config::Settings;
use crate::ingest::types::{DailyBar, DailySeries};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PATH: &str = "/v1/daily_bars";
const DEFAULT_RETRIES: u32 = 3;

#[async_trait::async_trait]
pub trait MarketDataClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_daily_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DailySeries>;
}

#[derive(Debug, Clone)]
pub struct HttpJsonMarketData {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
    retries: u32,
}

impl HttpJsonMarketData {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_market_data_base_url()?.to_string();
        let api_key = settings.market_data_api_key.clone();

        let timeout_secs = std::env::var("MARKET_DATA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("MARKET_DATA_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES);

        let path = std::env::var("MARKET_DATA_BARS_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            path,
            retries,
        })
    }

    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn fetch_once(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DailySeries> {
        let url = self.url();
        let headers = self.headers()?;

        let res = self
            .http
            .get(url)
            .headers(headers)
            .query(&[
                ("symbol", symbol.to_string()),
                ("start", start.to_string()),
                ("end", end.to_string()),
            ])
            .send()
            .await
            .context("market data request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read market data response")?;

        if !status.is_success() {
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                anyhow::bail!(RetryableStatus(status));
            }
            anyhow::bail!("market data HTTP {status}: {text}");
        }

        serde_json::from_str::<DailySeries>(&text)
            .with_context(|| format!("failed to parse daily bars response for {symbol}"))
    }
}

// Marker wrapped in anyhow so the retry loop can tell 429/5xx apart from
// permanent client errors.
#[derive(Debug)]
struct RetryableStatus(StatusCode);

impl std::fmt::Display for RetryableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "market data HTTP {}", self.0)
    }
}

impl std::error::Error for RetryableStatus {}

fn is_retryable(err: &anyhow::Error) -> bool {
    if err.downcast_ref::<RetryableStatus>().is_some() {
        return true;
    }
    match err.downcast_ref::<reqwest::Error>() {
        Some(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        None => false,
    }
}

#[async_trait::async_trait]
impl MarketDataClient for HttpJsonMarketData {
    fn provider_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_daily_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DailySeries> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(symbol, start, end).await {
                Ok(series) => {
                    validate_series(&series, symbol)?;
                    return Ok(series);
                }
                Err(err) => {
                    if attempt >= self.retries || !is_retryable(&err) {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(
                        attempt,
                        ?backoff,
                        symbol,
                        error = %err,
                        "market data fetch failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

fn validate_series(series: &DailySeries, expected_symbol: &str) -> Result<()> {
    anyhow::ensure!(
        series.symbol == expected_symbol,
        "provider symbol mismatch: expected {expected_symbol}, got {}",
        series.symbol
    );

    for pair in series.bars.windows(2) {
        anyhow::ensure!(
            pair[0].date < pair[1].date,
            "bars out of order: {} then {}",
            pair[0].date,
            pair[1].date
        );
    }

    for bar in &series.bars {
        validate_bar(bar)?;
    }

    Ok(())
}

fn validate_bar(bar: &DailyBar) -> Result<()> {
    anyhow::ensure!(
        bar.close.is_finite() && bar.close > 0.0,
        "invalid close {} on {}",
        bar.close,
        bar.date
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn series_from(v: serde_json::Value) -> DailySeries {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn parses_expected_shape() {
        let series = series_from(json!({
            "symbol": "AAPL",
            "bars": [
                {"date": "2026-08-03", "close": 184.25},
                {"date": "2026-08-04", "close": 186.10}
            ]
        }));

        assert_eq!(series.symbol, "AAPL");
        assert_eq!(series.bars.len(), 2);
        assert_eq!(series.last_close(), Some(186.10));
    }

    #[test]
    fn rejects_non_numeric_close_via_deserialize() {
        let res = serde_json::from_value::<DailySeries>(json!({
            "symbol": "AAPL",
            "bars": [{"date": "2026-08-03", "close": "184.25"}]
        }));
        assert!(res.is_err());
    }

    #[test]
    fn validation_rejects_unsorted_dates() {
        let series = series_from(json!({
            "symbol": "AAPL",
            "bars": [
                {"date": "2026-08-04", "close": 186.10},
                {"date": "2026-08-03", "close": 184.25}
            ]
        }));
        assert!(validate_series(&series, "AAPL").is_err());
    }

    #[test]
    fn validation_rejects_non_positive_close() {
        let series = series_from(json!({
            "symbol": "AAPL",
            "bars": [{"date": "2026-08-03", "close": 0.0}]
        }));
        assert!(validate_series(&series, "AAPL").is_err());
    }

    #[test]
    fn validation_rejects_symbol_mismatch() {
        let series = series_from(json!({
            "symbol": "MSFT",
            "bars": [{"date": "2026-08-03", "close": 400.0}]
        }));
        assert!(validate_series(&series, "AAPL").is_err());
    }
}
