pub mod model;

use crate::domain::forecast::ForecastResult;
use crate::forecast::model::{mean_squared_error, LinearModel, ModelError};
use crate::ingest::provider::MarketDataClient;
use crate::ingest::types::DailySeries;
use chrono::{Duration, NaiveDate};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;

const DEFAULT_LOOKBACK_DAYS: i64 = 365;
const DEFAULT_TEST_FRACTION: f64 = 0.2;
pub const DEFAULT_SPLIT_SEED: u64 = 42;

/// Per-symbol failure taxonomy. All variants are recoverable at the
/// screening boundary: the symbol is logged and skipped.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("no usable history for {symbol}")]
    DataUnavailable {
        symbol: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("history for {symbol} too short to split ({pairs} training pairs)")]
    InsufficientData { symbol: String, pairs: usize },

    #[error("regression for {symbol} is degenerate")]
    ModelDegenerate {
        symbol: String,
        #[source]
        source: ModelError,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct ForecastOptions {
    /// Calendar days of history to request (one trailing year).
    pub lookback_days: i64,

    /// Fraction of training pairs held out for error measurement.
    pub test_fraction: f64,

    /// Seed for the deterministic train/held-out partition.
    pub seed: u64,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: DEFAULT_SPLIT_SEED,
        }
    }
}

pub struct Forecaster<'a> {
    client: &'a dyn MarketDataClient,
    opts: ForecastOptions,
}

impl<'a> Forecaster<'a> {
    pub fn new(client: &'a dyn MarketDataClient) -> Self {
        Self::with_options(client, ForecastOptions::default())
    }

    pub fn with_options(client: &'a dyn MarketDataClient, opts: ForecastOptions) -> Self {
        Self { client, opts }
    }

    /// Fit a next-day close model on one symbol's trailing history and
    /// predict from the most recent close. One provider fetch per call;
    /// the series is dropped afterwards.
    pub async fn forecast(
        &self,
        symbol: &str,
        as_of: NaiveDate,
    ) -> Result<ForecastResult, ForecastError> {
        let start = as_of - Duration::days(self.opts.lookback_days);
        let series = self
            .client
            .fetch_daily_series(symbol, start, as_of)
            .await
            .map_err(|source| ForecastError::DataUnavailable {
                symbol: symbol.to_string(),
                source,
            })?;

        let Some(current_price) = series.last_close() else {
            return Err(ForecastError::DataUnavailable {
                symbol: symbol.to_string(),
                source: anyhow::anyhow!("provider returned an empty series"),
            });
        };

        let pairs = training_pairs(&series);
        let Some((train_idx, test_idx)) =
            split_indices(pairs.len(), self.opts.test_fraction, self.opts.seed)
        else {
            return Err(ForecastError::InsufficientData {
                symbol: symbol.to_string(),
                pairs: pairs.len(),
            });
        };

        let x_train = Array1::from_iter(train_idx.iter().map(|&i| pairs[i].0));
        let y_train = Array1::from_iter(train_idx.iter().map(|&i| pairs[i].1));
        let x_test = Array1::from_iter(test_idx.iter().map(|&i| pairs[i].0));
        let y_test = Array1::from_iter(test_idx.iter().map(|&i| pairs[i].1));

        let model =
            LinearModel::fit(&x_train, &y_train).map_err(|source| ForecastError::ModelDegenerate {
                symbol: symbol.to_string(),
                source,
            })?;

        let mse = mean_squared_error(&y_test, &model.predict(&x_test));
        let predicted_price = model.predict_one(current_price);

        Ok(ForecastResult {
            symbol: symbol.to_string(),
            current_price,
            predicted_price,
            mse,
        })
    }
}

/// One supervised pair per day except the last: today's close as the
/// feature, tomorrow's close as the target.
fn training_pairs(series: &DailySeries) -> Vec<(f64, f64)> {
    series
        .bars
        .windows(2)
        .map(|w| (w[0].close, w[1].close))
        .collect()
}

/// Seeded shuffle-and-cut partition. Returns None unless both sides end up
/// non-empty, so the caller can report the series as too short.
fn split_indices(n: usize, test_fraction: f64, seed: u64) -> Option<(Vec<usize>, Vec<usize>)> {
    let n_test = ((n as f64) * test_fraction).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_train == 0 || n_test == 0 {
        return None;
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test = indices.split_off(n_train);
    Some((indices, test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::DailyBar;
    use std::collections::HashMap;

    struct FakeClient {
        series: HashMap<String, DailySeries>,
    }

    #[async_trait::async_trait]
    impl MarketDataClient for FakeClient {
        fn provider_name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_daily_series(
            &self,
            symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> anyhow::Result<DailySeries> {
            self.series
                .get(symbol)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("unknown symbol {symbol}"))
        }
    }

    fn series(symbol: &str, closes: &[f64]) -> DailySeries {
        let d0 = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        DailySeries {
            symbol: symbol.to_string(),
            bars: closes
                .iter()
                .enumerate()
                .map(|(i, &close)| DailyBar {
                    date: d0 + Duration::days(i as i64),
                    close,
                })
                .collect(),
        }
    }

    fn client_with(symbol: &str, closes: &[f64]) -> FakeClient {
        let mut map = HashMap::new();
        map.insert(symbol.to_string(), series(symbol, closes));
        FakeClient { series: map }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 5).unwrap()
    }

    #[test]
    fn one_pair_per_day_except_the_last() {
        let s = series("A", &[1.0, 2.0, 3.0, 4.0]);
        let pairs = training_pairs(&s);
        assert_eq!(pairs, vec![(1.0, 2.0), (2.0, 3.0), (3.0, 4.0)]);
    }

    #[test]
    fn split_is_deterministic_for_a_seed() {
        let a = split_indices(50, 0.2, 42).unwrap();
        let b = split_indices(50, 0.2, 42).unwrap();
        assert_eq!(a, b);

        let c = split_indices(50, 0.2, 7).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn split_sizes_are_eighty_twenty() {
        let (train, test) = split_indices(50, 0.2, 42).unwrap();
        assert_eq!(train.len(), 40);
        assert_eq!(test.len(), 10);

        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn split_requires_both_sides_non_empty() {
        assert!(split_indices(0, 0.2, 42).is_none());
        assert!(split_indices(1, 0.2, 42).is_none());
        assert!(split_indices(2, 0.2, 42).is_some());
    }

    #[tokio::test]
    async fn forecasts_a_linear_series_almost_exactly() {
        // close[i+1] = close[i] + 1, so the fit is exact and the next-day
        // prediction is last close + 1.
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let client = client_with("AAPL", &closes);
        let forecaster = Forecaster::new(&client);

        let result = forecaster.forecast("AAPL", as_of()).await.unwrap();
        assert_eq!(result.current_price, 159.0);
        assert!((result.predicted_price - 160.0).abs() < 1e-6);
        assert!(result.mse >= 0.0);
        assert!(result.mse < 1e-9);
    }

    #[tokio::test]
    async fn unknown_symbol_is_data_unavailable() {
        let client = FakeClient {
            series: HashMap::new(),
        };
        let forecaster = Forecaster::new(&client);

        let err = forecaster.forecast("GONE", as_of()).await.unwrap_err();
        assert!(matches!(err, ForecastError::DataUnavailable { .. }));
    }

    #[tokio::test]
    async fn empty_series_is_data_unavailable() {
        let client = client_with("EMPTY", &[]);
        let forecaster = Forecaster::new(&client);

        let err = forecaster.forecast("EMPTY", as_of()).await.unwrap_err();
        assert!(matches!(err, ForecastError::DataUnavailable { .. }));
    }

    #[tokio::test]
    async fn two_bars_are_insufficient_to_split() {
        let client = client_with("TINY", &[10.0, 11.0]);
        let forecaster = Forecaster::new(&client);

        let err = forecaster.forecast("TINY", as_of()).await.unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientData { pairs: 1, .. }
        ));
    }

    #[tokio::test]
    async fn flat_series_is_degenerate() {
        let client = client_with("FLAT", &[50.0; 30]);
        let forecaster = Forecaster::new(&client);

        let err = forecaster.forecast("FLAT", as_of()).await.unwrap_err();
        assert!(matches!(err, ForecastError::ModelDegenerate { .. }));
    }

    #[tokio::test]
    async fn ten_bars_of_varied_input_succeed() {
        let closes = [10.0, 10.5, 10.2, 11.0, 10.8, 11.4, 11.1, 11.9, 12.3, 12.0];
        let client = client_with("OK", &closes);
        let forecaster = Forecaster::new(&client);

        let result = forecaster.forecast("OK", as_of()).await.unwrap();
        assert_eq!(result.current_price, 12.0);
        assert!(result.mse >= 0.0);
    }
}
