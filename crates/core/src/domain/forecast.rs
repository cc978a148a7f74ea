use serde::{Deserialize, Serialize};

/// Next-day price estimate for one symbol, derived from a single fetched
/// series. `current_price` is the close of that series' last bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResult {
    pub symbol: String,
    pub current_price: f64,
    pub predicted_price: f64,
    pub mse: f64,
}

/// A successful forecast plus the predicted fractional gain it is ranked by.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub forecast: ForecastResult,
    pub increase_pct: f64,
}

impl RankedCandidate {
    pub fn new(forecast: ForecastResult) -> Self {
        let increase_pct =
            (forecast.predicted_price - forecast.current_price) / forecast.current_price;
        Self {
            forecast,
            increase_pct,
        }
    }
}
