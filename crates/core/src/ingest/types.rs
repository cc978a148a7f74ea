use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day's closing observation for a symbol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub close: f64,
}

/// Date-ascending daily bars for one symbol over the requested window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySeries {
    pub symbol: String,
    pub bars: Vec<DailyBar>,
}

impl DailySeries {
    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }
}
