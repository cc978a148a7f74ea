use crate::domain::forecast::RankedCandidate;
use serde::{Deserialize, Serialize};

/// Final purchase recommendation for one symbol. `quantity` is the whole
/// number of shares affordable at the full (undecremented) budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub symbol: String,
    pub quantity: u64,
    pub predicted_price: f64,
    pub mse: f64,
}

impl AllocationEntry {
    pub fn from_candidate(candidate: &RankedCandidate, budget: f64) -> Self {
        let quantity = (budget / candidate.forecast.current_price).floor().max(0.0) as u64;
        Self {
            symbol: candidate.forecast.symbol.clone(),
            quantity,
            predicted_price: candidate.forecast.predicted_price,
            mse: candidate.forecast.mse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::forecast::ForecastResult;

    fn candidate(current: f64) -> RankedCandidate {
        RankedCandidate::new(ForecastResult {
            symbol: "A".to_string(),
            current_price: current,
            predicted_price: current * 1.1,
            mse: 2.5,
        })
    }

    #[test]
    fn quantity_is_whole_shares_within_budget() {
        let entry = AllocationEntry::from_candidate(&candidate(300.0), 1000.0);
        assert_eq!(entry.quantity, 3);
        assert!(entry.quantity as f64 * 300.0 <= 1000.0);
    }

    #[test]
    fn quantity_is_zero_when_unaffordable() {
        let entry = AllocationEntry::from_candidate(&candidate(1500.0), 1000.0);
        assert_eq!(entry.quantity, 0);
    }
}
