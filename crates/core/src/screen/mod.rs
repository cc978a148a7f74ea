use crate::domain::allocation::AllocationEntry;
use crate::domain::forecast::RankedCandidate;
use crate::forecast::{ForecastOptions, Forecaster, DEFAULT_SPLIT_SEED};
use crate::ingest::provider::MarketDataClient;
use anyhow::Result;
use chrono::NaiveDate;
use std::time::Duration;

const MAX_LOGGED_FAILURES: usize = 10;

#[derive(Debug, Clone)]
pub struct ScreenOptions {
    /// Currency available; each entry's share count is sized against the
    /// full amount (the budget is not decremented across entries).
    pub budget: f64,

    /// Minimum predicted fractional gain to keep a candidate.
    pub threshold: f64,

    /// Number of top-ranked candidates considered before thresholding.
    pub top_n: usize,

    /// Seed for the forecaster's train/held-out partition.
    pub seed: u64,

    /// Pause between provider requests.
    pub req_delay: Duration,

    /// Emit a progress log line every this many symbols (0 disables).
    pub progress_every: usize,
}

impl Default for ScreenOptions {
    fn default() -> Self {
        Self {
            budget: 100_000.0,
            threshold: 0.02,
            top_n: 40,
            seed: DEFAULT_SPLIT_SEED,
            req_delay: Duration::from_millis(150),
            progress_every: 200,
        }
    }
}

impl ScreenOptions {
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(s) = std::env::var("SCREEN_REQ_DELAY_MS") {
            if let Ok(n) = s.parse::<u64>() {
                self.req_delay = Duration::from_millis(n);
            }
        }

        if let Ok(s) = std::env::var("SCREEN_PROGRESS_EVERY") {
            if let Ok(n) = s.parse::<usize>() {
                self.progress_every = n;
            }
        }

        self
    }
}

#[derive(Debug)]
pub struct ScreenOutcome {
    /// Purchase list, sorted by predicted gain descending. Empty is a
    /// valid outcome, not an error.
    pub entries: Vec<AllocationEntry>,
    pub processed: usize,
    pub skipped: usize,
}

pub struct Screener<'a> {
    forecaster: Forecaster<'a>,
    opts: ScreenOptions,
}

impl<'a> Screener<'a> {
    pub fn new(client: &'a dyn MarketDataClient, opts: ScreenOptions) -> Self {
        let forecaster = Forecaster::with_options(
            client,
            ForecastOptions {
                seed: opts.seed,
                ..ForecastOptions::default()
            },
        );
        Self { forecaster, opts }
    }

    /// One screening pass over the universe. A symbol that fails to
    /// forecast is logged and skipped; it never aborts the batch.
    pub async fn run(&self, universe: &[String], as_of: NaiveDate) -> Result<ScreenOutcome> {
        anyhow::ensure!(
            self.opts.budget.is_finite() && self.opts.budget > 0.0,
            "budget must be positive (got {})",
            self.opts.budget
        );
        anyhow::ensure!(
            self.opts.threshold.is_finite(),
            "threshold must be finite (got {})",
            self.opts.threshold
        );
        anyhow::ensure!(self.opts.top_n >= 1, "top_n must be at least 1");

        let total = universe.len();
        let mut candidates: Vec<RankedCandidate> = Vec::new();
        let mut skipped: usize = 0;
        let mut logged_failures: usize = 0;

        for (idx, symbol) in universe.iter().enumerate() {
            if idx != 0 && !self.opts.req_delay.is_zero() {
                tokio::time::sleep(self.opts.req_delay).await;
            }

            match self.forecaster.forecast(symbol, as_of).await {
                Ok(forecast) => candidates.push(RankedCandidate::new(forecast)),
                Err(err) => {
                    skipped += 1;
                    if logged_failures < MAX_LOGGED_FAILURES {
                        tracing::warn!(
                            idx,
                            symbol = %symbol,
                            skipped,
                            error = %err,
                            "forecast failed; skipping symbol"
                        );
                        logged_failures += 1;
                    }
                }
            }

            if self.opts.progress_every != 0 {
                let n = idx + 1;
                if n == 1 || n == total || (n % self.opts.progress_every == 0) {
                    tracing::info!(
                        processed = n,
                        total,
                        candidates = candidates.len(),
                        skipped,
                        %as_of,
                        "screening progress"
                    );
                }
            }
        }

        let entries = rank_and_allocate(candidates, &self.opts);
        Ok(ScreenOutcome {
            entries,
            processed: total,
            skipped,
        })
    }
}

/// Sort by predicted gain descending (stable, so equal gains keep universe
/// order), keep the top slice, drop entries under the threshold without
/// back-filling, and size each kept entry against the full budget.
fn rank_and_allocate(
    mut candidates: Vec<RankedCandidate>,
    opts: &ScreenOptions,
) -> Vec<AllocationEntry> {
    candidates.sort_by(|a, b| {
        b.increase_pct
            .partial_cmp(&a.increase_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(opts.top_n);

    candidates
        .iter()
        .filter(|c| c.increase_pct >= opts.threshold)
        .map(|c| AllocationEntry::from_candidate(c, opts.budget))
        .collect()
}
