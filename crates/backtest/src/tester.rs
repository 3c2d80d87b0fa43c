use std::sync::Arc;

use chrono::Duration;
use tracing::{error, info};

use common::{CandleSource, Clock, Error, Notifier, ResultSet, Result};
use strategy::Strategy;

use crate::BacktestEvaluator;

/// Downloads history for a strategy's instrument, replays it, and reports
/// the outcome.
pub struct HistoryTester {
    source: Arc<dyn CandleSource>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl HistoryTester {
    pub fn new(
        source: Arc<dyn CandleSource>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            notifier,
            clock,
        }
    }

    /// Test `strategy` on the last `from_days` days of candles.
    ///
    /// A failed download aborts the run before any evaluation.
    pub async fn run(&self, strategy: &dyn Strategy, from_days: i64) -> Result<ResultSet> {
        info!(strategy = %strategy.name(), instrument = %strategy.instrument(), days = from_days, "Start strategy tests");

        let to = self.clock.now();
        let from = Duration::try_days(from_days)
            .and_then(|lookback| to.checked_sub_signed(lookback))
            .ok_or_else(|| {
                error!(days = from_days, "History window is out of range");
                Error::CandleSource(format!("history window of {from_days} days is out of range"))
            })?;
        let candles = self
            .source
            .historic_candles(strategy.instrument(), from, to)
            .await
            .map_err(|e| {
                error!(error = %e, "Download candles for tests failed");
                Error::CandleSource(e.to_string())
            })?;

        let results = BacktestEvaluator::new(strategy).evaluate(&candles);

        let summary = results.summary();
        info!(
            total = summary.total,
            proposed = summary.proposed,
            active = summary.active,
            profit = summary.profit,
            loss = summary.loss,
            canceled = summary.canceled,
            "Test results"
        );
        self.notifier
            .notify(&format!(
                "Test results for {} ({}):\n{summary}",
                strategy.name(),
                strategy.config().ticker
            ))
            .await;

        info!("End strategy tests");
        Ok(results)
    }
}
