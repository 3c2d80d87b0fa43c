use tracing::{debug, info, warn};

use common::{Candle, ResultSet};
use strategy::Strategy;

/// Replays historical candles against one strategy.
///
/// At most one signal is tracked at a time: while a proposal is unresolved,
/// new proposals from the strategy are dropped. Statuses never leave
/// `Proposed` except through a stop-loss or take-profit hit.
pub struct BacktestEvaluator<'a> {
    strategy: &'a dyn Strategy,
    batch_size: usize,
}

impl<'a> BacktestEvaluator<'a> {
    /// Uses the strategy's configured batch size.
    pub fn new(strategy: &'a dyn Strategy) -> Self {
        Self {
            batch_size: strategy.batch_size(),
            strategy,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Run the whole candle sequence (oldest first) and return every signal
    /// proposed along the way. Signals still `Proposed` at the end were never
    /// resolved.
    pub fn evaluate(&self, candles: &[Candle]) -> ResultSet {
        info!(
            strategy = %self.strategy.name(),
            batch = self.batch_size,
            candles = candles.len(),
            "Start test"
        );

        let mut results = ResultSet::new();
        let mut batch: Vec<Candle> = Vec::with_capacity(self.batch_size);

        for candle in candles {
            resolve_levels(&mut results, candle);

            batch.push(candle.clone());
            if batch.len() < self.batch_size {
                continue;
            }

            let proposal = self.strategy.analyze_candles(&batch);
            batch.clear();

            if let Some(signal) = proposal {
                info!(signal = %signal, "New signal");
                if results.has_proposed() {
                    debug!("Signal skipped, previous one still open");
                } else {
                    results.add(signal);
                }
            }
        }

        info!(summary = ?results.summary(), "Test completed");
        results
    }
}

/// Close every proposed status whose stop-loss or take-profit lies inside
/// the candle range. Stop-loss is checked first.
fn resolve_levels(results: &mut ResultSet, candle: &Candle) {
    for status in results.iter_mut().filter(|s| s.is_proposed()) {
        let Some(hit) = status.signal().level_hit(candle) else {
            continue;
        };
        match status.resolve(hit) {
            Ok(()) => info!(
                hit = ?hit,
                signal = %status.signal(),
                low = %candle.low,
                high = %candle.high,
                at = %candle.timestamp,
                "Test level executed"
            ),
            Err(e) => warn!(error = %e, "Cannot resolve test signal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use common::{Direction, Signal};
    use strategy::StrategyConfig;

    /// Proposes a scripted signal on chosen calls and records every batch.
    struct Scripted {
        cfg: StrategyConfig,
        proposals: Vec<Option<(Decimal, Decimal)>>,
        calls: Mutex<Vec<Vec<Candle>>>,
    }

    impl Scripted {
        fn new(batch_size: usize, proposals: Vec<Option<(Decimal, Decimal)>>) -> Self {
            let cfg: StrategyConfig = toml::from_str(&format!(
                r#"
                type = "change_and_volume"
                name = "scripted"
                instrument = "BTCUSDT"
                ticker = "BTC"
                batch_size = {batch_size}
                "#
            ))
            .unwrap();
            Self {
                cfg,
                proposals,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Vec<Candle>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Strategy for Scripted {
        fn config(&self) -> &StrategyConfig {
            &self.cfg
        }

        fn analyze_candles(&self, candles: &[Candle]) -> Option<Signal> {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.len();
            calls.push(candles.to_vec());
            self.proposals
                .get(n)
                .copied()
                .flatten()
                .map(|(tp, sl)| Signal::new("BTCUSDT", Direction::Long, tp, sl))
        }
    }

    fn candle(i: i64, high: Decimal, low: Decimal) -> Candle {
        Candle {
            instrument: "BTCUSDT".into(),
            open: low,
            high,
            low,
            close: high,
            volume: dec!(1),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 2, 7, 0, 0).unwrap() + Duration::minutes(i),
        }
    }

    #[test]
    fn empty_candles_give_empty_results() {
        let s = Scripted::new(1, vec![]);
        let results = BacktestEvaluator::new(&s).evaluate(&[]);
        assert!(results.is_empty());
        assert!(s.calls().is_empty());
    }

    #[test]
    fn both_levels_in_range_resolve_as_loss() {
        let s = Scripted::new(1, vec![Some((dec!(105), dec!(95)))]);
        let candles = [candle(0, dec!(100), dec!(99)), candle(1, dec!(110), dec!(90))];
        let results = BacktestEvaluator::new(&s).evaluate(&candles);

        assert_eq!(results.len(), 1);
        assert!(results.statuses()[0].is_loss());
        assert!(results.profit_signals().is_empty());
    }

    #[test]
    fn untouched_levels_stay_proposed() {
        let s = Scripted::new(1, vec![Some((dec!(105), dec!(95)))]);
        let candles = [candle(0, dec!(100), dec!(99)), candle(1, dec!(100), dec!(98))];
        let results = BacktestEvaluator::new(&s).evaluate(&candles);

        assert_eq!(results.proposed_signals().len(), 1);
    }

    #[test]
    fn take_profit_hit_resolves_as_profit() {
        let s = Scripted::new(1, vec![Some((dec!(105), dec!(95)))]);
        let candles = [candle(0, dec!(100), dec!(99)), candle(1, dec!(106), dec!(101))];
        let results = BacktestEvaluator::new(&s).evaluate(&candles);

        assert_eq!(results.profit_signals().len(), 1);
    }

    #[test]
    fn signal_is_not_checked_against_the_candle_that_produced_it() {
        // The proposing candle already spans both levels.
        let s = Scripted::new(1, vec![Some((dec!(105), dec!(95)))]);
        let results = BacktestEvaluator::new(&s).evaluate(&[candle(0, dec!(110), dec!(90))]);
        assert!(results.statuses()[0].is_proposed());
    }

    #[test]
    fn new_proposal_dropped_while_one_is_open() {
        let s = Scripted::new(
            1,
            vec![
                Some((dec!(105), dec!(95))),
                Some((dec!(200), dec!(10))),
                None,
                Some((dec!(300), dec!(1))),
            ],
        );
        let candles = [
            candle(0, dec!(100), dec!(99)),
            candle(1, dec!(100), dec!(99)),
            candle(2, dec!(96), dec!(94)),
            candle(3, dec!(100), dec!(99)),
        ];
        let results = BacktestEvaluator::new(&s).evaluate(&candles);

        // First resolved as loss on candle 2, second dropped, fourth accepted.
        assert_eq!(results.len(), 2);
        assert!(results.statuses()[0].is_loss());
        assert!(results.statuses()[1].is_proposed());
        assert_eq!(results.statuses()[1].signal().take_profit_level(), dec!(300));
    }

    #[test]
    fn batch_size_one_calls_strategy_once_per_candle_in_order() {
        let s = Scripted::new(1, vec![]);
        let candles: Vec<Candle> = (0..5).map(|i| candle(i, dec!(100), dec!(99))).collect();
        BacktestEvaluator::new(&s).evaluate(&candles);

        let calls = s.calls();
        assert_eq!(calls.len(), 5);
        for (i, batch) in calls.iter().enumerate() {
            assert_eq!(batch.as_slice(), std::slice::from_ref(&candles[i]));
        }
    }

    #[test]
    fn batches_are_cleared_after_each_call() {
        let s = Scripted::new(3, vec![]);
        let candles: Vec<Candle> = (0..7).map(|i| candle(i, dec!(100), dec!(99))).collect();
        BacktestEvaluator::new(&s).evaluate(&candles);

        let calls = s.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], candles[0..3].to_vec());
        assert_eq!(calls[1], candles[3..6].to_vec());
    }

    #[test]
    fn explicit_batch_size_overrides_strategy() {
        let s = Scripted::new(3, vec![]);
        let evaluator = BacktestEvaluator::new(&s).with_batch_size(2);
        assert_eq!(evaluator.batch_size(), 2);
        let candles: Vec<Candle> = (0..4).map(|i| candle(i, dec!(100), dec!(99))).collect();
        evaluator.evaluate(&candles);
        assert_eq!(s.calls().len(), 2);
    }
}
