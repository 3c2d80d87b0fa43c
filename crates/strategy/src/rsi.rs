use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::{Candle, Direction, Signal};

use crate::config::StrategyConfig;
use crate::indicators::RsiIndicator;
use crate::{signal_with_exits, Strategy};

/// Mean reversion on RSI extremes computed over the batch closes.
///
/// The batch must hold at least `period + 1` candles; the registry rejects
/// configurations where it cannot.
pub struct RsiStrategy {
    cfg: StrategyConfig,
    indicator: RsiIndicator,
    take_profit_pct: Decimal,
    stop_loss_pct: Decimal,
}

impl RsiStrategy {
    pub fn new(cfg: StrategyConfig) -> Self {
        let indicator = RsiIndicator::new(
            cfg.param_usize("period", 14),
            cfg.param_decimal("overbought", dec!(70)),
            cfg.param_decimal("oversold", dec!(30)),
        );
        Self {
            take_profit_pct: cfg.param_decimal("take_profit_pct", dec!(1)),
            stop_loss_pct: cfg.param_decimal("stop_loss_pct", dec!(0.5)),
            indicator,
            cfg,
        }
    }

    pub fn indicator(&self) -> &RsiIndicator {
        &self.indicator
    }
}

impl Strategy for RsiStrategy {
    fn config(&self) -> &StrategyConfig {
        &self.cfg
    }

    fn analyze_candles(&self, candles: &[Candle]) -> Option<Signal> {
        let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
        let rsi = self.indicator.compute(&closes)?;
        let last = closes.last()?;

        let direction = if rsi <= self.indicator.oversold {
            Direction::Long
        } else if rsi >= self.indicator.overbought && self.cfg.short_enabled {
            Direction::Short
        } else {
            return None;
        };

        Some(signal_with_exits(
            &self.cfg.instrument,
            direction,
            *last,
            self.take_profit_pct,
            self.stop_loss_pct,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyFileConfig;
    use chrono::Utc;

    fn strategy(short_enabled: bool) -> RsiStrategy {
        let mut cfg = StrategyFileConfig::parse(
            r#"
            [test_strategy]
            type = "rsi"
            name = "rsi"
            instrument = "ETHUSDT"
            ticker = "ETH"
            batch_size = 4

            [test_strategy.params]
            period = 3
            "#,
        )
        .unwrap()
        .test_strategy
        .unwrap();
        cfg.short_enabled = short_enabled;
        RsiStrategy::new(cfg)
    }

    fn candles(closes: &[i64]) -> Vec<Candle> {
        closes
            .iter()
            .map(|&c| Candle {
                instrument: "ETHUSDT".into(),
                open: Decimal::from(c),
                high: Decimal::from(c),
                low: Decimal::from(c),
                close: Decimal::from(c),
                volume: dec!(1),
                timestamp: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn oversold_goes_long() {
        let signal = strategy(false).analyze_candles(&candles(&[14, 13, 12, 11])).unwrap();
        assert_eq!(signal.direction(), Direction::Long);
        assert_eq!(signal.instrument(), "ETHUSDT");
    }

    #[test]
    fn overbought_goes_short_only_when_enabled() {
        let rising = candles(&[10, 11, 12, 13]);
        assert!(strategy(false).analyze_candles(&rising).is_none());
        let signal = strategy(true).analyze_candles(&rising).unwrap();
        assert_eq!(signal.direction(), Direction::Short);
    }

    #[test]
    fn short_batch_gives_nothing() {
        assert!(strategy(true).analyze_candles(&candles(&[10, 11])).is_none());
    }
}
