use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::{Candle, Direction, Signal};

use crate::config::StrategyConfig;
use crate::{signal_with_exits, Strategy};

/// Trades a sharp candle body backed by a volume spike.
///
/// The last candle of the batch is the trigger. Its body (close against open)
/// must move at least `price_change_pct` percent, and when the batch holds
/// earlier candles its volume must reach `volume_multiplier` times their
/// average. A rise opens a long; a fall opens a short when shorts are enabled.
pub struct ChangeAndVolumeStrategy {
    cfg: StrategyConfig,
    price_change_pct: Decimal,
    volume_multiplier: Decimal,
    take_profit_pct: Decimal,
    stop_loss_pct: Decimal,
}

impl ChangeAndVolumeStrategy {
    pub fn new(cfg: StrategyConfig) -> Self {
        Self {
            price_change_pct: cfg.param_decimal("price_change_pct", dec!(0.5)),
            volume_multiplier: cfg.param_decimal("volume_multiplier", dec!(2)),
            take_profit_pct: cfg.param_decimal("take_profit_pct", dec!(1)),
            stop_loss_pct: cfg.param_decimal("stop_loss_pct", dec!(0.5)),
            cfg,
        }
    }

    fn volume_confirmed(&self, history: &[Candle], last: &Candle) -> bool {
        if history.is_empty() {
            return true;
        }
        let average = history.iter().map(|c| c.volume).sum::<Decimal>() / Decimal::from(history.len());
        last.volume >= average * self.volume_multiplier
    }
}

impl Strategy for ChangeAndVolumeStrategy {
    fn config(&self) -> &StrategyConfig {
        &self.cfg
    }

    fn analyze_candles(&self, candles: &[Candle]) -> Option<Signal> {
        let (last, history) = candles.split_last()?;
        if last.open.is_zero() {
            return None;
        }

        let change_pct = (last.close - last.open) / last.open * Decimal::ONE_HUNDRED;
        let direction = if change_pct >= self.price_change_pct {
            Direction::Long
        } else if change_pct <= -self.price_change_pct && self.cfg.short_enabled {
            Direction::Short
        } else {
            return None;
        };

        if !self.volume_confirmed(history, last) {
            return None;
        }

        Some(signal_with_exits(
            &self.cfg.instrument,
            direction,
            last.close,
            self.take_profit_pct,
            self.stop_loss_pct,
        ))
    }
}
