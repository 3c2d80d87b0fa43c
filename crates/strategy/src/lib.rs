pub mod change_and_volume;
pub mod config;
pub mod indicators;
pub mod registry;
pub mod rsi;

pub use change_and_volume::ChangeAndVolumeStrategy;
pub use config::{StrategyConfig, StrategyFileConfig, StrategyKind};
pub use registry::{build_strategy, StrategyRegistry};
pub use rsi::RsiStrategy;

use common::{Candle, Direction, Signal};
use rust_decimal::Decimal;

/// All strategy implementations must satisfy this trait.
pub trait Strategy: Send + Sync {
    /// Static settings this instance was built from.
    fn config(&self) -> &StrategyConfig;

    /// Inspect a batch of candles (oldest first) and optionally propose a trade.
    ///
    /// Must be deterministic for a given batch so backtests are reproducible.
    fn analyze_candles(&self, candles: &[Candle]) -> Option<Signal>;

    /// Human-readable name of this strategy instance.
    fn name(&self) -> &str {
        &self.config().name
    }

    /// The instrument this strategy watches (e.g. "BTCUSDT").
    fn instrument(&self) -> &str {
        &self.config().instrument
    }

    /// Candles per `analyze_candles` call. Never zero.
    fn batch_size(&self) -> usize {
        self.config().batch_size.max(1)
    }
}

/// Build a signal for `direction` with exits placed `take_profit_pct` and
/// `stop_loss_pct` percent away from `price`.
pub fn signal_with_exits(
    instrument: &str,
    direction: Direction,
    price: Decimal,
    take_profit_pct: Decimal,
    stop_loss_pct: Decimal,
) -> Signal {
    let tp_shift = price * take_profit_pct / Decimal::ONE_HUNDRED;
    let sl_shift = price * stop_loss_pct / Decimal::ONE_HUNDRED;
    let (tp, sl) = match direction {
        Direction::Long => (price + tp_shift, price - sl_shift),
        Direction::Short => (price - tp_shift, price + sl_shift),
    };
    Signal::new(instrument, direction, tp, sl)
}
