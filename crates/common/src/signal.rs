use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::{Candle, Direction};

/// A trade proposed by a strategy, with the two price levels that resolve it.
///
/// Signals are immutable once built. Two signals with identical fields are
/// still different signals: equality compares the id assigned at creation.
#[derive(Debug, Clone)]
pub struct Signal {
    id: Uuid,
    instrument: String,
    direction: Direction,
    take_profit_level: Decimal,
    stop_loss_level: Decimal,
}

impl Signal {
    pub fn new(
        instrument: impl Into<String>,
        direction: Direction,
        take_profit_level: Decimal,
        stop_loss_level: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            instrument: instrument.into(),
            direction,
            take_profit_level,
            stop_loss_level,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn take_profit_level(&self) -> Decimal {
        self.take_profit_level
    }

    pub fn stop_loss_level(&self) -> Decimal {
        self.stop_loss_level
    }

    /// Whether the levels sit on the expected sides for the direction.
    /// Not enforced on construction.
    pub fn has_consistent_levels(&self) -> bool {
        match self.direction {
            Direction::Long => self.take_profit_level > self.stop_loss_level,
            Direction::Short => self.take_profit_level < self.stop_loss_level,
        }
    }

    /// Which level, if any, the candle's `[low, high]` range reached.
    ///
    /// The path inside a candle is unknown, so when both levels are inside
    /// the range the stop-loss wins.
    pub fn level_hit(&self, candle: &Candle) -> Option<LevelHit> {
        if candle.touches(self.stop_loss_level) {
            Some(LevelHit::StopLoss)
        } else if candle.touches(self.take_profit_level) {
            Some(LevelHit::TakeProfit)
        } else {
            None
        }
    }
}

impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Signal {}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} tp={} sl={}",
            self.direction, self.instrument, self.take_profit_level, self.stop_loss_level
        )
    }
}

/// Level reached by a candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelHit {
    StopLoss,
    TakeProfit,
}

/// Lifecycle state of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignalResult {
    #[default]
    Proposed,
    Active,
    Profit,
    Loss,
    Canceled,
}

impl SignalResult {
    /// Profit, Loss and Canceled absorb every further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, SignalResult::Profit | SignalResult::Loss | SignalResult::Canceled)
    }

    /// The transition table.
    pub fn can_become(self, next: SignalResult) -> bool {
        use SignalResult::*;
        matches!(
            (self, next),
            (Proposed, Active | Profit | Loss | Canceled) | (Active, Profit | Loss | Canceled)
        )
    }
}

impl std::fmt::Display for SignalResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalResult::Proposed => write!(f, "proposed"),
            SignalResult::Active => write!(f, "active"),
            SignalResult::Profit => write!(f, "profit"),
            SignalResult::Loss => write!(f, "loss"),
            SignalResult::Canceled => write!(f, "canceled"),
        }
    }
}

/// Rejected lifecycle transition. The status keeps its previous state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal signal transition {from} -> {to}")]
pub struct TransitionError {
    pub from: SignalResult,
    pub to: SignalResult,
}

/// Mutable lifecycle wrapper owning exactly one [`Signal`].
#[derive(Debug, Clone)]
pub struct SignalStatus {
    signal: Signal,
    result: SignalResult,
}

impl SignalStatus {
    pub fn new(signal: Signal) -> Self {
        Self {
            signal,
            result: SignalResult::Proposed,
        }
    }

    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    pub fn result(&self) -> SignalResult {
        self.result
    }

    /// The order for the signal has been filled.
    pub fn mark_active(&mut self) -> Result<(), TransitionError> {
        self.transition(SignalResult::Active)
    }

    pub fn mark_take_profit(&mut self) -> Result<(), TransitionError> {
        self.transition(SignalResult::Profit)
    }

    pub fn mark_stop_loss(&mut self) -> Result<(), TransitionError> {
        self.transition(SignalResult::Loss)
    }

    pub fn mark_canceled(&mut self) -> Result<(), TransitionError> {
        self.transition(SignalResult::Canceled)
    }

    /// Apply the outcome of a level hit.
    pub fn resolve(&mut self, hit: LevelHit) -> Result<(), TransitionError> {
        match hit {
            LevelHit::StopLoss => self.mark_stop_loss(),
            LevelHit::TakeProfit => self.mark_take_profit(),
        }
    }

    pub fn is_proposed(&self) -> bool {
        self.result == SignalResult::Proposed
    }

    pub fn is_active(&self) -> bool {
        self.result == SignalResult::Active
    }

    pub fn is_profit(&self) -> bool {
        self.result == SignalResult::Profit
    }

    pub fn is_loss(&self) -> bool {
        self.result == SignalResult::Loss
    }

    pub fn is_canceled(&self) -> bool {
        self.result == SignalResult::Canceled
    }

    /// Proposed or active: the signal still waits for an outcome.
    pub fn is_open(&self) -> bool {
        !self.result.is_terminal()
    }

    fn transition(&mut self, next: SignalResult) -> Result<(), TransitionError> {
        if !self.result.can_become(next) {
            return Err(TransitionError {
                from: self.result,
                to: next,
            });
        }
        self.result = next;
        Ok(())
    }
}
