use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One sampling interval of market data for an instrument.
///
/// Historical candles come from the REST klines endpoint; live candles come
/// from the kline stream and are only forwarded once closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub instrument: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// Open time of the interval.
    pub timestamp: DateTime<Utc>,
}

impl Candle {
    /// True when `price` lies inside `[low, high]`, bounds included.
    pub fn touches(&self, price: Decimal) -> bool {
        self.low <= price && price <= self.high
    }
}

/// Direction of a proposed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

/// The exchange calendar answer for the current day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingSchedule {
    pub is_trading_day: bool,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// What the program does after start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkingMode {
    /// Replay historical candles against the test strategy.
    History,
    /// Trade every day on the exchange schedule.
    Trade,
}

impl std::fmt::Display for WorkingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkingMode::History => write!(f, "history"),
            WorkingMode::Trade => write!(f, "trade"),
        }
    }
}
