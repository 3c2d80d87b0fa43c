use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{AccountSettings, Candle, Result, TradingSchedule};

// The broker-facing capabilities. `engine` implements them against Binance
// and a configured exchange calendar; tests substitute in-memory fakes.

/// Exchange trading calendar for the current day.
#[async_trait]
pub trait TradingScheduleProvider: Send + Sync {
    async fn todays_schedule(&self) -> Result<TradingSchedule>;
}

/// Finite, chronologically ordered historical candles.
#[async_trait]
pub trait CandleSource: Send + Sync {
    async fn historic_candles(
        &self,
        instrument: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>>;
}

/// Unbounded live candles for a set of instruments.
pub trait CandleFeed: Send + Sync {
    /// Start streaming closed candles. Streaming stops when the returned
    /// subscription is dropped.
    fn subscribe(&self, instruments: &[String]) -> CandleSubscription;
}

/// Receiving end of a live candle feed. Owns the producer tasks.
pub struct CandleSubscription {
    rx: mpsc::Receiver<Candle>,
    tasks: Vec<JoinHandle<()>>,
}

impl CandleSubscription {
    pub fn new(rx: mpsc::Receiver<Candle>, tasks: Vec<JoinHandle<()>>) -> Self {
        Self { rx, tasks }
    }

    pub async fn recv(&mut self) -> Option<Candle> {
        self.rx.recv().await
    }
}

impl Drop for CandleSubscription {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Brokerage account lookup.
#[async_trait]
pub trait AccountProvider: Send + Sync {
    /// The account that satisfies `settings`, or `None` when no account is
    /// ready for trading.
    async fn trading_account_id(&self, settings: &AccountSettings) -> Result<Option<String>>;

    /// Free cash available on the account, in the quote currency.
    async fn cash_balance(&self, account_id: &str) -> Result<Decimal>;
}

/// One-way reporting sink. Delivery problems are the sink's own business.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}
