pub mod clock;
pub mod config;
pub mod error;
pub mod exchange;
pub mod results;
pub mod signal;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use config::{AccountSettings, BlogSettings, CalendarSettings, Config, TradingSettings};
pub use error::{Error, Result};
pub use exchange::{
    AccountProvider, CandleFeed, CandleSource, CandleSubscription, Notifier,
    TradingScheduleProvider,
};
pub use results::{ResultSet, ResultSummary};
pub use signal::{LevelHit, Signal, SignalResult, SignalStatus, TransitionError};
pub use types::*;
