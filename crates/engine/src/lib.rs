pub mod binance;
pub mod calendar;
pub mod scheduler;
pub mod shutdown;
pub mod trader;

pub use binance::{BinanceClient, BinanceFeed};
pub use calendar::ExchangeCalendar;
pub use scheduler::{
    find_trading_account, next_morning, DayScheduler, IterationOutcome, SchedulerState,
    TradingSessionRunner,
};
pub use shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};
pub use trader::{DayEvent, PaperTrader, TradingDay};
