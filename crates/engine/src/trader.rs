use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use common::{
    AccountProvider, Candle, CandleFeed, Clock, Notifier, Result, ResultSet, Signal,
    SignalStatus, TradingSettings,
};
use strategy::{Strategy, StrategyRegistry};

use crate::scheduler::TradingSessionRunner;

/// Something worth reporting that happened on a candle.
#[derive(Debug, Clone)]
pub enum DayEvent {
    /// A fresh signal was filled on paper and is now active.
    Opened {
        strategy: String,
        ticker: String,
        /// Lot size the fill is booked with.
        lots: u32,
        signal: Signal,
    },
    /// An open signal reached one of its levels.
    Closed { ticker: String, status: SignalStatus },
}

struct StrategySlot {
    strategy: Arc<dyn Strategy>,
    batch: Vec<Candle>,
}

/// Per-day trading state, driven one live candle at a time.
///
/// Keeps at most one open signal per instrument. New signals are filled at
/// once, so they go straight from proposed to active.
pub struct TradingDay {
    slots: Vec<StrategySlot>,
    results: ResultSet,
    signals_until: DateTime<Utc>,
}

impl TradingDay {
    pub fn new(strategies: &StrategyRegistry, signals_until: DateTime<Utc>) -> Self {
        let slots = strategies
            .strategies()
            .iter()
            .map(|strategy| StrategySlot {
                strategy: Arc::clone(strategy),
                batch: Vec::with_capacity(strategy.batch_size()),
            })
            .collect();
        Self {
            slots,
            results: ResultSet::new(),
            signals_until,
        }
    }

    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    /// Check the open signal for the candle's instrument against its range,
    /// then feed the candle to the strategies watching that instrument.
    pub fn on_candle(&mut self, candle: &Candle, now: DateTime<Utc>) -> Vec<DayEvent> {
        let mut events = Vec::new();

        if let Some(status) = self.results.open_for_mut(&candle.instrument) {
            if let Some(hit) = status.signal().level_hit(candle) {
                match status.resolve(hit) {
                    Ok(()) => events.push(DayEvent::Closed {
                        ticker: ticker_for(&self.slots, &candle.instrument),
                        status: status.clone(),
                    }),
                    Err(e) => warn!(error = %e, "Open signal could not be resolved"),
                }
            }
        }

        for slot in self
            .slots
            .iter_mut()
            .filter(|slot| slot.strategy.instrument() == candle.instrument)
        {
            slot.batch.push(candle.clone());
            if slot.batch.len() < slot.strategy.batch_size() {
                continue;
            }
            let proposal = slot.strategy.analyze_candles(&slot.batch);
            slot.batch.clear();

            let Some(signal) = proposal else { continue };
            if now >= self.signals_until {
                info!(strategy = %slot.strategy.name(), %signal, "Signal ignored, too close to session end");
                continue;
            }
            if self.results.open_for_mut(signal.instrument()).is_some() {
                debug!(strategy = %slot.strategy.name(), %signal, "Signal ignored, instrument already has an open signal");
                continue;
            }

            let status = self.results.add(signal.clone());
            if let Err(e) = status.mark_active() {
                warn!(error = %e, "New signal could not be activated");
                continue;
            }
            let lots = slot.strategy.config().max_lots_per_order;
            info!(strategy = %slot.strategy.name(), %signal, lots, "Signal opened");
            events.push(DayEvent::Opened {
                strategy: slot.strategy.name().to_string(),
                ticker: slot.strategy.config().ticker.clone(),
                lots,
                signal,
            });
        }

        events
    }

    /// Cancel every signal still open at the end of the session.
    pub fn close_session(&mut self) -> Vec<SignalStatus> {
        let mut canceled = Vec::new();
        for status in self.results.iter_mut().filter(|s| s.is_open()) {
            match status.mark_canceled() {
                Ok(()) => canceled.push(status.clone()),
                Err(e) => warn!(error = %e, "Open signal could not be canceled"),
            }
        }
        canceled
    }
}

fn ticker_for(slots: &[StrategySlot], instrument: &str) -> String {
    slots
        .iter()
        .find(|slot| slot.strategy.instrument() == instrument)
        .map(|slot| slot.strategy.config().ticker.clone())
        .unwrap_or_else(|| instrument.to_string())
}

/// Session runner that trades on paper against live candles.
pub struct PaperTrader {
    feed: Arc<dyn CandleFeed>,
    accounts: Arc<dyn AccountProvider>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl PaperTrader {
    pub fn new(
        feed: Arc<dyn CandleFeed>,
        accounts: Arc<dyn AccountProvider>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            feed,
            accounts,
            notifier,
            clock,
        }
    }

    async fn report(&self, event: &DayEvent) {
        let message = match event {
            DayEvent::Opened {
                strategy,
                ticker,
                lots,
                signal,
            } => format!(
                "{ticker}: {} {lots} lot(s) opened by {strategy}\nTake profit: {}\nStop loss: {}",
                signal.direction(),
                signal.take_profit_level(),
                signal.stop_loss_level()
            ),
            DayEvent::Closed { ticker, status } if status.is_profit() => {
                format!("{ticker}: take profit reached at {}", status.signal().take_profit_level())
            }
            DayEvent::Closed { ticker, status } => {
                format!("{ticker}: stop loss reached at {}", status.signal().stop_loss_level())
            }
        };
        self.notifier.notify(&message).await;
    }
}

#[async_trait]
impl TradingSessionRunner for PaperTrader {
    async fn run_day(
        &self,
        account_id: &str,
        settings: &TradingSettings,
        strategies: &StrategyRegistry,
        session_end: DateTime<Utc>,
        min_cash_reserve: Decimal,
    ) -> Result<()> {
        let cash = self.accounts.cash_balance(account_id).await?;
        if cash < min_cash_reserve {
            warn!(%cash, reserve = %min_cash_reserve, "Not enough cash for trading today");
            self.notifier
                .notify(&format!(
                    "Trading skipped today: cash {cash} is below the reserve {min_cash_reserve}"
                ))
                .await;
            return Ok(());
        }
        if strategies.is_empty() {
            warn!("No strategies configured, nothing to trade");
            return Ok(());
        }

        let trade_until = session_end - settings.stop_trade_before_close;
        let signals_until = session_end - settings.stop_signals_before_close;
        let now = self.clock.now();
        if now >= trade_until {
            info!(%trade_until, "Trading window is already closed");
            return Ok(());
        }

        let instruments = strategies.instruments();
        info!(?instruments, %trade_until, %signals_until, %cash, "Trading day started");
        self.notifier
            .notify(&format!("Trading day started: {}", instruments.join(", ")))
            .await;

        let mut day = TradingDay::new(strategies, signals_until);
        let mut subscription = self.feed.subscribe(&instruments);
        let deadline = tokio::time::sleep((trade_until - now).to_std().unwrap_or_default());
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    info!("Trading time is over");
                    break;
                }
                candle = subscription.recv() => match candle {
                    Some(candle) => {
                        for event in day.on_candle(&candle, self.clock.now()) {
                            self.report(&event).await;
                        }
                    }
                    None => {
                        warn!("Candle feed closed before the end of trading");
                        break;
                    }
                }
            }
        }
        drop(subscription);

        let canceled = day.close_session();
        if !canceled.is_empty() {
            warn!(count = canceled.len(), "Signals still open at session end were canceled");
        }

        let summary = day.results().summary();
        info!(
            total = summary.total,
            active = summary.active,
            profit = summary.profit,
            loss = summary.loss,
            canceled = summary.canceled,
            "Trading day results"
        );
        self.notifier
            .notify(&format!("Trading day results:\n{summary}"))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    use common::{
        AccountSettings, CandleSubscription, Direction, Error, SignalResult,
    };
    use strategy::StrategyConfig;

    /// Proposes a long ten points either side of every close.
    struct ProposeOnClose {
        config: StrategyConfig,
    }

    impl ProposeOnClose {
        fn new(instrument: &str, ticker: &str) -> Arc<dyn Strategy> {
            let config = toml::from_str(&format!(
                r#"
                type = "change_and_volume"
                name = "always {ticker}"
                instrument = "{instrument}"
                ticker = "{ticker}"
                max_lots_per_order = 3
                "#
            ))
            .unwrap();
            Arc::new(Self { config })
        }
    }

    impl Strategy for ProposeOnClose {
        fn config(&self) -> &StrategyConfig {
            &self.config
        }

        fn analyze_candles(&self, candles: &[Candle]) -> Option<Signal> {
            let close = candles.last()?.close;
            Some(Signal::new(
                self.instrument(),
                Direction::Long,
                close + dec!(10),
                close - dec!(10),
            ))
        }
    }

    fn registry(strategies: Vec<Arc<dyn Strategy>>) -> StrategyRegistry {
        StrategyRegistry::from_strategies(strategies)
    }

    fn candle(instrument: &str, low: Decimal, high: Decimal, close: Decimal) -> Candle {
        Candle {
            instrument: instrument.into(),
            open: close,
            high,
            low,
            close,
            volume: dec!(1),
            timestamp: at(9, 0),
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, h, m, 0).unwrap()
    }

    #[test]
    fn opens_resolves_and_reopens_one_signal_per_instrument() {
        let mut day = TradingDay::new(&registry(vec![ProposeOnClose::new("BTCUSDT", "BTC")]), at(15, 0));

        let events = day.on_candle(&candle("BTCUSDT", dec!(99), dec!(101), dec!(100)), at(9, 0));
        assert!(matches!(&events[..], [DayEvent::Opened { ticker, lots: 3, .. }] if ticker == "BTC"));
        assert_eq!(day.results().active_signals().len(), 1);

        // Take profit at 110 is reached, then a new signal opens on the same candle.
        let events = day.on_candle(&candle("BTCUSDT", dec!(100), dec!(111), dec!(105)), at(9, 1));
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], DayEvent::Closed { status, .. } if status.is_profit()));
        assert!(matches!(&events[1], DayEvent::Opened { .. }));

        // Already open: the new proposal is dropped.
        let events = day.on_candle(&candle("BTCUSDT", dec!(100), dec!(106), dec!(103)), at(9, 2));
        assert!(events.is_empty());
        assert_eq!(day.results().len(), 2);
    }

    #[test]
    fn stop_loss_wins_when_candle_spans_both_levels() {
        let mut day = TradingDay::new(&registry(vec![ProposeOnClose::new("BTCUSDT", "BTC")]), at(15, 0));
        day.on_candle(&candle("BTCUSDT", dec!(99), dec!(101), dec!(100)), at(9, 0));

        let events = day.on_candle(&candle("BTCUSDT", dec!(80), dec!(120), dec!(100)), at(9, 1));
        assert!(matches!(&events[0], DayEvent::Closed { status, .. } if status.is_loss()));
    }

    #[test]
    fn instruments_do_not_interfere() {
        let strategies = registry(vec![
            ProposeOnClose::new("BTCUSDT", "BTC"),
            ProposeOnClose::new("ETHUSDT", "ETH"),
        ]);
        let mut day = TradingDay::new(&strategies, at(15, 0));

        day.on_candle(&candle("BTCUSDT", dec!(99), dec!(101), dec!(100)), at(9, 0));
        day.on_candle(&candle("ETHUSDT", dec!(9), dec!(11), dec!(10)), at(9, 0));
        // Spans both BTC levels but misses the ETH ones.
        day.on_candle(&candle("ETHUSDT", dec!(80), dec!(120), dec!(10)), at(9, 1));

        assert_eq!(day.results().active_signals().len(), 2);
    }

    #[test]
    fn no_new_signals_after_cutoff() {
        let mut day = TradingDay::new(&registry(vec![ProposeOnClose::new("BTCUSDT", "BTC")]), at(15, 0));
        let events = day.on_candle(&candle("BTCUSDT", dec!(99), dec!(101), dec!(100)), at(15, 0));
        assert!(events.is_empty());
        assert!(day.results().is_empty());
    }

    #[test]
    fn close_session_cancels_open_signals() {
        let mut day = TradingDay::new(&registry(vec![ProposeOnClose::new("BTCUSDT", "BTC")]), at(15, 0));
        day.on_candle(&candle("BTCUSDT", dec!(99), dec!(101), dec!(100)), at(9, 0));

        let canceled = day.close_session();
        assert_eq!(canceled.len(), 1);
        assert_eq!(canceled[0].result(), SignalResult::Canceled);
        assert!(day.close_session().is_empty());
    }

    // ─── run_day ────────────────────────────────────────────────────────────

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    /// Replays a fixed list of candles. With `keep_open` the channel stays
    /// open after the last candle.
    struct ScriptedFeed {
        candles: Vec<Candle>,
        keep_open: bool,
        senders: Mutex<Vec<mpsc::Sender<Candle>>>,
    }

    impl CandleFeed for ScriptedFeed {
        fn subscribe(&self, _instruments: &[String]) -> CandleSubscription {
            let (tx, rx) = mpsc::channel(self.candles.len().max(1));
            for candle in &self.candles {
                tx.try_send(candle.clone()).unwrap();
            }
            if self.keep_open {
                self.senders.lock().unwrap().push(tx);
            }
            CandleSubscription::new(rx, Vec::new())
        }
    }

    struct FakeAccounts(Decimal);

    #[async_trait]
    impl AccountProvider for FakeAccounts {
        async fn trading_account_id(&self, _settings: &AccountSettings) -> Result<Option<String>> {
            Ok(Some("spot-1".into()))
        }

        async fn cash_balance(&self, account_id: &str) -> Result<Decimal> {
            if account_id != "spot-1" {
                return Err(Error::AccountNotFound);
            }
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    #[async_trait]
    impl Notifier for Recorder {
        async fn notify(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    fn trader(feed: ScriptedFeed, cash: Decimal, notifier: Arc<Recorder>) -> PaperTrader {
        PaperTrader::new(
            Arc::new(feed),
            Arc::new(FakeAccounts(cash)),
            notifier,
            Arc::new(FixedClock(at(9, 0))),
        )
    }

    fn settings() -> TradingSettings {
        TradingSettings {
            stop_trade_before_close: Duration::minutes(5),
            stop_signals_before_close: Duration::minutes(30),
            ..TradingSettings::default()
        }
    }

    #[tokio::test]
    async fn run_day_trades_until_feed_closes() {
        let feed = ScriptedFeed {
            candles: vec![
                candle("BTCUSDT", dec!(99), dec!(101), dec!(100)),
                candle("BTCUSDT", dec!(100), dec!(111), dec!(105)),
            ],
            keep_open: false,
            senders: Mutex::new(Vec::new()),
        };
        let notifier = Arc::new(Recorder::default());
        let trader = trader(feed, dec!(1000), notifier.clone());
        let strategies = registry(vec![ProposeOnClose::new("BTCUSDT", "BTC")]);

        trader
            .run_day("spot-1", &settings(), &strategies, at(15, 40), dec!(100))
            .await
            .unwrap();

        let messages = notifier.0.lock().unwrap().clone();
        assert!(messages[0].starts_with("Trading day started: BTCUSDT"));
        assert!(messages[1].starts_with("BTC: long 3 lot(s) opened by always BTC"));
        assert!(messages.iter().any(|m| m.contains("take profit reached")));
        let last = messages.last().unwrap();
        assert!(last.contains("Signals found: 2"));
        assert!(last.contains("Take profit: 1"));
        assert!(last.contains("Canceled: 1"));
    }

    #[tokio::test]
    async fn low_cash_skips_the_day() {
        let feed = ScriptedFeed {
            candles: Vec::new(),
            keep_open: false,
            senders: Mutex::new(Vec::new()),
        };
        let notifier = Arc::new(Recorder::default());
        let trader = trader(feed, dec!(50), notifier.clone());
        let strategies = registry(vec![ProposeOnClose::new("BTCUSDT", "BTC")]);

        trader
            .run_day("spot-1", &settings(), &strategies, at(15, 40), dec!(100))
            .await
            .unwrap();

        let messages = notifier.0.lock().unwrap().clone();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Trading skipped today"));
    }

    #[tokio::test]
    async fn account_error_propagates() {
        let feed = ScriptedFeed {
            candles: Vec::new(),
            keep_open: false,
            senders: Mutex::new(Vec::new()),
        };
        let trader = trader(feed, dec!(1000), Arc::new(Recorder::default()));
        let strategies = registry(vec![ProposeOnClose::new("BTCUSDT", "BTC")]);

        let result = trader
            .run_day("unknown", &settings(), &strategies, at(15, 40), dec!(100))
            .await;
        assert!(matches!(result, Err(Error::AccountNotFound)));
    }

    #[tokio::test(start_paused = true)]
    async fn run_day_stops_at_trading_deadline() {
        let feed = ScriptedFeed {
            candles: vec![candle("BTCUSDT", dec!(99), dec!(101), dec!(100))],
            keep_open: true,
            senders: Mutex::new(Vec::new()),
        };
        let notifier = Arc::new(Recorder::default());
        let trader = trader(feed, dec!(1000), notifier.clone());
        let strategies = registry(vec![ProposeOnClose::new("BTCUSDT", "BTC")]);

        let started = tokio::time::Instant::now();
        // Session ends 10 minutes after the clock, trading stops 5 minutes before.
        trader
            .run_day("spot-1", &settings(), &strategies, at(9, 10), dec!(100))
            .await
            .unwrap();

        assert!(started.elapsed() >= std::time::Duration::from_secs(5 * 60));
        let messages = notifier.0.lock().unwrap().clone();
        // Signal cutoff (08:40) is already past, so nothing opened.
        assert!(messages.last().unwrap().contains("Signals found: 0"));
    }
}
