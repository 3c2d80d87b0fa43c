use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use common::{
    AccountProvider, AccountSettings, Clock, Error, Result, TradingScheduleProvider,
    TradingSettings,
};
use strategy::StrategyRegistry;

use crate::shutdown::Shutdown;

/// Runs one trading day. The scheduler awaits it to completion before it
/// moves on, so sessions never overlap.
#[async_trait]
pub trait TradingSessionRunner: Send + Sync {
    async fn run_day(
        &self,
        account_id: &str,
        settings: &TradingSettings,
        strategies: &StrategyRegistry,
        session_end: DateTime<Utc>,
        min_cash_reserve: Decimal,
    ) -> Result<()>;
}

/// Look up the account to trade on. No suitable account is an error.
pub async fn find_trading_account(
    accounts: &dyn AccountProvider,
    settings: &AccountSettings,
) -> Result<String> {
    info!("Finding account for trading");
    match accounts.trading_account_id(settings).await? {
        Some(account_id) => {
            info!(%account_id, "Account for trading found");
            Ok(account_id)
        }
        None => {
            error!("Account for trading hasn't been found");
            Err(Error::AccountNotFound)
        }
    }
}

/// How one scheduler iteration ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    NotTradingDay,
    /// Trading day, but the session had already closed.
    SessionOver,
    Completed,
    /// Schedule lookup or session failed; the loop carries on tomorrow.
    Failed(String),
    Interrupted,
}

/// Bookkeeping owned by the loop.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    pub iterations: u64,
    pub sessions_completed: u64,
    pub failures: u64,
    pub last_outcome: Option<IterationOutcome>,
}

impl SchedulerState {
    fn record(&mut self, outcome: &IterationOutcome) {
        self.iterations += 1;
        match outcome {
            IterationOutcome::Completed => self.sessions_completed += 1,
            IterationOutcome::Failed(_) => self.failures += 1,
            _ => {}
        }
        self.last_outcome = Some(outcome.clone());
    }
}

/// Once-a-day loop: check the calendar, wait for the delayed open, run the
/// session, sleep until the next morning.
///
/// A failure in any day is logged and the loop waits for the next morning.
/// The loop only ends on shutdown.
pub struct DayScheduler {
    account_id: String,
    schedule: Arc<dyn TradingScheduleProvider>,
    runner: Arc<dyn TradingSessionRunner>,
    clock: Arc<dyn Clock>,
    settings: TradingSettings,
    strategies: StrategyRegistry,
    min_cash_reserve: Decimal,
    shutdown: Shutdown,
    state: SchedulerState,
}

impl DayScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account_id: String,
        schedule: Arc<dyn TradingScheduleProvider>,
        runner: Arc<dyn TradingSessionRunner>,
        clock: Arc<dyn Clock>,
        settings: TradingSettings,
        strategies: StrategyRegistry,
        min_cash_reserve: Decimal,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            account_id,
            schedule,
            runner,
            clock,
            settings,
            strategies,
            min_cash_reserve,
            shutdown,
            state: SchedulerState::default(),
        }
    }

    /// Run until shutdown. Returns the final bookkeeping.
    pub async fn run(mut self) -> SchedulerState {
        info!(account_id = %self.account_id, "Start every day trading");

        loop {
            let outcome = self.run_iteration().await;
            self.state.record(&outcome);
            if outcome == IterationOutcome::Interrupted {
                break;
            }

            let next = next_morning(self.clock.now());
            info!(%next, "Sleep to next morning");
            if !self.sleep_until(next).await {
                break;
            }
        }

        info!(iterations = self.state.iterations, "Day scheduler stopped");
        self.state
    }

    /// One day: calendar check, wait for the delayed open, session.
    pub async fn run_iteration(&mut self) -> IterationOutcome {
        info!("Check trading schedule on today");

        let schedule = match self.schedule.todays_schedule().await {
            Ok(schedule) => schedule,
            Err(e) => {
                error!(error = %e, "Start trading today error");
                return IterationOutcome::Failed(e.to_string());
            }
        };

        if !schedule.is_trading_day {
            info!("Today is not trading day");
            return IterationOutcome::NotTradingDay;
        }
        if self.clock.now() >= schedule.end {
            info!(end = %schedule.end, "Trading session is already over today");
            return IterationOutcome::SessionOver;
        }

        let start = schedule.start + self.settings.delay_start_after_open;
        info!(%start, end = %schedule.end, "Today is trading day");
        if !self.sleep_until(start).await {
            return IterationOutcome::Interrupted;
        }

        info!("Trading day has been started");
        self.run_session(schedule.end).await
    }

    /// Run the session on its own task so a panic inside it stays contained.
    async fn run_session(&mut self, session_end: DateTime<Utc>) -> IterationOutcome {
        let runner = Arc::clone(&self.runner);
        let account_id = self.account_id.clone();
        let settings = self.settings.clone();
        let strategies = self.strategies.clone();
        let min_cash_reserve = self.min_cash_reserve;

        let mut session = tokio::spawn(async move {
            runner
                .run_day(&account_id, &settings, &strategies, session_end, min_cash_reserve)
                .await
        });

        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            joined = &mut session => match joined {
                Ok(Ok(())) => {
                    info!("Trading day has been completed");
                    IterationOutcome::Completed
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Trading day failed. Open positions must be closed manually");
                    IterationOutcome::Failed(e.to_string())
                }
                Err(e) => {
                    error!(error = %e, "Trading session task died");
                    IterationOutcome::Failed(format!("session task: {e}"))
                }
            },
            _ = shutdown.triggered() => {
                warn!("Shutdown during trading session, aborting it");
                session.abort();
                IterationOutcome::Interrupted
            }
        }
    }

    /// Sleep until `deadline`; a deadline in the past returns at once.
    /// Returns `false` when shutdown cut the sleep short.
    async fn sleep_until(&mut self, deadline: DateTime<Utc>) -> bool {
        if self.shutdown.is_triggered() {
            return false;
        }
        let now = self.clock.now();
        let wait = (deadline - now).to_std().unwrap_or_default();
        debug!(from = %now, to = %deadline, ?wait, "Sleep");

        tokio::select! {
            _ = tokio::time::sleep(wait) => true,
            _ = self.shutdown.triggered() => false,
        }
    }
}

/// 06:00 UTC of the calendar day after `now`.
pub fn next_morning(now: DateTime<Utc>) -> DateTime<Utc> {
    let morning = NaiveTime::from_hms_opt(6, 0, 0).expect("06:00:00 is a valid time");
    let tomorrow = now.date_naive() + Days::new(1);
    Utc.from_utc_datetime(&tomorrow.and_time(morning))
}
