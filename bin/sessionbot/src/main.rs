use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use backtest::HistoryTester;
use common::{Clock, Config, Error, Notifier, Result, SystemClock, WorkingMode};
use engine::{
    find_trading_account, shutdown_channel, BinanceClient, BinanceFeed, DayScheduler,
    ExchangeCalendar, PaperTrader,
};
use strategy::{build_strategy, StrategyFileConfig, StrategyRegistry};
use telegram_blog::Blogger;

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    info!(mode = %cfg.working_mode, "SessionBot starting");

    if let Err(e) = run(cfg).await {
        error!(error = %e, "SessionBot stopped with error");
        std::process::exit(1);
    }
    info!("SessionBot stopped");
}

async fn run(cfg: Config) -> Result<()> {
    let strategy_file = StrategyFileConfig::load(&cfg.strategy_config_path)?;
    let client = Arc::new(BinanceClient::new(
        &cfg.binance_api_key,
        &cfg.binance_secret,
        &cfg.quote_asset,
    )?);
    let blogger = Blogger::new(&cfg.blog);
    info!(enabled = blogger.is_enabled(), chat_id = cfg.blog.chat_id, "Telegram blog");
    let notifier: Arc<dyn Notifier> = Arc::new(blogger);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match cfg.working_mode {
        WorkingMode::History => {
            let test_strategy = strategy_file
                .test_strategy
                .as_ref()
                .ok_or_else(|| Error::Config("test_strategy is not configured".into()))?;
            let strategy = build_strategy(test_strategy)?;

            HistoryTester::new(client, notifier, clock)
                .run(strategy.as_ref(), cfg.history_days)
                .await?;
            Ok(())
        }
        WorkingMode::Trade => {
            client.verify().await?;
            let account_id = find_trading_account(client.as_ref(), &cfg.account).await?;
            let strategies = StrategyRegistry::from_configs(&strategy_file.strategies)?;
            if strategies.is_empty() {
                warn!("No strategies configured for trading");
            }

            let calendar = Arc::new(ExchangeCalendar::new(cfg.calendar.clone(), clock.clone()));
            let trader = Arc::new(PaperTrader::new(
                Arc::new(BinanceFeed),
                client,
                notifier,
                clock.clone(),
            ));

            let (trigger, shutdown) = shutdown_channel();
            let scheduler = DayScheduler::new(
                account_id,
                calendar,
                trader,
                clock,
                cfg.trading.clone(),
                strategies,
                cfg.account.min_cash_reserve,
                shutdown,
            );
            let handle = tokio::spawn(scheduler.run());

            tokio::signal::ctrl_c().await?;
            info!("Shutdown signal received, stopping scheduler");
            trigger.trigger();

            let state = handle
                .await
                .map_err(|e| Error::Session(format!("scheduler task: {e}")))?;
            info!(
                iterations = state.iterations,
                sessions = state.sessions_completed,
                failures = state.failures,
                "Every day trading stopped"
            );
            Ok(())
        }
    }
}
