use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveTime, Weekday};
use rust_decimal::Decimal;

use crate::{Error, Result, WorkingMode};

/// All configuration loaded from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub working_mode: WorkingMode,

    // Exchange credentials
    pub binance_api_key: String,
    pub binance_secret: String,
    /// Asset cash balances are measured in, e.g. "USDT".
    pub quote_asset: String,

    // Strategy config file path
    pub strategy_config_path: String,
    /// Lookback window for history mode.
    pub history_days: i64,

    pub blog: BlogSettings,
    pub account: AccountSettings,
    pub trading: TradingSettings,
    pub calendar: CalendarSettings,
}

/// Telegram reporting.
#[derive(Debug, Clone, Default)]
pub struct BlogSettings {
    pub enabled: bool,
    pub telegram_token: String,
    pub chat_id: i64,
}

/// Requirements an account must meet before the robot trades on it.
#[derive(Debug, Clone, Default)]
pub struct AccountSettings {
    pub min_liquid_portfolio: Decimal,
    /// Cash that must stay on the account; below it the day is skipped.
    pub min_cash_reserve: Decimal,
}

/// Timing of the trading day relative to the exchange session.
#[derive(Debug, Clone)]
pub struct TradingSettings {
    /// Grace period after the nominal open so the opening auction settles.
    pub delay_start_after_open: Duration,
    pub stop_trade_before_close: Duration,
    pub stop_signals_before_close: Duration,
}

impl Default for TradingSettings {
    fn default() -> Self {
        Self {
            delay_start_after_open: Duration::zero(),
            stop_trade_before_close: Duration::zero(),
            stop_signals_before_close: Duration::zero(),
        }
    }
}

/// Exchange calendar used to answer "is today a trading day".
#[derive(Debug, Clone)]
pub struct CalendarSettings {
    /// Session open, UTC.
    pub open: NaiveTime,
    /// Session close, UTC.
    pub close: NaiveTime,
    pub weekdays: Vec<Weekday>,
    pub holidays: Vec<NaiveDate>,
}

impl Config {
    /// Load configuration from the process environment.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            get(key).ok_or_else(|| {
                Error::Config(format!(
                    "Required environment variable '{key}' is not set. Check your .env file."
                ))
            })
        };

        let working_mode = match required("WORKING_MODE")?.to_lowercase().as_str() {
            "history" => WorkingMode::History,
            "trade" => WorkingMode::Trade,
            other => {
                return Err(Error::Config(format!(
                    "WORKING_MODE must be 'history' or 'trade', got: '{other}'"
                )))
            }
        };

        let (binance_api_key, binance_secret) = match working_mode {
            WorkingMode::Trade => (required("BINANCE_API_KEY")?, required("BINANCE_SECRET")?),
            WorkingMode::History => (
                get("BINANCE_API_KEY").unwrap_or_default(),
                get("BINANCE_SECRET").unwrap_or_default(),
            ),
        };

        let blog_enabled = parse_or(&get, "BLOG_ENABLED", false)?;
        let blog = if blog_enabled {
            BlogSettings {
                enabled: true,
                telegram_token: required("TELEGRAM_TOKEN")?,
                chat_id: parse_required(&get, "TELEGRAM_CHAT_ID")?,
            }
        } else {
            BlogSettings::default()
        };

        let account = AccountSettings {
            min_liquid_portfolio: parse_or(&get, "MIN_LIQUID_PORTFOLIO", Decimal::ZERO)?,
            min_cash_reserve: parse_or(&get, "MIN_CASH_RESERVE", Decimal::ZERO)?,
        };

        let trading = TradingSettings {
            delay_start_after_open: parse_duration(
                &get,
                "DELAY_START_AFTER_OPEN_SECONDS",
                Duration::try_seconds,
            )?,
            stop_trade_before_close: parse_duration(
                &get,
                "STOP_TRADE_BEFORE_CLOSE_SECONDS",
                Duration::try_seconds,
            )?,
            stop_signals_before_close: parse_duration(
                &get,
                "STOP_SIGNALS_BEFORE_CLOSE_MINUTES",
                Duration::try_minutes,
            )?,
        };

        let calendar = CalendarSettings {
            open: parse_time(&get, "EXCHANGE_OPEN_UTC", "07:00")?,
            close: parse_time(&get, "EXCHANGE_CLOSE_UTC", "15:40")?,
            weekdays: parse_list(
                &get("TRADING_WEEKDAYS").unwrap_or_else(|| "mon,tue,wed,thu,fri".to_string()),
                "TRADING_WEEKDAYS",
            )?,
            holidays: parse_list(&get("EXCHANGE_HOLIDAYS").unwrap_or_default(), "EXCHANGE_HOLIDAYS")?,
        };
        if calendar.open >= calendar.close {
            return Err(Error::Config(format!(
                "EXCHANGE_OPEN_UTC ({}) must be before EXCHANGE_CLOSE_UTC ({})",
                calendar.open, calendar.close
            )));
        }

        let history_days: i64 = parse_or(&get, "HISTORY_DAYS", 7)?;
        if Duration::try_days(history_days).is_none() {
            return Err(Error::Config(format!("HISTORY_DAYS out of range: {history_days}")));
        }

        Ok(Config {
            working_mode,
            binance_api_key,
            binance_secret,
            quote_asset: get("QUOTE_ASSET").unwrap_or_else(|| "USDT".to_string()),
            strategy_config_path: get("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
            history_days,
            blog,
            account,
            trading,
            calendar,
        })
    }
}

fn parse_required<F, T>(get: &F, key: &str) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get(key).ok_or_else(|| {
        Error::Config(format!(
            "Required environment variable '{key}' is not set. Check your .env file."
        ))
    })?;
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("{key}: cannot parse '{raw}': {e}")))
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(_) => parse_required(get, key),
        None => Ok(default),
    }
}

/// Whole units of `key` turned into a duration by `unit`. Zero when unset.
fn parse_duration<F>(get: &F, key: &str, unit: fn(i64) -> Option<Duration>) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let amount: i64 = parse_or(get, key, 0)?;
    unit(amount).ok_or_else(|| Error::Config(format!("{key} out of range: {amount}")))
}

fn parse_time<F>(get: &F, key: &str, default: &str) -> Result<NaiveTime>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = get(key).unwrap_or_else(|| default.to_string());
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|e| Error::Config(format!("{key}: expected HH:MM, got '{raw}': {e}")))
}

/// Comma-separated list; blank entries are skipped.
fn parse_list<T>(raw: &str, key: &str) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: std::fmt::Debug,
{
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<T>()
                .map_err(|e| Error::Config(format!("{key}: invalid entry '{s}': {e:?}")))
        })
        .collect()
}
