use std::collections::HashMap;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Top-level strategy config file (TOML).
///
/// Example `config/strategies.toml`:
/// ```toml
/// [test_strategy]
/// type = "change_and_volume"
/// name = "BTC change+volume"
/// instrument = "BTCUSDT"
/// ticker = "BTC"
/// batch_size = 5
///
/// [test_strategy.params]
/// price_change_pct = 0.4
/// volume_multiplier = 2.0
///
/// [[strategy]]
/// type = "rsi"
/// name = "ETH RSI 14"
/// instrument = "ETHUSDT"
/// ticker = "ETH"
/// short_enabled = true
/// batch_size = 15
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    /// Strategy replayed in history mode.
    #[serde(default)]
    pub test_strategy: Option<StrategyConfig>,
    /// Strategies traded in trade mode, one instrument each.
    #[serde(rename = "strategy", default)]
    pub strategies: Vec<StrategyConfig>,
}

/// The closed set of strategy implementations. An unknown `type` in the
/// file fails when the file is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    ChangeAndVolume,
    Rsi,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    #[serde(rename = "type")]
    pub kind: StrategyKind,
    /// Human-readable name shown in logs and chat messages.
    pub name: String,
    /// Exchange instrument id, e.g. "BTCUSDT".
    pub instrument: String,
    pub ticker: String,
    #[serde(default = "default_lots")]
    pub max_lots_per_order: u32,
    #[serde(default)]
    pub short_enabled: bool,
    /// Candles handed to the strategy per analysis call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Strategy-specific parameters.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

fn default_lots() -> u32 {
    1
}

fn default_batch_size() -> usize {
    1
}

impl StrategyFileConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read strategy config at '{path}': {e}"))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("Failed to parse strategy config at '{path}': {e}")))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }
}

impl StrategyConfig {
    pub fn param_decimal(&self, key: &str, default: Decimal) -> Decimal {
        match self.params.get(key) {
            Some(toml::Value::Float(v)) => Decimal::from_f64(*v).unwrap_or(default),
            Some(toml::Value::Integer(v)) => Decimal::from(*v),
            Some(toml::Value::String(v)) => v.parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn param_usize(&self, key: &str, default: usize) -> usize {
        self.params
            .get(key)
            .and_then(|v| v.as_integer())
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(default)
    }
}
