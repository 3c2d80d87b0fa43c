use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use common::{Error, Result};

use crate::config::{StrategyConfig, StrategyKind};
use crate::{ChangeAndVolumeStrategy, RsiStrategy, Strategy};

/// Holds the strategy instances traded today, one instrument each.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    /// Build every configured strategy, failing on the first invalid entry.
    pub fn from_configs(configs: &[StrategyConfig]) -> Result<Self> {
        let mut strategies = Vec::with_capacity(configs.len());
        for cfg in configs {
            let strategy = build_strategy(cfg)?;
            info!(
                name = %strategy.name(),
                instrument = %strategy.instrument(),
                batch = strategy.batch_size(),
                "Registered strategy"
            );
            strategies.push(strategy);
        }
        Ok(Self { strategies })
    }

    pub fn from_strategies(strategies: Vec<Arc<dyn Strategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &[Arc<dyn Strategy>] {
        &self.strategies
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Distinct instruments in registration order.
    pub fn instruments(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.strategies
            .iter()
            .filter(|s| seen.insert(s.instrument().to_string()))
            .map(|s| s.instrument().to_string())
            .collect()
    }
}

// ─── Strategy builder ─────────────────────────────────────────────────────────

/// Resolve a configured strategy kind to its implementation.
pub fn build_strategy(cfg: &StrategyConfig) -> Result<Arc<dyn Strategy>> {
    if cfg.batch_size == 0 {
        return Err(Error::Config(format!(
            "strategy '{}': batch_size must be at least 1",
            cfg.name
        )));
    }

    match cfg.kind {
        StrategyKind::ChangeAndVolume => Ok(Arc::new(ChangeAndVolumeStrategy::new(cfg.clone()))),
        StrategyKind::Rsi => {
            let strategy = RsiStrategy::new(cfg.clone());
            let indicator = strategy.indicator();
            if indicator.period < 2 {
                return Err(Error::Config(format!(
                    "strategy '{}': RSI period must be >= 2",
                    cfg.name
                )));
            }
            if cfg.batch_size < indicator.required_len() {
                return Err(Error::Config(format!(
                    "strategy '{}': RSI period {} needs batch_size >= {}",
                    cfg.name,
                    indicator.period,
                    indicator.required_len()
                )));
            }
            Ok(Arc::new(strategy))
        }
    }
}
