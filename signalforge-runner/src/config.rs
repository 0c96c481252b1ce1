//! TOML application configuration.
//!
//! Every section is optional; missing keys fall back to the
//! grid-search-optimized defaults. Parameter values are validated while
//! parsing, so a loaded `AppConfig` always carries a usable `ParameterSet`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use signalforge_core::components::MarketHours;
use signalforge_core::domain::Instrument;
use signalforge_core::params::{ParamError, ParameterSet};
use signalforge_core::pipeline::{PipelineConfig, VetoOrdering, MAX_COOLDOWN_MINUTES};
use signalforge_core::position_management::{IntrabarPolicy, TrailingRule};
use signalforge_core::sizers::{RiskModel, DEFAULT_ENTRY_BUFFER_PCT, DEFAULT_RISK_PER_TRADE};

use crate::sweep::GridSpec;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(#[from] ParamError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccountConfig {
    pub initial_capital: f64,
    pub risk_per_trade: f64,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            initial_capital: 20_000.0,
            risk_per_trade: DEFAULT_RISK_PER_TRADE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrailingConfig {
    pub arm_at_r: f64,
    pub trigger_r: f64,
    pub lock_fraction: f64,
}

impl Default for TrailingConfig {
    fn default() -> Self {
        let rule = TrailingRule::default();
        Self {
            arm_at_r: rule.arm_at_r(),
            trigger_r: rule.trigger_r(),
            lock_fraction: rule.lock_fraction(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    pub intrabar_policy: IntrabarPolicy,
    pub entry_buffer_pct: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            intrabar_policy: IntrabarPolicy::StopFirst,
            entry_buffer_pct: DEFAULT_ENTRY_BUFFER_PCT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSection {
    pub cooldown_minutes: i64,
    pub veto_ordering: VetoOrdering,
    pub market_hours: MarketHours,
    pub trade_state_path: PathBuf,
}

impl PipelineSection {
    fn validate(&self) -> Result<(), ParamError> {
        if !(0..=MAX_COOLDOWN_MINUTES).contains(&self.cooldown_minutes) {
            return Err(ParamError::OutOfRange {
                field: "cooldown_minutes",
                value: self.cooldown_minutes as f64,
                min: 0.0,
                max: MAX_COOLDOWN_MINUTES as f64,
            });
        }
        Ok(())
    }
}

impl Default for PipelineSection {
    fn default() -> Self {
        let defaults = PipelineConfig::default();
        Self {
            cooldown_minutes: defaults.cooldown_minutes,
            veto_ordering: defaults.veto_ordering,
            market_hours: defaults.market_hours,
            trade_state_path: PathBuf::from("active_trades.json"),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub account: AccountConfig,
    pub parameters: ParameterSet,
    pub trailing: TrailingConfig,
    pub execution: ExecutionConfig,
    pub pipeline: PipelineSection,
    pub instruments: Vec<Instrument>,
    /// Candidate values for `grid-search`.
    pub grid: GridSpec,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            account: AccountConfig::default(),
            parameters: ParameterSet::default(),
            trailing: TrailingConfig::default(),
            execution: ExecutionConfig::default(),
            pipeline: PipelineSection::default(),
            instruments: Instrument::defaults(),
            grid: GridSpec::default(),
        }
    }
}

/// Settings shared by every backtest of a run or grid search.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub risk_per_trade: f64,
    pub entry_buffer_pct: f64,
    pub trailing: TrailingRule,
    pub intrabar_policy: IntrabarPolicy,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 20_000.0,
            risk_per_trade: DEFAULT_RISK_PER_TRADE,
            entry_buffer_pct: DEFAULT_ENTRY_BUFFER_PCT,
            trailing: TrailingRule::default(),
            intrabar_policy: IntrabarPolicy::StopFirst,
        }
    }
}

impl BacktestConfig {
    /// Risk model for one parameter set under these account settings.
    pub fn risk_model(&self, params: &ParameterSet) -> Result<RiskModel, ParamError> {
        RiskModel::new(self.risk_per_trade, self.entry_buffer_pct, params)
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        // Surface account, trailing and cooldown errors at load time.
        config.backtest_config()?;
        config.pipeline.validate()?;
        Ok(config)
    }

    pub fn trailing_rule(&self) -> Result<TrailingRule, ParamError> {
        TrailingRule::new(
            self.trailing.arm_at_r,
            self.trailing.trigger_r,
            self.trailing.lock_fraction,
        )
    }

    pub fn backtest_config(&self) -> Result<BacktestConfig, ConfigError> {
        let config = BacktestConfig {
            initial_capital: self.account.initial_capital,
            risk_per_trade: self.account.risk_per_trade,
            entry_buffer_pct: self.execution.entry_buffer_pct,
            trailing: self.trailing_rule()?,
            intrabar_policy: self.execution.intrabar_policy,
        };
        if !(config.initial_capital.is_finite() && config.initial_capital > 0.0) {
            return Err(ParamError::NotPositive {
                field: "initial_capital",
                value: config.initial_capital,
            }
            .into());
        }
        config.risk_model(&self.parameters)?;
        Ok(config)
    }

    pub fn risk_model(&self) -> Result<RiskModel, ConfigError> {
        Ok(self.backtest_config()?.risk_model(&self.parameters)?)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            cooldown_minutes: self.pipeline.cooldown_minutes,
            veto_ordering: self.pipeline.veto_ordering,
            market_hours: self.pipeline.market_hours,
        }
    }
}
