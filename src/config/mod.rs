// Engine settings
//
// Layered with the `config` crate: built-in defaults, then an optional TOML file, then
// ENGINE__* environment variables.

use crate::error::EngineError;
use crate::indicators::SLOW_PERIOD;
use crate::models::Timeframe;
use crate::series::DEFAULT_CAPACITY;
use crate::Result;
use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Default settings file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "engine.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Capacity of every bar, line and crossing ring
    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,
    /// Inbound envelope queue depth
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_feedback_max_checks")]
    pub feedback_max_checks: u32,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default = "default_exchanges")]
    pub exchanges: Vec<ExchangeSettings>,
    #[serde(default)]
    pub mavg: Option<MavgSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeSettings {
    pub name: String,
    pub symbols: Vec<String>,
    pub contract_types: Vec<String>,
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<Timeframe>,
    /// Contract face value in quote currency, per symbol
    #[serde(default)]
    pub face_values: HashMap<String, f64>,
}

/// Policy of the moving-average sample strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MavgSettings {
    pub exchange: String,
    pub symbols: Vec<String>,
    pub contract_types: Vec<String>,
    pub signal_timeframe: Timeframe,
    /// Bars looked back when measuring slopes
    pub slope_bars: u32,
    pub fast_slope: f64,
    pub slow_slope: f64,
    pub diff_slope: f64,
    /// Minimum |fast - slow| for a crossing to count
    pub min_diff: f64,
    pub stop_loss_rate: f64,
    pub take_profit_rate: f64,
    /// Coin volume bounds of one opening order
    pub min_vol: f64,
    pub max_vol: f64,
    /// Share of the balance committed per opening order
    pub step_rate: f64,
    pub market_orders: bool,
    pub lever: i32,
    pub open_limit: u32,
    pub loss_limit_step: u32,
    /// Seconds of tick time spent in shutdown before trading again
    pub cooldown_secs: i64,
}

impl Default for MavgSettings {
    fn default() -> Self {
        Self {
            exchange: "okex".to_string(),
            symbols: vec!["ltc_usd".to_string(), "etc_usd".to_string()],
            contract_types: vec!["this_week".to_string()],
            signal_timeframe: Timeframe::Min5,
            slope_bars: 3,
            fast_slope: 0.1,
            slow_slope: 0.04,
            diff_slope: 0.03,
            min_diff: 1.2,
            stop_loss_rate: -0.1,
            take_profit_rate: 0.15,
            min_vol: 0.1,
            max_vol: 0.5,
            step_rate: 0.01,
            market_orders: true,
            lever: 10,
            open_limit: 5,
            loss_limit_step: 5,
            cooldown_secs: 20 * 60,
        }
    }
}

fn default_ring_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_queue_capacity() -> usize {
    4096
}

fn default_feedback_max_checks() -> u32 {
    crate::execution::DEFAULT_MAX_CHECKS
}

fn default_log_filter() -> String {
    "decision_engine=info".to_string()
}

fn default_timeframes() -> Vec<Timeframe> {
    vec![Timeframe::Min1, Timeframe::Min5, Timeframe::Min15]
}

fn default_exchanges() -> Vec<ExchangeSettings> {
    let symbols = ["btc_usd", "ltc_usd", "eth_usd", "etc_usd", "bch_usd"];
    let face_values = symbols
        .iter()
        .map(|s| (s.to_string(), if *s == "btc_usd" { 100.0 } else { 10.0 }))
        .collect();

    vec![ExchangeSettings {
        name: "okex".to_string(),
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        contract_types: vec![
            "this_week".to_string(),
            "next_week".to_string(),
            "quarter".to_string(),
        ],
        timeframes: default_timeframes(),
        face_values,
    }]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ring_capacity: default_ring_capacity(),
            queue_capacity: default_queue_capacity(),
            feedback_max_checks: default_feedback_max_checks(),
            log_filter: default_log_filter(),
            exchanges: default_exchanges(),
            mavg: None,
        }
    }
}

impl Settings {
    /// Load settings from `path` (or `engine.toml` if present) and the environment
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("ENGINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from TOML text, without environment overrides
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn exchange(&self, name: &str) -> Option<&ExchangeSettings> {
        self.exchanges.iter().find(|e| e.name == name)
    }

    /// Every timeframe configured on any exchange, deduplicated
    pub fn timeframes(&self) -> Vec<Timeframe> {
        let mut out: Vec<Timeframe> = Vec::new();
        for tf in self.exchanges.iter().flat_map(|e| e.timeframes.iter()) {
            if !out.contains(tf) {
                out.push(*tf);
            }
        }
        out
    }

    pub fn validate(&self) -> Result<()> {
        if self.ring_capacity < SLOW_PERIOD {
            return Err(invalid(format!(
                "ring_capacity must be at least {} so the slow line can form",
                SLOW_PERIOD
            )));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("queue_capacity must be positive"));
        }
        if self.feedback_max_checks == 0 {
            return Err(invalid("feedback_max_checks must be positive"));
        }
        if self.exchanges.is_empty() {
            return Err(invalid("at least one exchange must be configured"));
        }

        let mut names = HashSet::new();
        for exchange in &self.exchanges {
            if exchange.name.is_empty() {
                return Err(invalid("exchange name must not be empty"));
            }
            if !names.insert(exchange.name.as_str()) {
                return Err(invalid(format!("exchange '{}' configured twice", exchange.name)));
            }
            if exchange.timeframes.is_empty() {
                return Err(invalid(format!("exchange '{}' has no timeframes", exchange.name)));
            }
            for symbol in &exchange.symbols {
                match exchange.face_values.get(symbol) {
                    Some(face) if *face > 0.0 => {}
                    _ => {
                        return Err(invalid(format!(
                            "exchange '{}' symbol '{}' needs a positive face value",
                            exchange.name, symbol
                        )))
                    }
                }
            }
        }

        if let Some(mavg) = &self.mavg {
            let Some(exchange) = self.exchange(&mavg.exchange) else {
                return Err(invalid(format!(
                    "mavg exchange '{}' is not configured",
                    mavg.exchange
                )));
            };
            if !exchange.timeframes.contains(&mavg.signal_timeframe) {
                return Err(invalid(format!(
                    "mavg signal timeframe {} is not aggregated",
                    mavg.signal_timeframe
                )));
            }
            if mavg.min_vol > mavg.max_vol {
                return Err(invalid("mavg min_vol exceeds max_vol"));
            }
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> EngineError {
    EngineError::InvalidConfig(msg.into())
}
