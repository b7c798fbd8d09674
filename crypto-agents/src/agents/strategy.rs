use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use common::config::{ModelSettings, TradingSettings};
use common::{AgentError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Smallest order size an instance may configure.
pub const MIN_ORDER_SIZE: f64 = 0.01;

/// Sizing and pacing knobs of one trading agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TradingParams {
    pub usd_size: f64,
    pub max_order_size: f64,
    pub slippage_bps: u16,
    pub max_position_fraction: f64,
    pub min_confidence: u8,
    pub tx_sleep_secs: u64,
    pub cycle_interval_minutes: u64,
    pub temperature: f32,
}

impl TradingParams {
    pub fn from_settings(trading: &TradingSettings, model: &ModelSettings) -> Self {
        Self {
            usd_size: trading.usd_size,
            max_order_size: trading.max_usd_order_size,
            slippage_bps: trading.slippage_bps,
            max_position_fraction: trading.max_position_fraction,
            min_confidence: trading.min_confidence,
            tx_sleep_secs: trading.tx_sleep_secs,
            cycle_interval_minutes: trading.cycle_interval_minutes,
            temperature: model.temperature,
        }
    }

    /// Overwrite individual fields from a JSON object, e.g. `strategy_params`.
    pub fn with_overrides(&self, overrides: &Value) -> Result<Self> {
        let Value::Object(fields) = overrides else {
            return Err(AgentError::InvalidConfig(
                "strategy_params must be an object".to_string(),
            ));
        };

        let mut merged = serde_json::to_value(self)?;
        if let Value::Object(base) = &mut merged {
            for (key, value) in fields {
                base.insert(key.clone(), value.clone());
            }
        }
        let params: Self = serde_json::from_value(merged)
            .map_err(|e| AgentError::InvalidConfig(format!("invalid strategy_params: {}", e)))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.max_order_size >= MIN_ORDER_SIZE) {
            return Err(AgentError::InvalidConfig(format!(
                "max_order_size must be at least {}, got {}",
                MIN_ORDER_SIZE, self.max_order_size
            )));
        }
        if !(self.usd_size > 0.0) {
            return Err(AgentError::InvalidConfig(format!(
                "usd_size must be positive, got {}",
                self.usd_size
            )));
        }
        if !(0.0..=1.0).contains(&self.max_position_fraction) {
            return Err(AgentError::InvalidConfig(format!(
                "max_position_fraction must be within 0..=1, got {}",
                self.max_position_fraction
            )));
        }
        if self.min_confidence > 100 {
            return Err(AgentError::InvalidConfig(format!(
                "min_confidence must be at most 100, got {}",
                self.min_confidence
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Default,
    Conservative,
    Aggressive,
}

impl FromStr for Strategy {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "default" => Ok(Strategy::Default),
            "conservative" => Ok(Strategy::Conservative),
            "aggressive" => Ok(Strategy::Aggressive),
            other => Err(AgentError::InvalidConfig(format!("Unknown strategy: {}", other))),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Default => "default",
            Strategy::Conservative => "conservative",
            Strategy::Aggressive => "aggressive",
        };
        f.write_str(name)
    }
}

impl Strategy {
    pub fn apply(&self, base: &TradingParams) -> TradingParams {
        let mut params = base.clone();
        match self {
            Strategy::Default => {}
            Strategy::Conservative => {
                params.max_position_fraction = 0.05;
                params.min_confidence = 75;
                params.slippage_bps = 100;
            }
            Strategy::Aggressive => {
                params.max_position_fraction = 0.2;
                params.min_confidence = 55;
                params.slippage_bps = 500;
            }
        }
        params
    }
}

/// Base params, then the strategy preset, then the instance's trade size,
/// then `parameters.strategy_params`.
pub fn resolve_params(
    base: &TradingParams,
    strategy_id: &str,
    amount_sol: f64,
    parameters: &HashMap<String, Value>,
) -> Result<TradingParams> {
    let strategy: Strategy = strategy_id.parse()?;
    let mut params = strategy.apply(base);
    if amount_sol > 0.0 {
        params.max_order_size = amount_sol;
    }
    match parameters.get("strategy_params") {
        Some(overrides) => params.with_overrides(overrides),
        None => {
            params.validate()?;
            Ok(params)
        }
    }
}
