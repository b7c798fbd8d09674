use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One configured trading-agent deployment, owned by the instance manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingInstance {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub strategy_id: String,
    #[serde(default)]
    pub tokens: Vec<String>,
    pub amount_sol: f64,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    pub active: bool,
    #[serde(default)]
    pub metrics: Option<InstanceMetrics>,
}

/// Create/update request body for an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_strategy")]
    pub strategy_id: String,
    #[serde(default)]
    pub tokens: Vec<String>,
    #[serde(default)]
    pub amount_sol: f64,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
}

fn default_strategy() -> String {
    "default".to_string()
}

impl TradingInstance {
    pub fn from_config(id: String, config: InstanceConfig) -> Self {
        Self {
            id,
            name: config.name,
            description: config.description,
            strategy_id: config.strategy_id,
            tokens: config.tokens,
            amount_sol: config.amount_sol,
            parameters: config.parameters,
            active: false,
            metrics: None,
        }
    }

    /// Replace the configurable fields, keeping id, active flag and metrics.
    pub fn apply_config(&mut self, config: InstanceConfig) {
        self.name = config.name;
        self.description = config.description;
        self.strategy_id = config.strategy_id;
        self.tokens = config.tokens;
        self.amount_sol = config.amount_sol;
        self.parameters = config.parameters;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceMetrics {
    pub total_trades: u64,
    pub successful_trades: u64,
    pub failed_trades: u64,
    pub volume: f64,
    pub last_trade_time: Option<DateTime<Utc>>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

impl InstanceMetrics {
    pub fn record_trade(&mut self, success: bool, volume: f64) {
        self.total_trades += 1;
        if success {
            self.successful_trades += 1;
            self.volume += volume;
        } else {
            self.failed_trades += 1;
        }
        self.last_trade_time = Some(Utc::now());
    }

    /// Merge externally supplied counters: numeric fields add up, the later
    /// trade time wins, extras overwrite by key.
    pub fn merge(&mut self, other: &InstanceMetrics) {
        self.total_trades += other.total_trades;
        self.successful_trades += other.successful_trades;
        self.failed_trades += other.failed_trades;
        self.volume += other.volume;
        self.last_trade_time = match (self.last_trade_time, other.last_trade_time) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        for (key, value) in &other.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_trades == 0 {
            0.0
        } else {
            self.successful_trades as f64 / self.total_trades as f64
        }
    }
}

/// One row of the portfolio CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPosition {
    #[serde(rename = "Mint Address")]
    pub mint_address: String,
    pub name: String,
    #[serde(rename = "Amount")]
    pub amount: f64,
    #[serde(rename = "USD Value")]
    pub usd_value: f64,
}

impl PortfolioPosition {
    pub fn empty(mint_address: &str) -> Self {
        Self {
            mint_address: mint_address.to_string(),
            name: String::new(),
            amount: 0.0,
            usd_value: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Active,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub token: String,
    pub direction: TradeDirection,
    pub amount: f64,
    pub start_time: DateTime<Utc>,
    pub status: TradeStatus,
    pub end_time: Option<DateTime<Utc>>,
}

impl TradeRecord {
    pub fn new(token: &str, direction: TradeDirection, amount: f64) -> Self {
        Self {
            token: token.to_string(),
            direction,
            amount,
            start_time: Utc::now(),
            status: TradeStatus::Active,
            end_time: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_keeps_identity_and_metrics() {
        let config = InstanceConfig {
            name: "alpha".to_string(),
            description: String::new(),
            strategy_id: "default".to_string(),
            tokens: vec![],
            amount_sol: 1.0,
            parameters: HashMap::new(),
        };
        let mut instance = TradingInstance::from_config("instance_1".to_string(), config.clone());
        instance.active = true;
        instance.metrics = Some(InstanceMetrics::default());

        instance.apply_config(InstanceConfig {
            name: "beta".to_string(),
            amount_sol: 2.0,
            ..config
        });

        assert_eq!(instance.id, "instance_1");
        assert_eq!(instance.name, "beta");
        assert!(instance.active);
        assert!(instance.metrics.is_some());
    }

    #[test]
    fn metrics_merge_adds_counters() {
        let mut metrics = InstanceMetrics::default();
        metrics.record_trade(true, 10.0);

        let mut external = InstanceMetrics {
            total_trades: 2,
            failed_trades: 2,
            ..InstanceMetrics::default()
        };
        external.extra.insert("pnl".to_string(), serde_json::json!(-1.5));

        metrics.merge(&external);
        assert_eq!(metrics.total_trades, 3);
        assert_eq!(metrics.successful_trades, 1);
        assert_eq!(metrics.failed_trades, 2);
        assert_eq!(metrics.volume, 10.0);
        assert!(metrics.last_trade_time.is_some());
        assert_eq!(metrics.extra["pnl"], serde_json::json!(-1.5));
    }

    #[test]
    fn config_defaults_strategy() {
        let config: InstanceConfig = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert_eq!(config.strategy_id, "default");
        assert!(config.tokens.is_empty());
    }
}
