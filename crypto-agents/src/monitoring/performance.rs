use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::SystemHealth;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TradeSample {
    token: String,
    success: bool,
    at: DateTime<Utc>,
}

#[derive(Default)]
struct PerformanceData {
    health: VecDeque<SystemHealth>,
    intervals: HashMap<String, VecDeque<u64>>,
    trades: VecDeque<TradeSample>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub health_samples: usize,
    pub avg_cpu_usage: f64,
    pub avg_memory_usage: f64,
    pub avg_rpc_latency_ms: Option<f64>,
    /// Mean seconds between trades, per token.
    pub avg_trading_interval_secs: HashMap<String, f64>,
    pub total_trades: usize,
    pub successful_trades: usize,
    pub success_rate: f64,
}

/// Bounded in-memory history of health samples, trade intervals and outcomes.
pub struct PerformanceMonitor {
    data: Mutex<PerformanceData>,
    limit: usize,
}

impl PerformanceMonitor {
    pub fn new(limit: usize) -> Self {
        Self {
            data: Mutex::new(PerformanceData::default()),
            limit: limit.max(1),
        }
    }

    pub fn log_system_health(&self, health: &SystemHealth) {
        let mut data = self.data.lock();
        data.health.push_back(health.clone());
        while data.health.len() > self.limit {
            data.health.pop_front();
        }
    }

    pub fn log_trading_interval(&self, token: &str, interval_secs: u64) {
        debug!("Trading interval for {}: {}s", token, interval_secs);
        let mut data = self.data.lock();
        let limit = self.limit;
        let entries = data.intervals.entry(token.to_string()).or_default();
        entries.push_back(interval_secs);
        while entries.len() > limit {
            entries.pop_front();
        }
    }

    pub fn log_trade(&self, token: &str, success: bool) {
        let mut data = self.data.lock();
        data.trades.push_back(TradeSample {
            token: token.to_string(),
            success,
            at: Utc::now(),
        });
        while data.trades.len() > self.limit {
            data.trades.pop_front();
        }
    }

    pub fn get_summary(&self) -> PerformanceSummary {
        let data = self.data.lock();

        let samples = data.health.len();
        let mean = |values: Vec<f64>| -> Option<f64> {
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };

        let avg_cpu_usage = mean(data.health.iter().map(|h| h.cpu_usage as f64).collect()).unwrap_or(0.0);
        let avg_memory_usage =
            mean(data.health.iter().map(|h| h.memory_usage as f64).collect()).unwrap_or(0.0);
        let avg_rpc_latency_ms = mean(data.health.iter().filter_map(|h| h.rpc_latency_ms).collect());

        let avg_trading_interval_secs = data
            .intervals
            .iter()
            .filter_map(|(token, values)| {
                mean(values.iter().map(|v| *v as f64).collect()).map(|m| (token.clone(), m))
            })
            .collect();

        let total_trades = data.trades.len();
        let successful_trades = data.trades.iter().filter(|t| t.success).count();
        let success_rate = if total_trades == 0 {
            0.0
        } else {
            successful_trades as f64 / total_trades as f64
        };

        PerformanceSummary {
            health_samples: samples,
            avg_cpu_usage,
            avg_memory_usage,
            avg_rpc_latency_ms,
            avg_trading_interval_secs,
            total_trades,
            successful_trades,
            success_rate,
        }
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::HealthStatus;

    fn health(cpu: f32, latency: Option<f64>) -> SystemHealth {
        SystemHealth {
            cpu_usage: cpu,
            memory_usage: 50.0,
            rpc_latency_ms: latency,
            active_instances: 0,
            total_active_trades: 0,
            status: HealthStatus::Healthy,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn empty_summary_is_zeroed() {
        let summary = PerformanceMonitor::default().get_summary();
        assert_eq!(summary.health_samples, 0);
        assert_eq!(summary.success_rate, 0.0);
        assert!(summary.avg_rpc_latency_ms.is_none());
    }

    #[test]
    fn averages_and_bounds_history() {
        let monitor = PerformanceMonitor::new(2);
        monitor.log_system_health(&health(10.0, Some(100.0)));
        monitor.log_system_health(&health(20.0, None));
        monitor.log_system_health(&health(40.0, Some(300.0)));

        monitor.log_trading_interval("BONK", 60);
        monitor.log_trading_interval("BONK", 120);
        monitor.log_trade("BONK", true);
        monitor.log_trade("BONK", false);

        let summary = monitor.get_summary();
        assert_eq!(summary.health_samples, 2);
        assert!((summary.avg_cpu_usage - 30.0).abs() < 1e-9);
        assert_eq!(summary.avg_rpc_latency_ms, Some(300.0));
        assert_eq!(summary.avg_trading_interval_secs["BONK"], 90.0);
        assert_eq!(summary.total_trades, 2);
        assert_eq!(summary.success_rate, 0.5);
    }
}
