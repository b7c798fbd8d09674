pub mod performance;
pub mod system_monitor;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use performance::{PerformanceMonitor, PerformanceSummary};
pub use system_monitor::SystemMonitor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Error,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Process-wide health snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub cpu_usage: f32,
    pub memory_usage: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_latency_ms: Option<f64>,
    pub active_instances: usize,
    pub total_active_trades: usize,
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceHealth {
    pub instance_id: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_balance: Option<f64>,
    pub active_trades: usize,
    pub last_trade_time: Option<DateTime<Utc>>,
    pub cpu_usage: f32,
    pub memory_usage: f32,
}
