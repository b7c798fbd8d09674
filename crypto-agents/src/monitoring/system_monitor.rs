use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::config::MonitorSettings;
use parking_lot::Mutex;
use sysinfo::System;
use tracing::{error, warn};
use trader_solana::ChainClient;

use super::{HealthStatus, InstanceHealth, PerformanceMonitor, SystemHealth};
use crate::models::{TradeRecord, TradeStatus};

#[derive(Debug, Default, Clone)]
struct InstanceActivity {
    active: bool,
    last_trade_time: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct MonitorState {
    instances: HashMap<String, InstanceActivity>,
    active_trades: HashMap<String, Vec<TradeRecord>>,
    last_check: Option<DateTime<Utc>>,
}

/// Tracks host resources, RPC reachability and in-flight trades per instance.
pub struct SystemMonitor {
    chain: Option<Arc<dyn ChainClient>>,
    performance: Arc<PerformanceMonitor>,
    wallet: Option<String>,
    thresholds: MonitorSettings,
    system: Mutex<System>,
    state: Mutex<MonitorState>,
}

impl SystemMonitor {
    pub fn new(
        chain: Option<Arc<dyn ChainClient>>,
        performance: Arc<PerformanceMonitor>,
        wallet: Option<String>,
        thresholds: MonitorSettings,
    ) -> Self {
        // CPU usage is a delta between two refreshes; take the first one now.
        let mut system = System::new();
        system.refresh_cpu();
        Self {
            chain,
            performance,
            wallet,
            thresholds,
            system: Mutex::new(system),
            state: Mutex::new(MonitorState::default()),
        }
    }

    pub fn performance(&self) -> &Arc<PerformanceMonitor> {
        &self.performance
    }

    pub fn register_instance(&self, instance_id: &str) {
        self.state
            .lock()
            .instances
            .entry(instance_id.to_string())
            .or_default();
    }

    pub fn set_instance_active(&self, instance_id: &str, active: bool) {
        self.state
            .lock()
            .instances
            .entry(instance_id.to_string())
            .or_default()
            .active = active;
    }

    pub fn remove_instance(&self, instance_id: &str) {
        let mut state = self.state.lock();
        state.instances.remove(instance_id);
        state.active_trades.remove(instance_id);
    }

    fn sample_resources(&self) -> (f32, f32) {
        let mut system = self.system.lock();
        system.refresh_cpu();
        system.refresh_memory();
        let cpu = system.global_cpu_info().cpu_usage();
        let total = system.total_memory();
        let memory = if total == 0 {
            0.0
        } else {
            (system.used_memory() as f64 / total as f64 * 100.0) as f32
        };
        (cpu, memory)
    }

    pub async fn check_system_health(&self) -> SystemHealth {
        let (cpu_usage, memory_usage) = self.sample_resources();

        let rpc_latency_ms = match &self.chain {
            Some(chain) => match chain.ping().await {
                Ok(latency) => Some(latency.as_secs_f64() * 1000.0),
                Err(e) => {
                    warn!("RPC ping failed: {}", e);
                    None
                }
            },
            None => None,
        };

        let (active_instances, total_active_trades) = {
            let mut state = self.state.lock();
            state.last_check = Some(Utc::now());
            (
                state.instances.values().filter(|i| i.active).count(),
                state.active_trades.values().map(|t| t.len()).sum(),
            )
        };

        let rpc_degraded = match (&self.chain, rpc_latency_ms) {
            (Some(_), None) => true,
            (_, Some(ms)) => ms > self.thresholds.latency_degraded_ms,
            (None, None) => false,
        };
        let status = if cpu_usage > self.thresholds.cpu_degraded_pct
            || memory_usage > self.thresholds.memory_degraded_pct
            || rpc_degraded
        {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let health = SystemHealth {
            cpu_usage,
            memory_usage,
            rpc_latency_ms,
            active_instances,
            total_active_trades,
            status,
            timestamp: Utc::now(),
        };
        self.performance.log_system_health(&health);
        health
    }

    pub async fn check_instance_health(&self, instance_id: &str) -> InstanceHealth {
        let (cpu_usage, memory_usage) = self.sample_resources();
        let (active_trades, last_trade_time) = {
            let state = self.state.lock();
            (
                state.active_trades.get(instance_id).map(|t| t.len()).unwrap_or(0),
                state.instances.get(instance_id).and_then(|i| i.last_trade_time),
            )
        };

        let mut health = InstanceHealth {
            instance_id: instance_id.to_string(),
            status: HealthStatus::Healthy,
            message: None,
            wallet_balance: None,
            active_trades,
            last_trade_time,
            cpu_usage,
            memory_usage,
        };

        let Some(wallet) = self.wallet.as_deref() else {
            health.status = HealthStatus::Error;
            health.message = Some("Wallet address not set".to_string());
            return health;
        };

        match &self.chain {
            Some(chain) => match chain.get_wallet_balance(wallet).await {
                Ok(balance) => health.wallet_balance = Some(balance),
                Err(e) => {
                    error!("Instance health check failed for {}: {}", instance_id, e);
                    health.status = HealthStatus::Unhealthy;
                    health.message = Some(e.to_string());
                }
            },
            None => {
                health.status = HealthStatus::Degraded;
                health.message = Some("No chain client configured".to_string());
            }
        }
        health
    }

    /// Record the time since `last_trade_time` and stamp the instance's last trade.
    pub fn monitor_trading_interval(&self, instance_id: &str, token: &str, last_trade_time: DateTime<Utc>) {
        let now = Utc::now();
        let interval = (now - last_trade_time).num_seconds().max(0) as u64;
        self.performance.log_trading_interval(token, interval);

        let mut state = self.state.lock();
        if let Some(activity) = state.instances.get_mut(instance_id) {
            activity.last_trade_time = Some(now);
        }
        state.last_check = Some(now);
    }

    pub fn track_trade(&self, instance_id: &str, trade: TradeRecord) {
        self.state
            .lock()
            .active_trades
            .entry(instance_id.to_string())
            .or_default()
            .push(trade);
    }

    /// Mark the first active trade for `token` finished, then drop every
    /// non-active record of the instance. Returns whether a trade matched.
    pub fn complete_trade(&self, instance_id: &str, token: &str, success: bool) -> bool {
        let matched = {
            let mut state = self.state.lock();
            let Some(trades) = state.active_trades.get_mut(instance_id) else {
                return false;
            };

            let matched = match trades
                .iter_mut()
                .find(|t| t.token == token && t.status == TradeStatus::Active)
            {
                Some(trade) => {
                    trade.status = if success {
                        TradeStatus::Completed
                    } else {
                        TradeStatus::Failed
                    };
                    trade.end_time = Some(Utc::now());
                    true
                }
                None => false,
            };
            trades.retain(|t| t.status == TradeStatus::Active);
            matched
        };

        if matched {
            self.performance.log_trade(token, success);
        }
        matched
    }

    pub fn active_trades(&self, instance_id: &str) -> Vec<TradeRecord> {
        self.state
            .lock()
            .active_trades
            .get(instance_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_check
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeDirection;
    use async_trait::async_trait;
    use std::time::Duration;
    use trader_solana::{TokenBalance, TraderError};

    struct FakeChain {
        reachable: bool,
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn get_token_balance(&self, _token: &str, _wallet: &str) -> trader_solana::Result<TokenBalance> {
            Ok(TokenBalance::zero())
        }

        async fn get_wallet_balance(&self, _wallet: &str) -> trader_solana::Result<f64> {
            if self.reachable {
                Ok(2.5)
            } else {
                Err(TraderError::InvalidResponse("down".to_string()))
            }
        }

        async fn ping(&self) -> trader_solana::Result<Duration> {
            if self.reachable {
                Ok(Duration::from_millis(12))
            } else {
                Err(TraderError::InvalidResponse("down".to_string()))
            }
        }
    }

    fn monitor(reachable: bool, wallet: Option<&str>) -> SystemMonitor {
        SystemMonitor::new(
            Some(Arc::new(FakeChain { reachable })),
            Arc::new(PerformanceMonitor::default()),
            wallet.map(|w| w.to_string()),
            MonitorSettings {
                cpu_degraded_pct: 101.0,
                memory_degraded_pct: 101.0,
                ..MonitorSettings::default()
            },
        )
    }

    #[test]
    fn cpu_sampling_is_primed_on_creation() {
        let monitor = monitor(true, None);
        assert!(!monitor.system.lock().cpus().is_empty());

        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        let (cpu, memory) = monitor.sample_resources();
        assert!((0.0..=100.0).contains(&cpu));
        assert!((0.0..=100.0).contains(&memory));
    }

    #[tokio::test]
    async fn system_health_counts_instances_and_trades() {
        let monitor = monitor(true, None);
        monitor.register_instance("instance_1");
        monitor.set_instance_active("instance_1", true);
        monitor.register_instance("instance_2");
        monitor.track_trade("instance_1", TradeRecord::new("BONK", TradeDirection::Buy, 1.0));

        let health = monitor.check_system_health().await;
        assert_eq!(health.active_instances, 1);
        assert_eq!(health.total_active_trades, 1);
        assert!((health.rpc_latency_ms.unwrap() - 12.0).abs() < 1e-6);
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(monitor.performance().get_summary().health_samples, 1);
    }

    #[tokio::test]
    async fn unreachable_rpc_degrades_health() {
        let health = monitor(false, None).check_system_health().await;
        assert!(health.rpc_latency_ms.is_none());
        assert_eq!(health.status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn instance_health_requires_wallet() {
        let health = monitor(true, None).check_instance_health("instance_1").await;
        assert_eq!(health.status, HealthStatus::Error);
        assert_eq!(health.message.as_deref(), Some("Wallet address not set"));

        let health = monitor(true, Some("wallet")).check_instance_health("instance_1").await;
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.wallet_balance, Some(2.5));
    }

    #[test]
    fn complete_trade_marks_first_match_and_prunes() {
        let monitor = monitor(true, None);
        monitor.track_trade("i", TradeRecord::new("BONK", TradeDirection::Buy, 1.0));
        monitor.track_trade("i", TradeRecord::new("BONK", TradeDirection::Buy, 2.0));
        monitor.track_trade("i", TradeRecord::new("WIF", TradeDirection::Sell, 3.0));

        assert!(monitor.complete_trade("i", "BONK", true));
        let remaining = monitor.active_trades("i");
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].amount, 2.0);

        assert!(!monitor.complete_trade("i", "JUP", false));
        assert!(!monitor.complete_trade("unknown", "BONK", true));
        assert_eq!(monitor.performance().get_summary().total_trades, 1);
    }

    #[test]
    fn trading_interval_stamps_registered_instances() {
        let monitor = monitor(true, None);
        monitor.register_instance("i");
        monitor.monitor_trading_interval("i", "BONK", Utc::now() - chrono::Duration::seconds(90));

        let summary = monitor.performance().get_summary();
        assert!(summary.avg_trading_interval_secs["BONK"] >= 90.0);
        assert!(monitor.last_check().is_some());
    }
}
