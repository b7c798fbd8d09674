use std::collections::HashMap;
use std::sync::Arc;

use common::Settings;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::info;

use crate::agents::strategy::{resolve_params, TradingParams};
use crate::agents::{run_loop, Agent, CopyBotAgent, CopyBotDeps};
use crate::error::{ManagerError, ManagerResult};
use crate::models::{InstanceConfig, InstanceMetrics, TradingInstance};
use crate::monitoring::{InstanceHealth, SystemMonitor};

/// Instance metrics captured under the manager lock.
pub struct MetricsSnapshot {
    instance_id: String,
    monitor: Arc<SystemMonitor>,
    body: Value,
}

impl MetricsSnapshot {
    pub async fn with_health(mut self) -> Value {
        let (system, health) = futures::join!(
            self.monitor.check_system_health(),
            self.monitor.check_instance_health(&self.instance_id)
        );
        if let Value::Object(fields) = &mut self.body {
            fields.insert("system_health".to_string(), json!(system));
            fields.insert("instance_health".to_string(), json!(health));
            fields.insert("performance".to_string(), json!(self.monitor.performance().get_summary()));
        }
        self.body
    }
}

struct ManagedInstance {
    record: TradingInstance,
    agent: Arc<CopyBotAgent>,
    task: Option<JoinHandle<()>>,
}

/// Owns every trading instance together with its agent and run loop.
pub struct InstanceManager {
    deps: CopyBotDeps,
    settings: Settings,
    monitor: Arc<SystemMonitor>,
    instances: HashMap<String, ManagedInstance>,
    next_id: u64,
}

impl InstanceManager {
    pub fn new(mut deps: CopyBotDeps, settings: Settings, monitor: Arc<SystemMonitor>) -> Self {
        deps.monitor = Some(monitor.clone());
        Self {
            deps,
            settings,
            monitor,
            instances: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn monitor(&self) -> &Arc<SystemMonitor> {
        &self.monitor
    }

    fn base_params(&self) -> TradingParams {
        TradingParams::from_settings(&self.settings.trading, &self.settings.model)
    }

    fn entry(&self, instance_id: &str) -> ManagerResult<&ManagedInstance> {
        self.instances
            .get(instance_id)
            .ok_or_else(|| ManagerError::NotFound(instance_id.to_string()))
    }

    fn entry_mut(&mut self, instance_id: &str) -> ManagerResult<&mut ManagedInstance> {
        self.instances
            .get_mut(instance_id)
            .ok_or_else(|| ManagerError::NotFound(instance_id.to_string()))
    }

    /// Register a new instance and its agent. Nothing is registered when the
    /// strategy or its parameters are invalid.
    pub fn create_instance(&mut self, config: InstanceConfig) -> ManagerResult<String> {
        let params = resolve_params(
            &self.base_params(),
            &config.strategy_id,
            config.amount_sol,
            &config.parameters,
        )?;

        self.next_id += 1;
        let instance_id = format!("instance_{}", self.next_id);

        let agent = CopyBotAgent::new(&instance_id, self.deps.clone(), &self.settings);
        agent.update_params(params);
        agent.set_tokens(config.tokens.clone());

        let record = TradingInstance::from_config(instance_id.clone(), config);
        info!("🆕 Created {} ({}, strategy {})", instance_id, record.name, record.strategy_id);

        self.monitor.register_instance(&instance_id);
        self.instances.insert(
            instance_id.clone(),
            ManagedInstance {
                record,
                agent: Arc::new(agent),
                task: None,
            },
        );
        Ok(instance_id)
    }

    pub fn get_instance(&self, instance_id: &str) -> ManagerResult<TradingInstance> {
        Ok(self.entry(instance_id)?.record.clone())
    }

    pub fn get_agent(&self, instance_id: &str) -> ManagerResult<Arc<CopyBotAgent>> {
        Ok(self.entry(instance_id)?.agent.clone())
    }

    /// All instances in creation order.
    pub fn list_instances(&self) -> Vec<TradingInstance> {
        let mut records: Vec<TradingInstance> =
            self.instances.values().map(|m| m.record.clone()).collect();
        records.sort_by(|a, b| a.id.len().cmp(&b.id.len()).then_with(|| a.id.cmp(&b.id)));
        records
    }

    pub fn update_instance(&mut self, instance_id: &str, config: InstanceConfig) -> ManagerResult<TradingInstance> {
        let base = self.base_params();
        let entry = self.entry_mut(instance_id)?;
        let params = resolve_params(&base, &config.strategy_id, config.amount_sol, &config.parameters)?;

        entry.agent.update_params(params);
        entry.agent.set_tokens(config.tokens.clone());
        entry.record.apply_config(config);
        info!("🔧 Updated {}", instance_id);
        Ok(entry.record.clone())
    }

    pub fn delete_instance(&mut self, instance_id: &str) -> ManagerResult<()> {
        let entry = self
            .instances
            .remove(instance_id)
            .ok_or_else(|| ManagerError::NotFound(instance_id.to_string()))?;
        entry.agent.set_active(false);
        self.monitor.remove_instance(instance_id);
        info!("🗑️ Deleted {}", instance_id);
        Ok(())
    }

    /// Activate the agent and spawn a fresh loop. Starting an instance whose
    /// loop is live is a no-op; a loop still winding down after a stop
    /// retires on its own once the agent is reactivated.
    pub fn start_instance(&mut self, instance_id: &str) -> ManagerResult<()> {
        let entry = self.entry_mut(instance_id)?;
        let running = entry.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false);
        if !(running && entry.agent.is_active()) {
            entry.agent.set_active(true);
            let agent: Arc<dyn Agent> = entry.agent.clone();
            entry.task = Some(tokio::spawn(run_loop(agent)));
        }
        entry.record.active = true;

        self.monitor.set_instance_active(instance_id, true);
        info!("▶️ Started {}", instance_id);
        Ok(())
    }

    /// Clear the active flag; the loop exits at its next check.
    pub fn stop_instance(&mut self, instance_id: &str) -> ManagerResult<()> {
        let entry = self.entry_mut(instance_id)?;
        entry.agent.set_active(false);
        entry.record.active = false;
        self.monitor.set_instance_active(instance_id, false);
        info!("⏹️ Stopped {}", instance_id);
        Ok(())
    }

    pub fn is_running(&self, instance_id: &str) -> ManagerResult<bool> {
        Ok(self
            .entry(instance_id)?
            .task
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false))
    }

    /// Agent counters plus external ones, with live health and the
    /// performance summary.
    pub async fn get_instance_metrics(&self, instance_id: &str) -> ManagerResult<Value> {
        Ok(self.metrics_snapshot(instance_id)?.with_health().await)
    }

    /// Everything `get_instance_metrics` reports except the health checks,
    /// which can then run without borrowing the manager.
    pub fn metrics_snapshot(&self, instance_id: &str) -> ManagerResult<MetricsSnapshot> {
        let entry = self.entry(instance_id)?;

        let mut trading = entry.agent.metrics();
        if let Some(external) = &entry.record.metrics {
            trading.merge(external);
        }
        let success_rate = trading.success_rate();

        Ok(MetricsSnapshot {
            instance_id: instance_id.to_string(),
            monitor: self.monitor.clone(),
            body: json!({
                "instance_id": instance_id,
                "active": entry.agent.is_active(),
                "trading": trading,
                "success_rate": success_rate,
                "agent": entry.agent.get_instance_metrics(),
            }),
        })
    }

    pub fn update_instance_metrics(&mut self, instance_id: &str, metrics: &InstanceMetrics) -> ManagerResult<InstanceMetrics> {
        let entry = self.entry_mut(instance_id)?;
        let record = entry.record.metrics.get_or_insert_with(InstanceMetrics::default);
        record.merge(metrics);
        Ok(record.clone())
    }

    pub async fn instance_health(&self, instance_id: &str) -> ManagerResult<InstanceHealth> {
        self.entry(instance_id)?;
        Ok(self.monitor.check_instance_health(instance_id).await)
    }

    /// Deactivate every agent.
    pub fn shutdown(&mut self) {
        for (id, entry) in self.instances.iter_mut() {
            entry.agent.set_active(false);
            entry.record.active = false;
            self.monitor.set_instance_active(id, false);
        }
    }
}
