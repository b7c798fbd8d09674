use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use common::Result;
use tracing::{error, info};

pub mod copybot;
pub mod execution;
pub mod recommendation;
pub mod sentiment;
pub mod strategy;

pub use copybot::{CopyBotAgent, CopyBotDeps};
pub use execution::{ExecutionReport, TradeExecutor, TradeOutcome};
pub use recommendation::{Action, Recommendation, RecommendationEngine};
pub use sentiment::{SentimentAgent, SentimentDeps};
pub use strategy::{Strategy, TradingParams};

/// Active flag plus a counter bumped on every inactive to active transition.
#[derive(Debug, Default)]
pub struct RunFlag {
    active: AtomicBool,
    generation: AtomicU64,
}

impl RunFlag {
    pub fn is_set(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn set(&self, active: bool) {
        let was_active = self.active.swap(active, Ordering::SeqCst);
        if active && !was_active {
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// A long-running agent driven by a cooperative active flag.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Get the agent's name
    fn name(&self) -> &str;

    fn is_active(&self) -> bool;

    fn set_active(&self, active: bool);

    /// Changes every time the agent is reactivated.
    fn generation(&self) -> u64;

    /// Time to wait between cycles.
    fn interval(&self) -> Duration;

    /// One full pass of the agent's work.
    async fn run_cycle(&self) -> Result<()>;
}

/// Run cycles until the agent is deactivated. The flag is checked before
/// each cycle and after each sleep. The generation is captured when the loop
/// is created, so a loop whose agent was stopped and started again exits
/// too, leaving the work to the loop spawned by the restart.
pub fn run_loop(agent: Arc<dyn Agent>) -> impl Future<Output = ()> + Send {
    let generation = agent.generation();
    async move {
        let current = |agent: &Arc<dyn Agent>| agent.is_active() && agent.generation() == generation;

        info!("🚀 {} started", agent.name());
        while current(&agent) {
            if let Err(e) = agent.run_cycle().await {
                error!("❌ Error in {} cycle: {}", agent.name(), e);
            }
            if !current(&agent) {
                break;
            }

            let interval = agent.interval();
            let next_run = Local::now() + chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::zero());
            info!("😴 {} next run at {}", agent.name(), next_run.format("%H:%M:%S"));
            tokio::time::sleep(interval).await;
        }
        info!("👋 {} stopped", agent.name());
    }
}
