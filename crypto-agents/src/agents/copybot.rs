use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use colored::*;
use common::env::get_env_var_opt;
use common::{AgentError, CompletionClient, Result, Settings};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use trader_solana::{ChainClient, MarketDataClient, SwapClient};

use super::execution::{ExecutionReport, TradeExecutor, TradeOutcome};
use super::recommendation::{Recommendation, RecommendationEngine};
use super::strategy::TradingParams;
use super::{Agent, RunFlag};
use crate::models::{InstanceMetrics, PortfolioPosition};
use crate::monitoring::SystemMonitor;

/// Collaborators shared by every copybot instance.
#[derive(Clone)]
pub struct CopyBotDeps {
    pub model: Arc<dyn CompletionClient>,
    pub chain: Arc<dyn ChainClient>,
    pub swap: Arc<dyn SwapClient>,
    pub market: Arc<dyn MarketDataClient>,
    pub monitor: Option<Arc<SystemMonitor>>,
}

/// Reviews portfolio positions with the model and resizes them.
pub struct CopyBotAgent {
    name: String,
    instance_id: String,
    active: RunFlag,
    params: RwLock<TradingParams>,
    tokens: RwLock<Vec<String>>,
    wallet: RwLock<Option<String>>,
    portfolio_csv: PathBuf,
    excluded: Vec<String>,
    engine: RecommendationEngine,
    market: Arc<dyn MarketDataClient>,
    executor: TradeExecutor,
    monitor: Option<Arc<SystemMonitor>>,
    recommendations: Mutex<Vec<Recommendation>>,
    metrics: Mutex<InstanceMetrics>,
    last_report: Mutex<Option<ExecutionReport>>,
}

impl CopyBotAgent {
    pub fn new(instance_id: &str, deps: CopyBotDeps, settings: &Settings) -> Self {
        let trading = &settings.trading;
        let mut executor = TradeExecutor::new(
            deps.chain,
            deps.swap,
            instance_id,
            &trading.base_mint,
            trading.base_decimals,
        );
        if let Some(monitor) = &deps.monitor {
            executor = executor.with_monitor(monitor.clone());
        }

        Self {
            name: format!("CopyBot {}", instance_id),
            instance_id: instance_id.to_string(),
            active: RunFlag::default(),
            params: RwLock::new(TradingParams::from_settings(trading, &settings.model)),
            tokens: RwLock::new(Vec::new()),
            wallet: RwLock::new(get_env_var_opt("WALLET_ADDRESS")),
            portfolio_csv: PathBuf::from(&trading.portfolio_csv),
            excluded: trading.excluded_tokens.clone(),
            engine: RecommendationEngine::new(deps.model, settings.model.output_format),
            market: deps.market,
            executor,
            monitor: deps.monitor,
            recommendations: Mutex::new(Vec::new()),
            metrics: Mutex::new(InstanceMetrics::default()),
            last_report: Mutex::new(None),
        }
    }

    pub fn with_wallet(self, wallet: Option<String>) -> Self {
        *self.wallet.write() = wallet;
        self
    }

    pub fn with_portfolio_csv(mut self, path: impl Into<PathBuf>) -> Self {
        self.portfolio_csv = path.into();
        self
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn params(&self) -> TradingParams {
        self.params.read().clone()
    }

    pub fn update_params(&self, params: TradingParams) {
        *self.params.write() = params;
    }

    pub fn set_tokens(&self, tokens: Vec<String>) {
        *self.tokens.write() = tokens;
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.read().clone()
    }

    pub fn recommendations(&self) -> Vec<Recommendation> {
        self.recommendations.lock().clone()
    }

    pub fn metrics(&self) -> InstanceMetrics {
        self.metrics.lock().clone()
    }

    pub fn last_report(&self) -> Option<ExecutionReport> {
        self.last_report.lock().clone()
    }

    pub fn get_instance_metrics(&self) -> Value {
        json!({
            "instance_id": self.instance_id,
            "active": self.is_active(),
            "params": self.params(),
            "trading": self.metrics(),
            "recommendations": self.recommendations().len(),
            "last_report": self.last_report(),
        })
    }

    pub fn load_portfolio(&self) -> Result<Vec<PortfolioPosition>> {
        read_portfolio(&self.portfolio_csv)
    }

    /// Portfolio rows, restricted to (and completed with) the tracked tokens
    /// when any are configured.
    fn positions_to_analyze(&self, portfolio: Vec<PortfolioPosition>) -> Vec<PortfolioPosition> {
        let tokens = self.tokens();
        let mut positions: Vec<PortfolioPosition> = if tokens.is_empty() {
            portfolio
        } else {
            tokens
                .iter()
                .map(|t| {
                    portfolio
                        .iter()
                        .find(|p| &p.mint_address == t)
                        .cloned()
                        .unwrap_or_else(|| PortfolioPosition::empty(t))
                })
                .collect()
        };

        let mut seen = std::collections::HashSet::new();
        positions.retain(|p| seen.insert(p.mint_address.clone()));
        positions
    }

    pub async fn analyze_position(&self, position: &PortfolioPosition) -> Option<Recommendation> {
        let token = &position.mint_address;
        if self.excluded.iter().any(|t| t == token) {
            warn!("⚠️ Skipping analysis for excluded token: {}", token);
            return None;
        }

        info!(
            "🔍 Analyzing position for {} (amount {}, ${:.2})",
            position.name, position.amount, position.usd_value
        );

        let candles = match self.market.collect_token_data(token).await {
            Ok(candles) => candles,
            Err(e) => {
                warn!("❌ Error collecting OHLCV data for {}: {}", token, e);
                Vec::new()
            }
        };

        let temperature = self.params.read().temperature;
        match self.engine.recommend(position, &candles, temperature).await {
            Ok(rec) => {
                println!(
                    "{} {} | {} | {}%",
                    "🎯".bright_white(),
                    position.name.bright_white(),
                    rec.action.to_string().bright_yellow(),
                    rec.confidence
                );
                self.recommendations.lock().push(rec.clone());
                Some(rec)
            }
            Err(e) => {
                error!("❌ Error getting AI analysis for {}: {}", token, e);
                None
            }
        }
    }

    /// Rebuild the recommendations table from the current portfolio.
    pub async fn analyze_portfolio(&self) -> Result<Vec<Recommendation>> {
        let portfolio = match self.load_portfolio() {
            Ok(portfolio) => {
                info!("💼 Loaded {} portfolio positions", portfolio.len());
                portfolio
            }
            Err(e) if !self.tokens.read().is_empty() => {
                warn!("Portfolio unavailable, analyzing tracked tokens only: {}", e);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        self.recommendations.lock().clear();
        for position in self.positions_to_analyze(portfolio) {
            self.analyze_position(&position).await;
        }
        Ok(self.recommendations())
    }

    pub async fn execute_recommendations(&self) -> Result<ExecutionReport> {
        let recommendations = self.recommendations();
        let params = self.params();
        let wallet = self.wallet.read().clone();

        let report = self
            .executor
            .execute(&recommendations, &params, wallet.as_deref())
            .await?;

        for outcome in &report.outcomes {
            if let TradeOutcome::Executed {
                token,
                amount,
                success,
                ..
            } = outcome
            {
                let previous = {
                    let mut metrics = self.metrics.lock();
                    let previous = metrics.last_trade_time;
                    metrics.record_trade(*success, *amount);
                    previous
                };
                if let (Some(monitor), Some(previous)) = (&self.monitor, previous) {
                    monitor.monitor_trading_interval(&self.instance_id, token, previous);
                }
            }
        }

        *self.last_report.lock() = Some(report.clone());
        Ok(report)
    }

    pub async fn run_analysis_cycle(&self) -> Result<ExecutionReport> {
        println!("\n{}", "🤖 Starting CopyBot portfolio analysis...".bright_cyan());

        match self.analyze_portfolio().await {
            Ok(recs) if recs.is_empty() => {
                info!("No recommendations this cycle");
                return Ok(ExecutionReport::default());
            }
            Ok(_) => {}
            Err(AgentError::StorageError(msg)) => {
                error!("❌ Error loading portfolio data: {}", msg);
                return Ok(ExecutionReport::default());
            }
            Err(e) => return Err(e),
        }

        let report = self.execute_recommendations().await?;
        println!("{}", "✨ Portfolio analysis cycle complete!".green());
        Ok(report)
    }
}

fn read_portfolio(path: &Path) -> Result<Vec<PortfolioPosition>> {
    if !path.exists() {
        return Err(AgentError::StorageError(format!(
            "portfolio file not found: {}",
            path.display()
        )));
    }
    let mut reader =
        csv::Reader::from_path(path).map_err(|e| AgentError::StorageError(e.to_string()))?;
    reader
        .deserialize()
        .map(|row| row.map_err(|e| AgentError::StorageError(e.to_string())))
        .collect()
}

#[async_trait]
impl Agent for CopyBotAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.active.is_set()
    }

    fn set_active(&self, active: bool) {
        self.active.set(active);
    }

    fn generation(&self) -> u64 {
        self.active.generation()
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.params.read().cycle_interval_minutes * 60)
    }

    async fn run_cycle(&self) -> Result<()> {
        self.run_analysis_cycle().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use trader_solana::{Candle, Quote, TokenBalance, TraderError};

    struct FixedModel(String);

    #[async_trait]
    impl CompletionClient for FixedModel {
        async fn generate_response(&self, _: &str, _: &str, _: f32) -> Result<String> {
            Ok(self.0.clone())
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    struct FakeChain(u64);

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn get_token_balance(&self, _: &str, _: &str) -> trader_solana::Result<TokenBalance> {
            Ok(TokenBalance {
                amount: self.0,
                decimals: 9,
            })
        }

        async fn get_wallet_balance(&self, _: &str) -> trader_solana::Result<f64> {
            Ok(1.0)
        }

        async fn ping(&self) -> trader_solana::Result<Duration> {
            Ok(Duration::from_millis(5))
        }
    }

    #[derive(Default)]
    struct RecordingSwap {
        quotes: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl SwapClient for RecordingSwap {
        async fn get_quote(
            &self,
            input_mint: &str,
            output_mint: &str,
            amount: u64,
            _: u16,
        ) -> trader_solana::Result<Quote> {
            self.quotes.lock().push(amount);
            Quote::from_response(json!({
                "inputMint": input_mint,
                "outputMint": output_mint,
                "inAmount": amount.to_string(),
                "outAmount": "1",
            }))
        }

        async fn execute_swap(&self, _: &Quote, _: &str, _: bool) -> trader_solana::Result<bool> {
            Ok(true)
        }
    }

    struct NoMarket;

    #[async_trait]
    impl MarketDataClient for NoMarket {
        async fn collect_token_data(&self, _: &str) -> trader_solana::Result<Vec<Candle>> {
            Err(TraderError::Birdeye("offline".to_string()))
        }
    }

    fn agent(reply: &str, balance: u64, swap: Arc<RecordingSwap>, csv: &Path) -> CopyBotAgent {
        let deps = CopyBotDeps {
            model: Arc::new(FixedModel(reply.to_string())),
            chain: Arc::new(FakeChain(balance)),
            swap,
            market: Arc::new(NoMarket),
            monitor: None,
        };
        let agent = CopyBotAgent::new("instance_1", deps, &Settings::default())
            .with_wallet(Some("wallet".to_string()))
            .with_portfolio_csv(csv);
        let mut params = agent.params();
        params.tx_sleep_secs = 0;
        agent.update_params(params);
        agent
    }

    fn portfolio(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("portfolio.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Mint Address,name,Amount,USD Value").unwrap();
        writeln!(file, "TokenA,Alpha,3.0,30.0").unwrap();
        writeln!(file, "{},Solana,1.0,150.0", common::config::SOL_MINT).unwrap();
        path
    }

    #[tokio::test]
    async fn low_confidence_never_quotes() {
        let dir = tempfile::tempdir().unwrap();
        let swap = Arc::new(RecordingSwap::default());
        let reply = r#"{"action": "BUY", "confidence": 40, "reasoning": "weak trend"}"#;
        let agent = agent(reply, 0, swap.clone(), &portfolio(&dir));

        let report = agent.run_analysis_cycle().await.unwrap();
        assert_eq!(report.skipped(), 1);
        assert!(swap.quotes.lock().is_empty());
        assert_eq!(agent.metrics().total_trades, 0);
    }

    #[tokio::test]
    async fn buy_tops_up_to_target() {
        let dir = tempfile::tempdir().unwrap();
        let swap = Arc::new(RecordingSwap::default());
        let reply = r#"{"action": "BUY", "confidence": 80, "reasoning": "MA20 above MA40"}"#;
        // Holds 3.0, target is 100 * 0.1 * 0.8 = 8.0.
        let agent = agent(reply, 3_000_000_000, swap.clone(), &portfolio(&dir));

        let report = agent.run_analysis_cycle().await.unwrap();
        assert_eq!(report.executed(), 1);
        assert_eq!(*swap.quotes.lock(), vec![5_000_000_000]);

        let metrics = agent.metrics();
        assert_eq!(metrics.total_trades, 1);
        assert_eq!(metrics.successful_trades, 1);
        assert!((metrics.volume - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn excluded_tokens_are_not_analyzed() {
        let dir = tempfile::tempdir().unwrap();
        let swap = Arc::new(RecordingSwap::default());
        let reply = r#"{"action": "NOTHING", "confidence": 90, "reasoning": "hold"}"#;
        let agent = agent(reply, 0, swap, &portfolio(&dir));

        let recs = agent.analyze_portfolio().await.unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].token, "TokenA");
    }

    #[tokio::test]
    async fn tracked_tokens_without_portfolio() {
        let dir = tempfile::tempdir().unwrap();
        let swap = Arc::new(RecordingSwap::default());
        let reply = r#"{"action": "SELL", "confidence": 90, "reasoning": "breakdown"}"#;
        let agent = agent(reply, 0, swap.clone(), &dir.path().join("missing.csv"));
        agent.set_tokens(vec!["TokenB".to_string()]);

        let report = agent.run_analysis_cycle().await.unwrap();
        // Nothing held, so the sell is skipped.
        assert_eq!(report.skipped(), 1);
        assert!(swap.quotes.lock().is_empty());
    }

    #[tokio::test]
    async fn missing_portfolio_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let swap = Arc::new(RecordingSwap::default());
        let agent = agent("{}", 0, swap, &dir.path().join("missing.csv"));

        let report = agent.run_analysis_cycle().await.unwrap();
        assert!(report.outcomes.is_empty());
    }
}
