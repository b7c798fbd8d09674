use std::sync::Arc;
use std::time::Duration;

use colored::*;
use common::{AgentError, Result};
use serde::Serialize;
use tracing::{error, info, warn};
use trader_solana::{ChainClient, SwapClient};

use super::recommendation::{Action, Recommendation};
use super::strategy::TradingParams;
use crate::models::{TradeDirection, TradeRecord};
use crate::monitoring::SystemMonitor;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum TradeOutcome {
    Skipped {
        token: String,
        reason: String,
    },
    Executed {
        token: String,
        action: Action,
        amount: f64,
        orders: usize,
        success: bool,
    },
    Failed {
        token: String,
        error: String,
    },
}

impl TradeOutcome {
    pub fn token(&self) -> &str {
        match self {
            TradeOutcome::Skipped { token, .. }
            | TradeOutcome::Executed { token, .. }
            | TradeOutcome::Failed { token, .. } => token,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionReport {
    pub outcomes: Vec<TradeOutcome>,
}

impl ExecutionReport {
    pub fn executed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TradeOutcome::Executed { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TradeOutcome::Failed { .. } | TradeOutcome::Executed { success: false, .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TradeOutcome::Skipped { .. }))
            .count()
    }
}

/// Upper bound on the number of swaps one order is split into.
pub const MAX_ORDER_CHUNKS: usize = 20;

/// Split `amount` into orders of at most `max_order`; the pieces sum to
/// `amount`. When that would take more than `MAX_ORDER_CHUNKS` swaps the
/// chunk size grows to `amount / MAX_ORDER_CHUNKS`.
pub fn chunk_order(amount: f64, max_order: f64) -> Vec<f64> {
    if !(amount > 0.0) {
        return Vec::new();
    }
    if !(max_order > 0.0) || amount <= max_order {
        return vec![amount];
    }

    let size = max_order.max(amount / MAX_ORDER_CHUNKS as f64);
    let full = ((amount / size).floor() as usize).clamp(1, MAX_ORDER_CHUNKS);
    let mut chunks = vec![size; full];
    let remainder = amount - size * full as f64;
    if remainder > 1e-9 {
        if full == MAX_ORDER_CHUNKS {
            chunks[full - 1] += remainder;
        } else {
            chunks.push(remainder);
        }
    }
    chunks
}

fn to_raw_units(amount: f64, decimals: u8) -> u64 {
    (amount * 10f64.powi(decimals as i32)).floor() as u64
}

/// Turns recommendations into sized swaps.
pub struct TradeExecutor {
    chain: Arc<dyn ChainClient>,
    swap: Arc<dyn SwapClient>,
    monitor: Option<Arc<SystemMonitor>>,
    instance_id: String,
    base_mint: String,
    base_decimals: u8,
}

struct SwapResult {
    success: bool,
    volume: f64,
}

impl TradeExecutor {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        swap: Arc<dyn SwapClient>,
        instance_id: &str,
        base_mint: &str,
        base_decimals: u8,
    ) -> Self {
        Self {
            chain,
            swap,
            monitor: None,
            instance_id: instance_id.to_string(),
            base_mint: base_mint.to_string(),
            base_decimals,
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<SystemMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub async fn execute(
        &self,
        recommendations: &[Recommendation],
        params: &TradingParams,
        wallet: Option<&str>,
    ) -> Result<ExecutionReport> {
        let wallet = wallet
            .filter(|w| !w.trim().is_empty())
            .ok_or_else(|| AgentError::MissingConfig("WALLET_ADDRESS not set".to_string()))?;

        info!("⚡ Executing position updates for {} recommendations", recommendations.len());
        let mut report = ExecutionReport::default();
        let mut traded = false;

        for rec in recommendations {
            if rec.confidence < params.min_confidence {
                warn!(
                    "⚠️ Skipping {}: confidence {}% below threshold {}%",
                    rec.token, rec.confidence, params.min_confidence
                );
                report.outcomes.push(TradeOutcome::Skipped {
                    token: rec.token.clone(),
                    reason: format!("confidence {}% below threshold", rec.confidence),
                });
                continue;
            }

            let outcome = match self.execute_one(rec, params, wallet, &mut traded).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("❌ Error executing trade for {}: {}", rec.token, e);
                    TradeOutcome::Failed {
                        token: rec.token.clone(),
                        error: e.to_string(),
                    }
                }
            };
            report.outcomes.push(outcome);
        }

        println!(
            "{} {} executed, {} failed, {} skipped",
            "📊 Execution report:".bright_cyan(),
            report.executed().to_string().green(),
            report.failed().to_string().red(),
            report.skipped().to_string().yellow()
        );
        Ok(report)
    }

    async fn execute_one(
        &self,
        rec: &Recommendation,
        params: &TradingParams,
        wallet: &str,
        traded: &mut bool,
    ) -> Result<TradeOutcome> {
        let skipped = |reason: &str| TradeOutcome::Skipped {
            token: rec.token.clone(),
            reason: reason.to_string(),
        };

        match rec.action {
            Action::Nothing => Ok(skipped("no action recommended")),
            Action::Buy => {
                let balance = self.chain.get_token_balance(&rec.token, wallet).await?;
                let current = balance.ui_amount();
                let target =
                    params.usd_size * params.max_position_fraction * rec.confidence as f64 / 100.0;
                let amount = target - current;

                info!("💰 {} current {:.4}, target {:.4}", rec.token, current, target);
                if amount <= 0.0 {
                    return Ok(skipped("already at or above target size"));
                }

                let orders = chunk_order(amount, params.max_order_size);
                let mut all_ok = true;
                let mut volume = 0.0;
                for order in &orders {
                    self.pace(params, traded).await;
                    let result = self
                        .swap_once(
                            &rec.token,
                            TradeDirection::Buy,
                            &self.base_mint,
                            &rec.token,
                            to_raw_units(*order, self.base_decimals),
                            *order,
                            params,
                            wallet,
                        )
                        .await?;
                    all_ok &= result.success;
                    volume += result.volume;
                }

                info!("🛍️ Bought {:.4} of {} in {} orders", volume, rec.token, orders.len());
                Ok(TradeOutcome::Executed {
                    token: rec.token.clone(),
                    action: Action::Buy,
                    amount,
                    orders: orders.len(),
                    success: all_ok,
                })
            }
            Action::Sell => {
                let balance = self.chain.get_token_balance(&rec.token, wallet).await?;
                if balance.is_zero() {
                    info!("ℹ️ No position to sell for {}", rec.token);
                    return Ok(skipped("no position to sell"));
                }

                self.pace(params, traded).await;
                let amount = balance.ui_amount();
                let result = self
                    .swap_once(
                        &rec.token,
                        TradeDirection::Sell,
                        &rec.token,
                        &self.base_mint,
                        balance.amount,
                        amount,
                        params,
                        wallet,
                    )
                    .await?;

                Ok(TradeOutcome::Executed {
                    token: rec.token.clone(),
                    action: Action::Sell,
                    amount,
                    orders: 1,
                    success: result.success,
                })
            }
        }
    }

    /// Await the inter-trade delay before every execution but the first.
    async fn pace(&self, params: &TradingParams, traded: &mut bool) {
        if *traded && params.tx_sleep_secs > 0 {
            tokio::time::sleep(Duration::from_secs(params.tx_sleep_secs)).await;
        }
        *traded = true;
    }

    #[allow(clippy::too_many_arguments)]
    async fn swap_once(
        &self,
        token: &str,
        direction: TradeDirection,
        input_mint: &str,
        output_mint: &str,
        raw_amount: u64,
        amount: f64,
        params: &TradingParams,
        wallet: &str,
    ) -> Result<SwapResult> {
        if let Some(monitor) = &self.monitor {
            monitor.track_trade(&self.instance_id, TradeRecord::new(token, direction, amount));
        }

        let result = async {
            let quote = self
                .swap
                .get_quote(input_mint, output_mint, raw_amount, params.slippage_bps)
                .await?;
            self.swap.execute_swap(&quote, wallet, true).await
        }
        .await;

        let success = matches!(result, Ok(true));
        if let Some(monitor) = &self.monitor {
            monitor.complete_trade(&self.instance_id, token, success);
        }

        match result {
            Ok(true) => info!("✅ Swap {} -> {} landed", input_mint, output_mint),
            Ok(false) => warn!("❌ Swap {} -> {} did not land", input_mint, output_mint),
            Err(e) => return Err(AgentError::from(e)),
        }
        Ok(SwapResult {
            success,
            volume: if success { amount } else { 0.0 },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use common::config::{ModelSettings, TradingSettings};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::time::Instant;
    use trader_solana::{Quote, TokenBalance, TraderError};

    struct FakeChain(HashMap<String, u64>);

    impl FakeChain {
        fn holding(balances: &[(&str, u64)]) -> Arc<Self> {
            Arc::new(Self(
                balances.iter().map(|(t, a)| (t.to_string(), *a)).collect(),
            ))
        }
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn get_token_balance(&self, token: &str, _: &str) -> trader_solana::Result<TokenBalance> {
            Ok(TokenBalance {
                amount: self.0.get(token).copied().unwrap_or(0),
                decimals: 6,
            })
        }

        async fn get_wallet_balance(&self, _: &str) -> trader_solana::Result<f64> {
            Ok(1.0)
        }

        async fn ping(&self) -> trader_solana::Result<Duration> {
            Ok(Duration::from_millis(1))
        }
    }

    #[derive(Default)]
    struct RecordingSwap {
        no_route: Option<String>,
        quotes: Mutex<Vec<(String, String, u64)>>,
        quoted_at: Mutex<Vec<Instant>>,
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
            self.quotes
                .lock()
                .push((input_mint.to_string(), output_mint.to_string(), amount));
            self.quoted_at.lock().push(Instant::now());
            if self.no_route.as_deref() == Some(output_mint) {
                return Err(TraderError::Jupiter("no route found".to_string()));
            }
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

    fn executor(chain: Arc<FakeChain>, swap: Arc<RecordingSwap>) -> TradeExecutor {
        TradeExecutor::new(chain, swap, "instance_1", "SOL", 9)
    }

    fn params(tx_sleep_secs: u64) -> TradingParams {
        let mut params =
            TradingParams::from_settings(&TradingSettings::default(), &ModelSettings::default());
        params.tx_sleep_secs = tx_sleep_secs;
        params
    }

    fn rec(token: &str, action: Action, confidence: u8) -> Recommendation {
        Recommendation {
            token: token.to_string(),
            action,
            confidence,
            reasoning: "test".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn sell_swaps_whole_balance_into_base() {
        let swap = Arc::new(RecordingSwap::default());
        let executor = executor(FakeChain::holding(&[("TokenA", 2_500_000)]), swap.clone());

        let report = executor
            .execute(&[rec("TokenA", Action::Sell, 90)], &params(0), Some("wallet"))
            .await
            .unwrap();

        assert_eq!(
            *swap.quotes.lock(),
            vec![("TokenA".to_string(), "SOL".to_string(), 2_500_000)]
        );
        assert_eq!(
            report.outcomes[0],
            TradeOutcome::Executed {
                token: "TokenA".to_string(),
                action: Action::Sell,
                amount: 2.5,
                orders: 1,
                success: true,
            }
        );
    }

    #[tokio::test]
    async fn missing_wallet_aborts_before_trading() {
        let swap = Arc::new(RecordingSwap::default());
        let executor = executor(FakeChain::holding(&[("TokenA", 1_000_000)]), swap.clone());
        let recs = [rec("TokenA", Action::Sell, 90)];

        let err = executor.execute(&recs, &params(0), None).await.unwrap_err();
        assert!(matches!(err, AgentError::MissingConfig(_)));
        let err = executor.execute(&recs, &params(0), Some("  ")).await.unwrap_err();
        assert!(matches!(err, AgentError::MissingConfig(_)));
        assert!(swap.quotes.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delay_runs_between_trades_only() {
        let swap = Arc::new(RecordingSwap::default());
        let executor = executor(FakeChain::holding(&[]), swap.clone());
        let recs = [rec("TokenA", Action::Buy, 80), rec("TokenB", Action::Buy, 80)];

        let start = Instant::now();
        let report = executor.execute(&recs, &params(15), Some("wallet")).await.unwrap();
        assert_eq!(report.executed(), 2);

        let quoted_at = swap.quoted_at.lock().clone();
        assert_eq!(quoted_at.len(), 2);
        assert!(quoted_at[0] - start < Duration::from_secs(1));
        assert!(quoted_at[1] - quoted_at[0] >= Duration::from_secs(15));
        assert!(start.elapsed() < Duration::from_secs(16));
    }

    #[tokio::test]
    async fn failed_swap_does_not_stop_later_tokens() {
        let swap = Arc::new(RecordingSwap {
            no_route: Some("TokenA".to_string()),
            ..RecordingSwap::default()
        });
        let executor = executor(FakeChain::holding(&[]), swap.clone());
        let recs = [rec("TokenA", Action::Buy, 80), rec("TokenB", Action::Buy, 80)];

        let report = executor.execute(&recs, &params(0), Some("wallet")).await.unwrap();
        assert!(matches!(&report.outcomes[0], TradeOutcome::Failed { token, .. } if token == "TokenA"));
        assert!(matches!(
            &report.outcomes[1],
            TradeOutcome::Executed { token, success: true, .. } if token == "TokenB"
        ));
        assert_eq!(report.failed(), 1);
        assert_eq!(report.executed(), 1);
    }

    #[tokio::test]
    async fn large_buy_is_split_into_orders() {
        let swap = Arc::new(RecordingSwap::default());
        let executor = executor(FakeChain::holding(&[]), swap.clone());
        let mut params = params(0);
        params.usd_size = 1000.0;
        params.max_order_size = 30.0;

        // target is 1000 * 0.1 * 100% = 100, in orders of 30, 30, 30 and 10
        let report = executor
            .execute(&[rec("TokenA", Action::Buy, 100)], &params, Some("wallet"))
            .await
            .unwrap();

        let quotes = swap.quotes.lock().clone();
        assert_eq!(quotes.len(), 4);
        assert!(quotes.iter().all(|(input, output, _)| input == "SOL" && output == "TokenA"));
        assert_eq!(quotes.iter().map(|(_, _, a)| a).sum::<u64>(), 100_000_000_000);
        assert!(matches!(report.outcomes[0], TradeOutcome::Executed { orders: 4, .. }));
    }

    #[test]
    fn chunks_sum_to_order() {
        let chunks = chunk_order(120.0, 50.0);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| *c <= 50.0));
        assert!((chunks.iter().sum::<f64>() - 120.0).abs() < 1e-9);

        assert_eq!(chunk_order(100.0, 50.0), vec![50.0, 50.0]);
        assert_eq!(chunk_order(10.0, 50.0), vec![10.0]);
        assert_eq!(chunk_order(10.0, 0.0), vec![10.0]);
        assert!(chunk_order(0.0, 50.0).is_empty());
    }

    #[test]
    fn tiny_chunk_sizes_are_capped() {
        let chunks = chunk_order(8.0, 0.001);
        assert_eq!(chunks.len(), MAX_ORDER_CHUNKS);
        assert!((chunks.iter().sum::<f64>() - 8.0).abs() < 1e-9);

        let chunks = chunk_order(8.0, 1e-18);
        assert!(chunks.len() <= MAX_ORDER_CHUNKS);
        assert!((chunks.iter().sum::<f64>() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn raw_units_use_decimals() {
        assert_eq!(to_raw_units(1.5, 9), 1_500_000_000);
        assert_eq!(to_raw_units(0.25, 6), 250_000);
    }
}
