use std::time::Duration;

use async_trait::async_trait;

use crate::birdeye::types::Candle;
use crate::error::Result;
use crate::jupiter::types::Quote;
use crate::rpc::types::TokenBalance;

/// Read access to on-chain balances.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Balance of `token` held by `wallet`; zero when no token account exists.
    async fn get_token_balance(&self, token: &str, wallet: &str) -> Result<TokenBalance>;

    /// Native SOL balance of `wallet`.
    async fn get_wallet_balance(&self, wallet: &str) -> Result<f64>;

    /// Round-trip latency of a trivial request.
    async fn ping(&self) -> Result<Duration>;
}

/// Quote-then-swap execution.
#[async_trait]
pub trait SwapClient: Send + Sync {
    async fn get_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Quote>;

    /// Build, sign and submit the swap for `quote`. Returns whether the
    /// transaction landed.
    async fn execute_swap(
        &self,
        quote: &Quote,
        wallet: &str,
        use_shared_accounts: bool,
    ) -> Result<bool>;
}

#[async_trait]
pub trait MarketDataClient: Send + Sync {
    /// Recent OHLCV candles for `token`; empty when the service has none.
    async fn collect_token_data(&self, token: &str) -> Result<Vec<Candle>>;
}
