use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{Result, TraderError};
use crate::rpc::types::{
    parse_signature_status, parse_token_accounts, RpcRequest, RpcResponse, TokenBalance,
};
use crate::traits::ChainClient;
use crate::LAMPORTS_PER_SOL;

pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

const CONFIRM_POLL_INTERVAL: Duration = Duration::from_secs(2);
const CONFIRM_ATTEMPTS: u32 = 15;

/// Minimal Solana JSON-RPC client over HTTP.
pub struct SolanaRpcClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl SolanaRpcClient {
    pub fn new(url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn from_env() -> Result<Self> {
        let url = std::env::var("SOLANA_RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string());
        Self::new(&url)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        debug!("RPC {} -> {}", method, self.url);
        let response: RpcResponse = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response.into_result()
    }

    /// Submit a base64-encoded, already signed transaction.
    pub async fn send_transaction(&self, encoded_tx: &str) -> Result<String> {
        let result = self
            .call(
                "sendTransaction",
                json!([encoded_tx, { "encoding": "base64", "skipPreflight": true, "maxRetries": 2 }]),
            )
            .await?;

        result
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| TraderError::InvalidResponse("sendTransaction returned no signature".to_string()))
    }

    /// Poll until the signature is confirmed, failed, or we give up.
    pub async fn confirm_transaction(&self, signature: &str) -> Result<bool> {
        for _ in 0..CONFIRM_ATTEMPTS {
            let result = self
                .call(
                    "getSignatureStatuses",
                    json!([[signature], { "searchTransactionHistory": false }]),
                )
                .await?;

            if let Some(landed) = parse_signature_status(&result) {
                return Ok(landed);
            }
            tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;
        }

        warn!("Transaction {} not confirmed in time", signature);
        Ok(false)
    }
}

#[async_trait]
impl ChainClient for SolanaRpcClient {
    async fn get_token_balance(&self, token: &str, wallet: &str) -> Result<TokenBalance> {
        let result = self
            .call(
                "getTokenAccountsByOwner",
                json!([wallet, { "mint": token }, { "encoding": "jsonParsed" }]),
            )
            .await?;
        parse_token_accounts(&result)
    }

    async fn get_wallet_balance(&self, wallet: &str) -> Result<f64> {
        let result = self.call("getBalance", json!([wallet])).await?;
        let lamports = result
            .get("value")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| TraderError::InvalidResponse("getBalance without value".to_string()))?;
        Ok(lamports as f64 / LAMPORTS_PER_SOL)
    }

    async fn ping(&self) -> Result<Duration> {
        let started = Instant::now();
        self.call("getHealth", json!([])).await?;
        Ok(started.elapsed())
    }
}
