use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use solana_sdk::signature::{read_keypair_file, Keypair};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::VersionedTransaction;
use tracing::{info, warn};

use crate::error::{Result, TraderError};
use crate::jupiter::types::{Quote, SwapRequest, SwapResponse};
use crate::rpc::client::SolanaRpcClient;
use crate::traits::SwapClient;

const BASE_URL: &str = "https://quote-api.jup.ag/v6";

pub struct JupiterClient {
    client: reqwest::Client,
    base_url: String,
    rpc: Arc<SolanaRpcClient>,
    keypair: Option<Keypair>,
}

impl JupiterClient {
    pub fn new(rpc: Arc<SolanaRpcClient>, keypair: Option<Keypair>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            rpc,
            keypair,
        })
    }

    /// Build from `SOLANA_KEYPAIR_PATH`. Without it the client can still
    /// quote but every swap fails with a configuration error.
    pub fn from_env(rpc: Arc<SolanaRpcClient>) -> Result<Self> {
        let keypair = match std::env::var("SOLANA_KEYPAIR_PATH") {
            Ok(path) => Some(load_keypair(&path)?),
            Err(_) => None,
        };
        Self::new(rpc, keypair)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

pub fn load_keypair(path: &str) -> Result<Keypair> {
    read_keypair_file(path)
        .map_err(|e| TraderError::MissingConfig(format!("cannot read keypair {}: {}", path, e)))
}

/// Decode a base64 wire transaction, sign it with `keypair` and re-encode it.
pub fn sign_transaction(encoded: &str, keypair: &Keypair) -> Result<String> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| TraderError::Transaction(format!("invalid base64: {}", e)))?;
    let unsigned: VersionedTransaction = bincode::deserialize(&bytes)
        .map_err(|e| TraderError::Transaction(format!("invalid transaction: {}", e)))?;

    let signed = VersionedTransaction::try_new(unsigned.message, &[keypair])
        .map_err(|e| TraderError::Transaction(format!("signing failed: {}", e)))?;

    let wire = bincode::serialize(&signed)
        .map_err(|e| TraderError::Transaction(format!("serialization failed: {}", e)))?;
    Ok(STANDARD.encode(wire))
}

#[async_trait]
impl SwapClient for JupiterClient {
    async fn get_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Quote> {
        let url = format!("{}/quote", self.base_url);
        let amount = amount.to_string();
        let slippage = slippage_bps.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("inputMint", input_mint),
                ("outputMint", output_mint),
                ("amount", amount.as_str()),
                ("slippageBps", slippage.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            return Err(TraderError::Jupiter(format!("quote returned {}: {}", status, body)));
        }
        Quote::from_response(body)
    }

    async fn execute_swap(
        &self,
        quote: &Quote,
        wallet: &str,
        use_shared_accounts: bool,
    ) -> Result<bool> {
        let keypair = self
            .keypair
            .as_ref()
            .ok_or_else(|| TraderError::MissingConfig("SOLANA_KEYPAIR_PATH not set".to_string()))?;

        if keypair.pubkey().to_string() != wallet {
            return Err(TraderError::MissingConfig(format!(
                "keypair does not match wallet {}",
                wallet
            )));
        }

        let request = SwapRequest {
            quote_response: &quote.raw,
            user_public_key: wallet,
            wrap_and_unwrap_sol: true,
            use_shared_accounts,
            dynamic_compute_unit_limit: true,
            prioritization_fee_lamports: "auto",
        };

        let response = self
            .client
            .post(format!("{}/swap", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(TraderError::Jupiter(format!("swap returned {}: {}", status, text)));
        }

        let swap: SwapResponse = response.json().await?;
        let signed = sign_transaction(&swap.swap_transaction, keypair)?;
        let signature = self.rpc.send_transaction(&signed).await?;
        info!("📤 Submitted swap {} -> {}: {}", quote.input_mint, quote.output_mint, signature);

        let landed = self.rpc.confirm_transaction(&signature).await?;
        if !landed {
            warn!("Swap {} did not land", signature);
        }
        Ok(landed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::message::{Message, VersionedMessage};
    use solana_sdk::signature::Signature;

    #[test]
    fn signs_unsigned_wire_transaction() {
        let keypair = Keypair::new();
        let message = VersionedMessage::Legacy(Message::new(&[], Some(&keypair.pubkey())));
        let unsigned = VersionedTransaction {
            signatures: vec![Signature::default()],
            message,
        };
        let encoded = STANDARD.encode(bincode::serialize(&unsigned).unwrap());

        let signed = sign_transaction(&encoded, &keypair).unwrap();
        let decoded: VersionedTransaction =
            bincode::deserialize(&STANDARD.decode(signed).unwrap()).unwrap();

        assert_eq!(decoded.signatures.len(), 1);
        assert_ne!(decoded.signatures[0], Signature::default());
        assert!(decoded.verify_with_results().into_iter().all(|ok| ok));
    }

    #[test]
    fn rejects_garbage_transactions() {
        let keypair = Keypair::new();
        assert!(matches!(
            sign_transaction("not base64!!", &keypair),
            Err(TraderError::Transaction(_))
        ));
    }

    #[tokio::test]
    async fn swap_without_keypair_is_a_config_error() {
        let rpc = Arc::new(SolanaRpcClient::new("http://127.0.0.1:1").unwrap());
        let client = JupiterClient::new(rpc, None).unwrap();
        let quote = Quote {
            input_mint: "a".to_string(),
            output_mint: "b".to_string(),
            in_amount: 1,
            out_amount: 1,
            slippage_bps: 250,
            price_impact_pct: 0.0,
            raw: Value::Null,
        };
        let err = client.execute_swap(&quote, "wallet", true).await.unwrap_err();
        assert!(matches!(err, TraderError::MissingConfig(_)));
    }
}
