use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TraderError};

/// A Jupiter v6 quote. The untouched response is kept in `raw` because the
/// swap endpoint wants it echoed back verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: u64,
    pub out_amount: u64,
    pub slippage_bps: u16,
    pub price_impact_pct: f64,
    pub raw: Value,
}

impl Quote {
    pub fn from_response(raw: Value) -> Result<Self> {
        if let Some(err) = raw.get("error").and_then(|e| e.as_str()) {
            return Err(TraderError::Jupiter(err.to_string()));
        }

        let text = |key: &str| -> Result<String> {
            raw.get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .ok_or_else(|| TraderError::InvalidResponse(format!("quote missing {}", key)))
        };
        let amount = |key: &str| -> Result<u64> {
            text(key)?
                .parse::<u64>()
                .map_err(|e| TraderError::InvalidResponse(format!("quote {}: {}", key, e)))
        };

        Ok(Self {
            input_mint: text("inputMint")?,
            output_mint: text("outputMint")?,
            in_amount: amount("inAmount")?,
            out_amount: amount("outAmount")?,
            slippage_bps: raw.get("slippageBps").and_then(|v| v.as_u64()).unwrap_or(0) as u16,
            price_impact_pct: raw
                .get("priceImpactPct")
                .and_then(|v| v.as_str())
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(0.0),
            raw,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest<'a> {
    pub quote_response: &'a Value,
    pub user_public_key: &'a str,
    pub wrap_and_unwrap_sol: bool,
    pub use_shared_accounts: bool,
    pub dynamic_compute_unit_limit: bool,
    pub prioritization_fee_lamports: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapResponse {
    pub swap_transaction: String,
    #[serde(default)]
    pub last_valid_block_height: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_quote_fields() {
        let raw = json!({
            "inputMint": "So11111111111111111111111111111111111111112",
            "outputMint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
            "inAmount": "1000000000",
            "outAmount": "145230000",
            "slippageBps": 250,
            "priceImpactPct": "0.0012",
            "routePlan": []
        });
        let quote = Quote::from_response(raw).unwrap();
        assert_eq!(quote.in_amount, 1_000_000_000);
        assert_eq!(quote.out_amount, 145_230_000);
        assert_eq!(quote.slippage_bps, 250);
        assert!(quote.raw.get("routePlan").is_some());
    }

    #[test]
    fn error_payload_becomes_jupiter_error() {
        let err = Quote::from_response(json!({ "error": "Could not find any route" })).unwrap_err();
        assert!(matches!(err, TraderError::Jupiter(_)));
    }
}
