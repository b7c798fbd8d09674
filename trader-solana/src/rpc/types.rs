use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TraderError};

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

impl RpcResponse {
    pub fn into_result(self) -> Result<Value> {
        if let Some(err) = self.error {
            return Err(TraderError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        self.result
            .ok_or_else(|| TraderError::InvalidResponse("RPC response without result".to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenBalance {
    /// Raw amount in the token's smallest unit.
    pub amount: u64,
    pub decimals: u8,
}

impl TokenBalance {
    pub fn zero() -> Self {
        Self {
            amount: 0,
            decimals: 0,
        }
    }

    pub fn ui_amount(&self) -> f64 {
        self.amount as f64 / 10f64.powi(self.decimals as i32)
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

/// Sum the parsed token accounts of a `getTokenAccountsByOwner` result.
pub fn parse_token_accounts(result: &Value) -> Result<TokenBalance> {
    let accounts = result
        .get("value")
        .and_then(|v| v.as_array())
        .ok_or_else(|| TraderError::InvalidResponse("missing token account list".to_string()))?;

    let mut balance = TokenBalance::zero();
    for account in accounts {
        let token_amount = account
            .pointer("/account/data/parsed/info/tokenAmount")
            .ok_or_else(|| TraderError::InvalidResponse("token account not jsonParsed".to_string()))?;

        let amount = token_amount
            .get("amount")
            .and_then(|a| a.as_str())
            .and_then(|a| a.parse::<u64>().ok())
            .unwrap_or(0);
        let decimals = token_amount
            .get("decimals")
            .and_then(|d| d.as_u64())
            .unwrap_or(0) as u8;

        balance.amount = balance.amount.saturating_add(amount);
        balance.decimals = decimals;
    }
    Ok(balance)
}

/// `getSignatureStatuses` entry: `Some(true)` when confirmed without error,
/// `Some(false)` when it failed, `None` while still unknown.
pub fn parse_signature_status(result: &Value) -> Option<bool> {
    let status = result.get("value")?.get(0)?;
    if status.is_null() {
        return None;
    }
    if status.get("err").map(|e| !e.is_null()).unwrap_or(false) {
        return Some(false);
    }
    match status.get("confirmationStatus").and_then(|s| s.as_str()) {
        Some("confirmed") | Some("finalized") => Some(true),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token_account(amount: &str, decimals: u64) -> Value {
        json!({
            "pubkey": "acct",
            "account": {
                "data": {
                    "parsed": {
                        "info": {
                            "tokenAmount": {
                                "amount": amount,
                                "decimals": decimals,
                                "uiAmount": 0.0
                            }
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn sums_all_token_accounts() {
        let result = json!({ "value": [token_account("1500000", 6), token_account("500000", 6)] });
        let balance = parse_token_accounts(&result).unwrap();
        assert_eq!(balance.amount, 2_000_000);
        assert_eq!(balance.decimals, 6);
        assert!((balance.ui_amount() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn no_accounts_is_zero() {
        let balance = parse_token_accounts(&json!({ "value": [] })).unwrap();
        assert!(balance.is_zero());
    }

    #[test]
    fn rpc_error_is_surfaced() {
        let response: RpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32602, "message": "Invalid param" }
        }))
        .unwrap();
        match response.into_result() {
            Err(TraderError::Rpc { code, .. }) => assert_eq!(code, -32602),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn signature_status_states() {
        assert_eq!(parse_signature_status(&json!({ "value": [null] })), None);
        assert_eq!(
            parse_signature_status(&json!({ "value": [{ "err": null, "confirmationStatus": "confirmed" }] })),
            Some(true)
        );
        assert_eq!(
            parse_signature_status(&json!({ "value": [{ "err": { "InstructionError": [] }, "confirmationStatus": "processed" }] })),
            Some(false)
        );
    }
}
