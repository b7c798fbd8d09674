use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::config::OutputFormat;
use common::{AgentError, CompletionClient, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use trader_solana::Candle;

use crate::models::PortfolioPosition;

pub const NO_MARKET_DATA: &str = "No market data available";

const SYSTEM_PROMPT: &str = "You are the CopyBot Agent. Analyze portfolio positions and market data.";

const ANALYSIS_PROMPT: &str = r#"
You are the CopyBot Agent 🤖

Your task is to analyze the current copybot portfolio positions and market data to identify which positions deserve larger allocations.

Data provided:
1. Current copybot portfolio position and its performance
2. OHLCV market data for the position
3. Technical indicators (MA20, MA40, ABOVE OR BELOW)

Analysis Criteria:
1. Position performance metrics
2. Price action and momentum
3. Volume analysis
4. Risk/reward ratio
5. Market conditions

{portfolio_data}

{market_data}

{format_instructions}

Remember:
- Judge the position size relative to the rest of the portfolio, not in absolute terms.
- Look for high-conviction setups.
"#;

const TEXT_FORMAT: &str = r#"Respond in this exact format:
1. First line must be one of: BUY, SELL, or NOTHING (in caps)
2. Then explain your reasoning, including:
   - Position analysis
   - Technical analysis
   - Volume profile
   - Risk assessment
   - Market conditions
   - Confidence level (as a percentage, e.g. 75%)"#;

const STRUCTURED_FORMAT: &str = r#"Respond with a single JSON object and nothing else:
{"action": "BUY" | "SELL" | "NOTHING", "confidence": <integer 0-100>, "reasoning": "<position, technical, volume, risk and market analysis>"}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Nothing,
}

impl FromStr for Action {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Action::Buy),
            "SELL" => Ok(Action::Sell),
            "NOTHING" => Ok(Action::Nothing),
            other => Err(AgentError::ParseError(format!("unknown action: {}", other))),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Nothing => "NOTHING",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub token: String,
    pub action: Action,
    pub confidence: u8,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct StructuredReply {
    action: String,
    confidence: Value,
    #[serde(default)]
    reasoning: String,
}

/// Parse a JSON reply, tolerating a surrounding ```json fence or prose.
pub fn parse_structured(token: &str, reply: &str) -> Result<Recommendation> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &reply[s..=e],
        _ => return Err(AgentError::ParseError("no JSON object in reply".to_string())),
    };

    let parsed: StructuredReply = serde_json::from_str(json)
        .map_err(|e| AgentError::ParseError(format!("malformed recommendation: {}", e)))?;

    let action: Action = parsed.action.parse()?;
    let confidence = parsed
        .confidence
        .as_u64()
        .filter(|c| *c <= 100)
        .ok_or_else(|| AgentError::ParseError(format!("confidence out of range: {}", parsed.confidence)))?;

    Ok(Recommendation {
        token: token.to_string(),
        action,
        confidence: confidence as u8,
        reasoning: parsed.reasoning.trim().to_string(),
        timestamp: Utc::now(),
    })
}

/// Parse the line protocol: action line, free reasoning, a confidence line.
pub fn parse_text(token: &str, reply: &str) -> Result<Recommendation> {
    let lines: Vec<&str> = reply.lines().collect();
    let Some(action_idx) = lines.iter().position(|l| !l.trim().is_empty()) else {
        return Err(AgentError::AIError("empty model reply".to_string()));
    };

    let action_word = lines[action_idx]
        .trim()
        .trim_matches(|c: char| !c.is_ascii_alphabetic());
    let action = action_word.parse().unwrap_or(Action::Nothing);

    let reasoning = lines[action_idx + 1..].join("\n").trim().to_string();

    Ok(Recommendation {
        token: token.to_string(),
        action,
        confidence: parse_confidence(&lines),
        reasoning: if reasoning.is_empty() {
            "No detailed reasoning provided".to_string()
        } else {
            reasoning
        },
        timestamp: Utc::now(),
    })
}

/// Last line mentioning "confidence" wins; digits are read as a percentage.
/// A mention without usable digits gives 50, no mention at all gives 0.
pub fn parse_confidence(lines: &[&str]) -> u8 {
    let mut confidence = 0;
    for line in lines {
        if !line.to_lowercase().contains("confidence") {
            continue;
        }
        let digits: String = line.chars().filter(|c| c.is_ascii_digit()).collect();
        confidence = match digits.parse::<u64>() {
            Ok(value) if value <= 100 => value as u8,
            _ => 50,
        };
    }
    confidence
}

fn moving_average(closes: &[f64], end: usize, window: usize) -> Option<f64> {
    if end + 1 < window {
        return None;
    }
    let slice = &closes[end + 1 - window..=end];
    Some(slice.iter().sum::<f64>() / window as f64)
}

/// OHLCV table annotated with MA20/MA40 and the close's position relative to each.
pub fn format_market_data(candles: &[Candle]) -> String {
    if candles.is_empty() {
        return NO_MARKET_DATA.to_string();
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let mut out = String::from(
        "timestamp | open | high | low | close | volume | MA20 | MA40 | vs MA20 | vs MA40\n",
    );

    let label = |close: f64, ma: Option<f64>| match ma {
        Some(ma) if close > ma => "ABOVE".to_string(),
        Some(_) => "BELOW".to_string(),
        None => "-".to_string(),
    };
    let number = |ma: Option<f64>| ma.map(|v| format!("{:.8}", v)).unwrap_or_else(|| "-".to_string());

    for (i, candle) in candles.iter().enumerate() {
        let ma20 = moving_average(&closes, i, 20);
        let ma40 = moving_average(&closes, i, 40);
        out.push_str(&format!(
            "{} | {:.8} | {:.8} | {:.8} | {:.8} | {:.2} | {} | {} | {} | {}\n",
            candle.timestamp.format("%Y-%m-%d %H:%M"),
            candle.open,
            candle.high,
            candle.low,
            candle.close,
            candle.volume,
            number(ma20),
            number(ma40),
            label(candle.close, ma20),
            label(candle.close, ma40),
        ));
    }
    out
}

pub fn format_position(position: &PortfolioPosition) -> String {
    format!(
        "Mint Address | name | Amount | USD Value\n{} | {} | {} | {:.2}",
        position.mint_address, position.name, position.amount, position.usd_value
    )
}

pub fn build_prompt(position: &PortfolioPosition, candles: &[Candle], format: OutputFormat) -> String {
    let instructions = match format {
        OutputFormat::Structured => STRUCTURED_FORMAT,
        OutputFormat::Text => TEXT_FORMAT,
    };
    ANALYSIS_PROMPT
        .replace("{portfolio_data}", &format_position(position))
        .replace("{market_data}", &format_market_data(candles))
        .replace("{format_instructions}", instructions)
}

/// Turns one position plus its market data into a recommendation.
pub struct RecommendationEngine {
    client: Arc<dyn CompletionClient>,
    format: OutputFormat,
}

impl RecommendationEngine {
    pub fn new(client: Arc<dyn CompletionClient>, format: OutputFormat) -> Self {
        Self { client, format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub async fn recommend(
        &self,
        position: &PortfolioPosition,
        candles: &[Candle],
        temperature: f32,
    ) -> Result<Recommendation> {
        let prompt = build_prompt(position, candles, self.format);
        debug!("Prompt for {}:\n{}", position.mint_address, prompt);

        let reply = self
            .client
            .generate_response(SYSTEM_PROMPT, &prompt, temperature)
            .await?;
        if reply.trim().is_empty() {
            return Err(AgentError::AIError("empty model reply".to_string()));
        }

        match self.format {
            OutputFormat::Structured => parse_structured(&position.mint_address, &reply),
            OutputFormat::Text => parse_text(&position.mint_address, &reply),
        }
    }
}
