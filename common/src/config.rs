//! Runtime settings.
//!
//! Defaults live in the `Default` impls below. `Settings::load` layers an
//! optional TOML file and `AGENTS__SECTION__KEY` environment overrides on top.

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

pub const DEFAULT_CONFIG_FILE: &str = "agents.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON object with action, confidence and reasoning.
    Structured,
    /// Action on the first line, a confidence line, free reasoning.
    Text,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub trading: TradingSettings,
    pub sentiment: SentimentSettings,
    pub model: ModelSettings,
    pub monitor: MonitorSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingSettings {
    pub usd_size: f64,
    pub max_usd_order_size: f64,
    pub max_position_fraction: f64,
    pub slippage_bps: u16,
    pub min_confidence: u8,
    pub tx_sleep_secs: u64,
    pub cycle_interval_minutes: u64,
    pub portfolio_csv: String,
    pub excluded_tokens: Vec<String>,
    pub base_mint: String,
    pub base_decimals: u8,
    pub ohlcv_lookback_days: i64,
    pub ohlcv_timeframe: String,
}

impl Default for TradingSettings {
    fn default() -> Self {
        Self {
            usd_size: 100.0,
            max_usd_order_size: 50.0,
            max_position_fraction: 0.1,
            slippage_bps: 250,
            min_confidence: 60,
            tx_sleep_secs: 15,
            cycle_interval_minutes: 15,
            portfolio_csv: "data/portfolio.csv".to_string(),
            excluded_tokens: vec![USDC_MINT.to_string(), SOL_MINT.to_string()],
            base_mint: SOL_MINT.to_string(),
            base_decimals: 9,
            ohlcv_lookback_days: 3,
            ohlcv_timeframe: "1H".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentSettings {
    pub tokens: Vec<String>,
    pub tweets_per_run: usize,
    pub check_interval_minutes: u64,
    pub data_folder: String,
    pub history_file: String,
    pub audio_dir: String,
    pub ignore_list: Vec<String>,
    pub source: String,
    pub model_weight: f64,
    pub lexicon_weight: f64,
    pub hf_model: String,
    pub batch_size: usize,
    pub max_length: usize,
    pub announce_change_pct: f64,
    pub volatility_token: String,
    pub user_agent: String,
    pub voice: VoiceSettings,
}

impl Default for SentimentSettings {
    fn default() -> Self {
        Self {
            tokens: vec![
                "solana".to_string(),
                "bitcoin".to_string(),
                "ethereum".to_string(),
            ],
            tweets_per_run: 30,
            check_interval_minutes: 15,
            data_folder: "data/sentiment".to_string(),
            history_file: "data/sentiment_history.csv".to_string(),
            audio_dir: "audio".to_string(),
            ignore_list: ["t.co", "discord", "join", "telegram", "discount", "pay"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            source: "twitter".to_string(),
            model_weight: 0.7,
            lexicon_weight: 0.3,
            hf_model: "finiteautomata/bertweet-base-sentiment-analysis".to_string(),
            batch_size: 32,
            max_length: 128,
            announce_change_pct: 5.0,
            volatility_token: SOL_MINT.to_string(),
            user_agent: "crypto-agents/0.1".to_string(),
            voice: VoiceSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub enabled: bool,
    pub model: String,
    pub voice: String,
    pub speed: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "tts-1".to_string(),
            voice: "nova".to_string(),
            speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub output_format: OutputFormat,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_retries: 3,
            retry_delay_secs: 1,
            output_format: OutputFormat::Structured,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub history_limit: usize,
    pub cpu_degraded_pct: f32,
    pub memory_degraded_pct: f32,
    pub latency_degraded_ms: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            history_limit: 1000,
            cpu_degraded_pct: 90.0,
            memory_degraded_pct: 90.0,
            latency_degraded_ms: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Settings {
    /// Load settings from `path` (if it exists) plus `AGENTS__*` overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix("AGENTS").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn load_default() -> Result<Self> {
        Self::load(DEFAULT_CONFIG_FILE)
    }
}
