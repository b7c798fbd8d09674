use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::birdeye::types::{Candle, OhlcvResponse};
use crate::error::{Result, TraderError};
use crate::traits::MarketDataClient;

const BASE_URL: &str = "https://public-api.birdeye.so";

pub struct BirdeyeClient {
    client: reqwest::Client,
    base_url: String,
    lookback_days: i64,
    timeframe: String,
}

impl BirdeyeClient {
    pub fn new(api_key: &str, lookback_days: i64, timeframe: &str) -> Result<Self> {
        let headers = {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert(
                "X-API-KEY",
                api_key
                    .parse::<reqwest::header::HeaderValue>()
                    .map_err(|_| TraderError::MissingConfig("BIRDEYE_API_KEY is not a valid header".to_string()))?,
            );
            headers.insert("x-chain", reqwest::header::HeaderValue::from_static("solana"));
            headers.insert("accept", reqwest::header::HeaderValue::from_static("application/json"));
            headers
        };

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            lookback_days,
            timeframe: timeframe.to_string(),
        })
    }

    pub fn from_env(lookback_days: i64, timeframe: &str) -> Result<Self> {
        let api_key = std::env::var("BIRDEYE_API_KEY")
            .map_err(|_| TraderError::MissingConfig("BIRDEYE_API_KEY not set".to_string()))?;
        Self::new(&api_key, lookback_days, timeframe)
    }
}

#[async_trait]
impl MarketDataClient for BirdeyeClient {
    async fn collect_token_data(&self, token: &str) -> Result<Vec<Candle>> {
        let time_to = Utc::now().timestamp();
        let time_from = time_to - self.lookback_days * 24 * 60 * 60;
        let url = format!(
            "{}/defi/ohlcv?address={}&type={}&time_from={}&time_to={}",
            self.base_url, token, self.timeframe, time_from, time_to
        );

        debug!("Fetching OHLCV for {}", token);
        let response: OhlcvResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !response.success {
            return Err(TraderError::Birdeye(
                response.message.unwrap_or_else(|| "request unsuccessful".to_string()),
            ));
        }

        let candles = response
            .data
            .map(|d| d.items.iter().filter_map(|i| i.to_candle()).collect())
            .unwrap_or_default();
        Ok(candles)
    }
}
