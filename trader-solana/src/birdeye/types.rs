use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Deserialize)]
pub struct OhlcvResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<OhlcvData>,
}

#[derive(Debug, Deserialize)]
pub struct OhlcvData {
    #[serde(default)]
    pub items: Vec<OhlcvItem>,
}

#[derive(Debug, Deserialize)]
pub struct OhlcvItem {
    #[serde(rename = "unixTime")]
    pub unix_time: i64,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
    #[serde(default)]
    pub v: f64,
}

impl OhlcvItem {
    pub fn to_candle(&self) -> Option<Candle> {
        let timestamp = Utc.timestamp_opt(self.unix_time, 0).single()?;
        Some(Candle {
            timestamp,
            open: self.o,
            high: self.h,
            low: self.l,
            close: self.c,
            volume: self.v,
        })
    }
}
