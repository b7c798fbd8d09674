pub mod archive;
pub mod history;
pub mod lexicon;
pub mod scoring;

use lazy_static::lazy_static;
use regex::Regex;
use trader_solana::Candle;

pub use archive::PostArchive;
pub use history::{SentimentChange, SentimentHistory, SentimentHistoryEntry};
pub use lexicon::LexiconScorer;
pub use scoring::{apply_decay, decay_rate, ClassProbabilities, SentimentModel, SentimentScorer};

lazy_static! {
    static ref URL_RE: Regex = Regex::new(r"http\S+").unwrap();
    static ref MENTION_RE: Regex = Regex::new(r"@\w+").unwrap();
    static ref HASHTAG_RE: Regex = Regex::new(r"#\w+").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

const BASE_THRESHOLD: f64 = 0.6;

/// Strip URLs, mentions and hashtags, then collapse whitespace.
pub fn clean_text(text: &str) -> String {
    let text = URL_RE.replace_all(text, "");
    let text = MENTION_RE.replace_all(&text, "");
    let text = HASHTAG_RE.replace_all(&text, "");
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

pub fn sentiment_label(score: f64) -> &'static str {
    if score > 0.3 {
        "very positive"
    } else if score > 0.0 {
        "slightly positive"
    } else if score > -0.3 {
        "slightly negative"
    } else {
        "very negative"
    }
}

/// Voice threshold scaled by market volatility, bounded to [0.4, 0.85].
pub fn dynamic_threshold(volatility: f64) -> f64 {
    (BASE_THRESHOLD * (1.0 + volatility / 20.0)).clamp(0.4, 0.85)
}

/// Standard deviation of close-to-close percent returns.
pub fn volatility(candles: &[Candle]) -> f64 {
    let returns: Vec<f64> = candles
        .windows(2)
        .filter(|w| w[0].close != 0.0)
        .map(|w| (w[1].close - w[0].close) / w[0].close * 100.0)
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    variance.sqrt()
}

pub fn should_announce(score: f64, change: Option<&SentimentChange>, volatility: f64, change_limit: f64) -> bool {
    score.abs() > dynamic_threshold(volatility)
        || change.map(|c| c.percent_change.abs() > change_limit).unwrap_or(false)
}

/// Human readable summary of one scoring run.
pub fn format_announcement(score: f64, num_posts: usize, change: Option<&SentimentChange>) -> String {
    let mut message = format!(
        "Sentiment Analysis: After analyzing {} tweets, the crypto sentiment is {} with a score of {:.1} out of 100",
        num_posts,
        sentiment_label(score),
        history::to_percent(score)
    );

    if let Some(change) = change {
        let magnitude = change.percent_change.abs();
        let direction = if change.percent_change > 0.0 { "up" } else { "down" };
        message.push_str(&format!(
            ". Sentiment has moved {} {:.1} points over the past {} minutes",
            direction, magnitude, change.elapsed_minutes as i64
        ));
        if magnitude > 10.0 {
            message.push_str(&format!(" - this is a significant {:.1}% change!", magnitude));
        } else if magnitude > 5.0 {
            message.push_str(&format!(" - a moderate {:.1}% shift", magnitude));
        } else {
            message.push_str(&format!(" - a small {:.1}% change", magnitude));
        }
    }

    message.push('.');
    message
}
