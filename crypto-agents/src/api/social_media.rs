use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use common::env::get_env_var;
use common::{AgentError, Result};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::sentiment::clean_text;

const SEARCH_URL: &str = "https://api.twitter.com/2/tweets/search/recent";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialPost {
    pub id: String,
    pub created_at: String,
    pub author_name: String,
    pub author_id: String,
    pub text: String,
    pub cleaned_text: String,
    pub retweet_count: u64,
    pub like_count: u64,
    pub reply_count: u64,
    pub quote_count: u64,
    pub language: String,
}

/// A searchable feed of social posts. One call, no retries.
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SocialPost>>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Pause before the first request.
    pub rate_limit_pause: Duration,
    /// Backoff after failed attempt `n` is `n * backoff_unit`.
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            rate_limit_pause: Duration::from_secs(1),
            backoff_unit: Duration::from_secs(5),
        }
    }
}

/// Search `keyword` with retries and drop posts hitting the ignore list.
pub async fn collect_posts(
    source: &dyn PostSource,
    keyword: &str,
    limit: usize,
    ignore_list: &[String],
    policy: RetryPolicy,
) -> Result<Vec<SocialPost>> {
    sleep(policy.rate_limit_pause).await;

    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    let posts = loop {
        attempt += 1;
        match source.search(keyword, limit).await {
            Ok(posts) => break posts,
            Err(e) if attempt < attempts => {
                warn!("⚠️ Search error for {} (attempt {}/{}): {}", keyword, attempt, attempts, e);
                sleep(policy.backoff_unit * attempt).await;
            }
            Err(e) => return Err(e),
        }
    };

    let ignore: Vec<String> = ignore_list.iter().map(|s| s.to_lowercase()).collect();
    let total = posts.len();
    let kept: Vec<SocialPost> = posts
        .into_iter()
        .filter(|p| {
            let text = p.cleaned_text.to_lowercase();
            let raw = p.text.to_lowercase();
            !ignore.iter().any(|term| text.contains(term) || raw.contains(term))
        })
        .collect();

    info!("✅ Found {} posts for {} ({} kept)", total, keyword, kept.len());
    Ok(kept)
}

/// Twitter API v2 recent search.
pub struct SocialMediaClient {
    client: reqwest::Client,
    bearer_token: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<TweetData>,
    #[serde(default)]
    includes: Option<Includes>,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    author_id: Option<String>,
    #[serde(default)]
    lang: Option<String>,
    #[serde(default)]
    public_metrics: Option<PublicMetrics>,
}

#[derive(Debug, Default, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    reply_count: u64,
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    quote_count: u64,
}

#[derive(Debug, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<UserData>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
    name: String,
}

impl SocialMediaClient {
    pub fn new(bearer_token: &str, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .map_err(|e| AgentError::ExternalApiError(e.to_string()))?;

        Ok(Self {
            client,
            bearer_token: bearer_token.to_string(),
        })
    }

    pub fn from_env(user_agent: &str) -> Result<Self> {
        let token = get_env_var("TWITTER_BEARER_TOKEN")?;
        Self::new(&token, user_agent)
    }
}

fn parse_search_response(body: SearchResponse) -> Vec<SocialPost> {
    let users: HashMap<String, String> = body
        .includes
        .map(|i| i.users.into_iter().map(|u| (u.id, u.name)).collect())
        .unwrap_or_default();

    body.data
        .into_iter()
        .map(|tweet| {
            let metrics = tweet.public_metrics.unwrap_or_default();
            let author_id = tweet.author_id.unwrap_or_default();
            SocialPost {
                author_name: users.get(&author_id).cloned().unwrap_or_default(),
                cleaned_text: clean_text(&tweet.text),
                id: tweet.id,
                created_at: tweet.created_at.unwrap_or_default(),
                author_id,
                text: tweet.text,
                retweet_count: metrics.retweet_count,
                like_count: metrics.like_count,
                reply_count: metrics.reply_count,
                quote_count: metrics.quote_count,
                language: tweet.lang.unwrap_or_else(|| "unknown".to_string()),
            }
        })
        .collect()
}

#[async_trait]
impl PostSource for SocialMediaClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SocialPost>> {
        info!("🔄 Searching posts for {}", query);
        // the endpoint only accepts 10..=100
        let max_results = limit.clamp(10, 100).to_string();

        let response = self
            .client
            .get(SEARCH_URL)
            .bearer_auth(&self.bearer_token)
            .query(&[
                ("query", query),
                ("max_results", max_results.as_str()),
                ("tweet.fields", "created_at,public_metrics,lang,author_id"),
                ("expansions", "author_id"),
                ("user.fields", "name"),
            ])
            .send()
            .await
            .map_err(|e| AgentError::ExternalApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AgentError::ExternalApiError(format!(
                "Twitter search returned {}",
                response.status()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AgentError::ParseError(e.to_string()))?;

        let mut posts = parse_search_response(body);
        posts.truncate(limit);
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn post(id: &str, text: &str) -> SocialPost {
        SocialPost {
            id: id.to_string(),
            created_at: String::new(),
            author_name: String::new(),
            author_id: String::new(),
            text: text.to_string(),
            cleaned_text: clean_text(text),
            retweet_count: 0,
            like_count: 0,
            reply_count: 0,
            quote_count: 0,
            language: "en".to_string(),
        }
    }

    struct FlakySource {
        failures: u32,
        calls: AtomicU32,
        posts: Vec<SocialPost>,
    }

    #[async_trait]
    impl PostSource for FlakySource {
        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SocialPost>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(AgentError::ExternalApiError("rate limited".to_string()))
            } else {
                Ok(self.posts.clone())
            }
        }
    }

    fn instant() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            rate_limit_pause: Duration::ZERO,
            backoff_unit: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn retries_then_filters_ignored_terms() {
        let source = FlakySource {
            failures: 2,
            calls: AtomicU32::new(0),
            posts: vec![
                post("1", "solana looking strong"),
                post("2", "Join our Telegram for signals"),
                post("3", "free airdrop https://t.co/abc"),
            ],
        };
        let ignore = vec!["telegram".to_string(), "t.co".to_string()];

        let posts = collect_posts(&source, "solana", 30, &ignore, instant()).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1"]);
    }

    #[tokio::test]
    async fn gives_up_after_three_attempts() {
        let source = FlakySource {
            failures: 5,
            calls: AtomicU32::new(0),
            posts: vec![],
        };
        assert!(collect_posts(&source, "bitcoin", 30, &[], instant()).await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn maps_authors_and_metrics() {
        let body: SearchResponse = serde_json::from_value(serde_json::json!({
            "data": [{
                "id": "99",
                "text": "@whale bullish on $SOL https://t.co/x",
                "created_at": "2024-05-01T12:00:00.000Z",
                "author_id": "7",
                "lang": "en",
                "public_metrics": { "retweet_count": 3, "reply_count": 1, "like_count": 10, "quote_count": 0 }
            }],
            "includes": { "users": [{ "id": "7", "name": "Whale Watcher", "username": "ww" }] }
        }))
        .unwrap();

        let posts = parse_search_response(body);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].author_name, "Whale Watcher");
        assert_eq!(posts[0].like_count, 10);
        assert_eq!(posts[0].cleaned_text, "bullish on $SOL");
    }
}
