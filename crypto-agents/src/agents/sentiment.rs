use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use colored::*;
use common::config::SentimentSettings;
use common::Result;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info, warn};
use trader_solana::MarketDataClient;

use super::{Agent, RunFlag};
use crate::api::social_media::{collect_posts, PostSource, RetryPolicy, SocialPost};
use crate::api::voice::Announcer;
use crate::sentiment::{
    format_announcement, should_announce, volatility, PostArchive, SentimentChange,
    SentimentHistory, SentimentModel, SentimentScorer,
};

#[derive(Clone)]
pub struct SentimentDeps {
    pub source: Arc<dyn PostSource>,
    pub model: Arc<dyn SentimentModel>,
    pub announcer: Arc<dyn Announcer>,
    /// OHLCV feed for the volatility token; volatility is 0 without it.
    pub market: Option<Arc<dyn MarketDataClient>>,
}

/// Result of one keyword's sentiment run.
#[derive(Debug, Clone, Serialize)]
pub struct SentimentReport {
    pub token: String,
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    pub num_posts: usize,
    pub change: Option<SentimentChange>,
    pub volatility: f64,
    pub announced: bool,
    pub message: String,
}

/// Collects social posts for the configured tokens, scores them and
/// announces notable moves.
pub struct SentimentAgent {
    active: RunFlag,
    settings: SentimentSettings,
    source: Arc<dyn PostSource>,
    scorer: SentimentScorer,
    announcer: Arc<dyn Announcer>,
    market: Option<Arc<dyn MarketDataClient>>,
    history: SentimentHistory,
    archive: PostArchive,
    retry: RetryPolicy,
    last_reports: Mutex<Vec<SentimentReport>>,
}

impl SentimentAgent {
    pub fn new(deps: SentimentDeps, settings: SentimentSettings) -> Self {
        let scorer = SentimentScorer::new(deps.model, settings.model_weight, settings.lexicon_weight);
        Self {
            active: RunFlag::default(),
            history: SentimentHistory::new(&settings.history_file),
            archive: PostArchive::new(&settings.data_folder),
            source: deps.source,
            scorer,
            announcer: deps.announcer,
            market: deps.market,
            settings,
            retry: RetryPolicy::default(),
            last_reports: Mutex::new(Vec::new()),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn history(&self) -> &SentimentHistory {
        &self.history
    }

    /// Reports of the latest cycle, one per analyzed keyword.
    pub fn last_reports(&self) -> Vec<SentimentReport> {
        self.last_reports.lock().clone()
    }

    /// Fetch and archive posts for one keyword.
    pub async fn collect(&self, token: &str) -> Result<Vec<SocialPost>> {
        info!("🔍 Searching posts for {}", token);
        let posts = collect_posts(
            self.source.as_ref(),
            token,
            self.settings.tweets_per_run,
            &self.settings.ignore_list,
            self.retry,
        )
        .await?;

        if let Err(e) = self.archive.save_posts(token, &posts) {
            error!("❌ Failed to archive posts for {}: {}", token, e);
        }
        Ok(posts)
    }

    async fn current_volatility(&self) -> f64 {
        let Some(market) = &self.market else {
            return 0.0;
        };
        match market.collect_token_data(&self.settings.volatility_token).await {
            Ok(candles) => volatility(&candles),
            Err(e) => {
                warn!("⚠️ Could not fetch volatility data: {}", e);
                0.0
            }
        }
    }

    /// Score one keyword's `posts`, persist the result and announce it.
    pub async fn analyze_and_announce(
        &self,
        token: &str,
        posts: &[SocialPost],
        volatility: f64,
    ) -> Result<Option<SentimentReport>> {
        let texts: Vec<String> = posts
            .iter()
            .map(|p| p.cleaned_text.clone())
            .filter(|t| !t.is_empty())
            .collect();
        if texts.is_empty() {
            warn!("No posts to analyze for {}", token);
            return Ok(None);
        }

        let score = self.scorer.analyze(&texts, &self.settings.source, 0.0).await?;

        if let Err(e) = self.history.save(score, texts.len()) {
            error!("❌ Failed to save sentiment history: {}", e);
        }
        let change = match self.history.get_change() {
            Ok(change) => change,
            Err(e) => {
                error!("❌ Failed to read sentiment history: {}", e);
                None
            }
        };

        let message = format_announcement(score, texts.len(), change.as_ref());
        let important = should_announce(
            score,
            change.as_ref(),
            volatility,
            self.settings.announce_change_pct,
        );

        if let Err(e) = self.announcer.announce(&message, important).await {
            error!("❌ Announcement failed: {}", e);
        }

        Ok(Some(SentimentReport {
            token: token.to_string(),
            timestamp: Utc::now(),
            score,
            num_posts: texts.len(),
            change,
            volatility,
            announced: important,
            message,
        }))
    }

    /// Analyze every tracked keyword in turn. A keyword that fails is logged
    /// and skipped.
    pub async fn run_sentiment_cycle(&self) -> Result<Vec<SentimentReport>> {
        println!("\n{}", "🎭 Running sentiment analysis...".bright_cyan());
        let volatility = self.current_volatility().await;

        let mut reports = Vec::new();
        for token in &self.settings.tokens {
            println!("{} {}", "🔍 Analyzing sentiment for".cyan(), token);
            let analyzed = match self.collect(token).await {
                Ok(posts) => self.analyze_and_announce(token, &posts, volatility).await,
                Err(e) => Err(e),
            };
            match analyzed {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {}
                Err(e) => error!("❌ Error analyzing {}: {}", token, e),
            }
        }

        println!("{}", "✨ Sentiment analysis complete!".green());
        *self.last_reports.lock() = reports.clone();
        Ok(reports)
    }
}

#[async_trait]
impl Agent for SentimentAgent {
    fn name(&self) -> &str {
        "Sentiment Agent"
    }

    fn is_active(&self) -> bool {
        self.active.is_set()
    }

    fn set_active(&self, active: bool) {
        self.active.set(active);
    }

    fn generation(&self) -> u64 {
        self.active.generation()
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.settings.check_interval_minutes * 60)
    }

    async fn run_cycle(&self) -> Result<()> {
        self.run_sentiment_cycle().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::{clean_text, ClassProbabilities};
    use common::AgentError;

    struct FixedSource;

    #[async_trait]
    impl PostSource for FixedSource {
        async fn search(&self, query: &str, _: usize) -> Result<Vec<SocialPost>> {
            if query == "broken" {
                return Err(AgentError::ExternalApiError("rate limited".to_string()));
            }
            let text = format!("{} is great, amazing gains https://t.co/x", query);
            Ok(vec![SocialPost {
                id: format!("{}-1", query),
                created_at: "2024-01-01T00:00:00Z".to_string(),
                author_name: "trader".to_string(),
                author_id: "42".to_string(),
                cleaned_text: clean_text(&text),
                text,
                retweet_count: 0,
                like_count: 3,
                reply_count: 0,
                quote_count: 0,
                language: "en".to_string(),
            }])
        }
    }

    struct Bullish;

    #[async_trait]
    impl SentimentModel for Bullish {
        async fn classify(&self, texts: &[String]) -> Result<Vec<ClassProbabilities>> {
            Ok(texts
                .iter()
                .map(|_| ClassProbabilities {
                    negative: 0.0,
                    neutral: 0.0,
                    positive: 1.0,
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingAnnouncer {
        messages: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait]
    impl Announcer for RecordingAnnouncer {
        async fn announce(&self, message: &str, important: bool) -> Result<()> {
            self.messages.lock().push((message.to_string(), important));
            Ok(())
        }
    }

    fn agent(dir: &tempfile::TempDir, tokens: &[&str], announcer: Arc<RecordingAnnouncer>) -> SentimentAgent {
        let settings = SentimentSettings {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            data_folder: dir.path().join("posts").display().to_string(),
            history_file: dir.path().join("history.csv").display().to_string(),
            ..SentimentSettings::default()
        };
        let deps = SentimentDeps {
            source: Arc::new(FixedSource),
            model: Arc::new(Bullish),
            announcer,
            market: None,
        };
        SentimentAgent::new(deps, settings).with_retry_policy(RetryPolicy {
            attempts: 1,
            rate_limit_pause: Duration::ZERO,
            backoff_unit: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn cycle_scores_archives_and_announces() {
        let dir = tempfile::tempdir().unwrap();
        let announcer = Arc::new(RecordingAnnouncer::default());
        let agent = agent(&dir, &["solana", "bitcoin"], announcer.clone());

        let reports = agent.run_sentiment_cycle().await.unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].token, "solana");
        assert_eq!(reports[1].token, "bitcoin");
        assert!(reports.iter().all(|r| r.num_posts == 1 && r.score > 0.6 && r.announced));
        assert!(reports[0].change.is_none());

        assert!(dir.path().join("posts").join("solana_tweets.csv").exists());
        assert!(dir.path().join("posts").join("bitcoin_tweets.csv").exists());
        assert_eq!(agent.history().load().unwrap().len(), 2);
        assert_eq!(agent.last_reports().len(), 2);

        let messages = announcer.messages.lock();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|(text, important)| text.contains("very positive") && *important));
    }

    #[tokio::test]
    async fn second_cycle_reports_change() {
        let dir = tempfile::tempdir().unwrap();
        let announcer = Arc::new(RecordingAnnouncer::default());
        let agent = agent(&dir, &["solana"], announcer);

        agent.run_sentiment_cycle().await.unwrap();
        let reports = agent.run_sentiment_cycle().await.unwrap();
        let change = reports[0].change.unwrap();
        assert!(change.percent_change.abs() < 1e-9);
        assert_eq!(agent.history().load().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failing_keyword_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let announcer = Arc::new(RecordingAnnouncer::default());
        let agent = agent(&dir, &["broken", "solana"], announcer.clone());

        let reports = agent.run_sentiment_cycle().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].token, "solana");
        assert_eq!(announcer.messages.lock().len(), 1);
        assert_eq!(agent.history().load().unwrap().len(), 1);
    }
}
