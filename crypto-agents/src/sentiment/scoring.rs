use std::sync::Arc;

use async_trait::async_trait;
use common::Result;

use super::lexicon::LexiconScorer;

/// Three-class probabilities for one text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassProbabilities {
    pub negative: f64,
    pub neutral: f64,
    pub positive: f64,
}

impl ClassProbabilities {
    pub fn polarity(&self) -> f64 {
        self.positive - self.negative
    }
}

/// A pretrained classifier producing neg/neu/pos probabilities per text.
#[async_trait]
pub trait SentimentModel: Send + Sync {
    async fn classify(&self, texts: &[String]) -> Result<Vec<ClassProbabilities>>;
}

/// Per-minute decay constant for a post source.
pub fn decay_rate(source: &str) -> f64 {
    match source {
        "twitter" => 0.2,
        "reddit" => 0.15,
        "news" => 0.1,
        _ => 0.2,
    }
}

pub fn apply_decay(score: f64, elapsed_minutes: f64, source: &str) -> f64 {
    score * (-decay_rate(source) * elapsed_minutes.max(0.0)).exp()
}

/// Blends the classifier polarity with the lexicon compound score.
pub struct SentimentScorer {
    model: Arc<dyn SentimentModel>,
    lexicon: LexiconScorer,
    model_weight: f64,
    lexicon_weight: f64,
}

impl SentimentScorer {
    pub fn new(model: Arc<dyn SentimentModel>, model_weight: f64, lexicon_weight: f64) -> Self {
        Self {
            model,
            lexicon: LexiconScorer::new(),
            model_weight,
            lexicon_weight,
        }
    }

    /// Score already-cleaned texts in [-1, 1], decayed by `elapsed_minutes`.
    pub async fn analyze(&self, texts: &[String], source: &str, elapsed_minutes: f64) -> Result<f64> {
        if texts.is_empty() {
            return Ok(0.0);
        }

        let probabilities = self.model.classify(texts).await?;
        let model_score = if probabilities.is_empty() {
            0.0
        } else {
            probabilities.iter().map(|p| p.polarity()).sum::<f64>() / probabilities.len() as f64
        };
        let lexicon_score = self.lexicon.mean(texts);

        let raw = (self.model_weight * model_score + self.lexicon_weight * lexicon_score).clamp(-1.0, 1.0);
        Ok(apply_decay(raw, elapsed_minutes, source))
    }
}
