use std::time::Duration;

use async_trait::async_trait;
use common::env::get_env_var;
use common::{AgentError, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::sentiment::{ClassProbabilities, SentimentModel};

const INFERENCE_URL: &str = "https://api-inference.huggingface.co/models";

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// Hosted text-classification model on the HuggingFace inference API.
pub struct HuggingFaceModel {
    client: reqwest::Client,
    api_token: String,
    model: String,
    batch_size: usize,
    max_length: usize,
}

impl HuggingFaceModel {
    pub fn new(api_token: &str, model: &str, batch_size: usize, max_length: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AgentError::ExternalApiError(e.to_string()))?;

        Ok(Self {
            client,
            api_token: api_token.to_string(),
            model: model.to_string(),
            batch_size: batch_size.max(1),
            max_length,
        })
    }

    pub fn from_env(model: &str, batch_size: usize, max_length: usize) -> Result<Self> {
        let token = get_env_var("HUGGINGFACE_API_TOKEN")?;
        Self::new(&token, model, batch_size, max_length)
    }

    async fn classify_batch(&self, batch: &[String]) -> Result<Vec<ClassProbabilities>> {
        let url = format!("{}/{}", INFERENCE_URL, self.model);
        let body = json!({
            "inputs": batch,
            "parameters": { "truncation": true, "max_length": self.max_length, "top_k": 3 },
            "options": { "wait_for_model": true }
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::ExternalApiError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::ExternalApiError(format!(
                "inference API returned {}: {}",
                status, text
            )));
        }

        let scores: Vec<Vec<LabelScore>> = response
            .json()
            .await
            .map_err(|e| AgentError::ParseError(e.to_string()))?;

        if scores.len() != batch.len() {
            return Err(AgentError::ParseError(format!(
                "expected {} classifications, got {}",
                batch.len(),
                scores.len()
            )));
        }
        Ok(scores.iter().map(|s| to_probabilities(s)).collect())
    }
}

fn to_probabilities(scores: &[LabelScore]) -> ClassProbabilities {
    let mut probs = ClassProbabilities {
        negative: 0.0,
        neutral: 0.0,
        positive: 0.0,
    };
    for entry in scores {
        match entry.label.to_uppercase().as_str() {
            "NEG" | "NEGATIVE" | "LABEL_0" => probs.negative = entry.score,
            "NEU" | "NEUTRAL" | "LABEL_1" => probs.neutral = entry.score,
            "POS" | "POSITIVE" | "LABEL_2" => probs.positive = entry.score,
            _ => {}
        }
    }
    probs
}

#[async_trait]
impl SentimentModel for HuggingFaceModel {
    async fn classify(&self, texts: &[String]) -> Result<Vec<ClassProbabilities>> {
        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!("Classifying batch of {}", batch.len());
            results.extend(self.classify_batch(batch).await?);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_bertweet_labels() {
        let scores: Vec<LabelScore> = serde_json::from_str(
            r#"[{"label":"POS","score":0.8},{"label":"NEU","score":0.15},{"label":"NEG","score":0.05}]"#,
        )
        .unwrap();
        let probs = to_probabilities(&scores);
        assert_eq!(probs.positive, 0.8);
        assert_eq!(probs.negative, 0.05);
        assert!((probs.polarity() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn maps_generic_labels() {
        let scores = vec![
            LabelScore { label: "LABEL_0".to_string(), score: 0.6 },
            LabelScore { label: "LABEL_2".to_string(), score: 0.1 },
        ];
        let probs = to_probabilities(&scores);
        assert!((probs.polarity() + 0.5).abs() < 1e-12);
    }
}
