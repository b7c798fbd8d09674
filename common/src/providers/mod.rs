pub mod rig_client;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::ModelSettings;
use crate::env::get_env_var;
use crate::error::{AgentError, Result};

pub use rig_client::RigCompletionClient;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/v1";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelProvider {
    OpenAI,
    DeepSeek,
    Ollama,
}

impl FromStr for ModelProvider {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ModelProvider::OpenAI),
            "deepseek" => Ok(ModelProvider::DeepSeek),
            "ollama" => Ok(ModelProvider::Ollama),
            other => Err(AgentError::InvalidConfig(format!(
                "Unknown model provider: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelProvider::OpenAI => "openai",
            ModelProvider::DeepSeek => "deepseek",
            ModelProvider::Ollama => "ollama",
        };
        f.write_str(name)
    }
}

/// A chat-completion backend: one system prompt, one user message, one reply.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn generate_response(
        &self,
        system_prompt: &str,
        user_content: &str,
        temperature: f32,
    ) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Builds completion clients from settings, retrying initialisation.
pub struct ModelFactory;

impl ModelFactory {
    pub async fn create(settings: &ModelSettings) -> Result<Arc<dyn CompletionClient>> {
        let provider: ModelProvider = settings.provider.parse()?;
        let attempts = settings.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match Self::try_create(provider, &settings.model) {
                Ok(client) => {
                    info!("✨ Initialized {} model {}", provider, settings.model);
                    return Ok(client);
                }
                Err(e) => {
                    warn!(
                        "Model init attempt {}/{} failed: {}",
                        attempt, attempts, e
                    );
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_secs(settings.retry_delay_secs)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AgentError::AIError(format!("Failed to initialize {} model", provider))
        }))
    }

    fn try_create(provider: ModelProvider, model: &str) -> Result<Arc<dyn CompletionClient>> {
        let client = match provider {
            ModelProvider::OpenAI => {
                RigCompletionClient::openai(&get_env_var("OPENAI_API_KEY")?, model)
            }
            ModelProvider::DeepSeek => {
                RigCompletionClient::deepseek(&get_env_var("DEEPSEEK_API_KEY")?, model)
            }
            ModelProvider::Ollama => {
                let base_url = std::env::var("OLLAMA_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
                RigCompletionClient::ollama(&base_url, model)
            }
        };
        Ok(Arc::new(client))
    }
}
