use async_trait::async_trait;
use rig::completion::Prompt;
use rig::providers::{deepseek, openai};

use super::{CompletionClient, ModelProvider};
use crate::error::{AgentError, Result};

enum Backend {
    OpenAI(openai::Client),
    DeepSeek(deepseek::Client),
}

/// rig-core backed completion client. Ollama goes through its
/// OpenAI-compatible endpoint.
pub struct RigCompletionClient {
    provider: ModelProvider,
    model: String,
    backend: Backend,
}

impl RigCompletionClient {
    pub fn openai(api_key: &str, model: &str) -> Self {
        Self {
            provider: ModelProvider::OpenAI,
            model: model.to_string(),
            backend: Backend::OpenAI(openai::Client::new(api_key)),
        }
    }

    pub fn deepseek(api_key: &str, model: &str) -> Self {
        Self {
            provider: ModelProvider::DeepSeek,
            model: model.to_string(),
            backend: Backend::DeepSeek(deepseek::Client::new(api_key)),
        }
    }

    pub fn ollama(base_url: &str, model: &str) -> Self {
        Self {
            provider: ModelProvider::Ollama,
            model: model.to_string(),
            backend: Backend::OpenAI(openai::Client::from_url("ollama", base_url)),
        }
    }

    pub fn provider(&self) -> ModelProvider {
        self.provider
    }
}

#[async_trait]
impl CompletionClient for RigCompletionClient {
    async fn generate_response(
        &self,
        system_prompt: &str,
        user_content: &str,
        temperature: f32,
    ) -> Result<String> {
        let response = match &self.backend {
            Backend::OpenAI(client) => {
                let agent = client
                    .agent(&self.model)
                    .preamble(system_prompt)
                    .temperature(temperature as f64)
                    .build();
                agent.prompt(user_content.to_string()).await
            }
            Backend::DeepSeek(client) => {
                let agent = client
                    .agent(&self.model)
                    .preamble(system_prompt)
                    .temperature(temperature as f64)
                    .build();
                agent.prompt(user_content.to_string()).await
            }
        };

        response.map_err(|e| AgentError::AIError(format!("{} request failed: {}", self.provider, e)))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
