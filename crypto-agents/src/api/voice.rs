use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use colored::*;
use common::config::VoiceSettings;
use common::env::get_env_var_opt;
use common::{AgentError, Result};
use serde_json::json;
use tokio::process::Command;
use tracing::{info, warn};

const SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";

/// Delivers sentiment messages. Every message is logged; important ones may
/// also be spoken.
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(&self, message: &str, important: bool) -> Result<()>;
}

/// OpenAI text-to-speech with local playback.
pub struct VoiceAnnouncer {
    client: reqwest::Client,
    api_key: Option<String>,
    settings: VoiceSettings,
    audio_dir: PathBuf,
}

impl VoiceAnnouncer {
    pub fn new(api_key: Option<String>, settings: VoiceSettings, audio_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AgentError::ExternalApiError(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            settings,
            audio_dir: audio_dir.into(),
        })
    }

    /// Reads `OPENAI_KEY`; without it announcements are text only.
    pub fn from_env(settings: VoiceSettings, audio_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(get_env_var_opt("OPENAI_KEY"), settings, audio_dir)
    }

    async fn synthesize(&self, api_key: &str, message: &str) -> Result<PathBuf> {
        let response = self
            .client
            .post(SPEECH_URL)
            .bearer_auth(api_key)
            .json(&json!({
                "model": self.settings.model,
                "voice": self.settings.voice,
                "speed": self.settings.speed,
                "input": message,
            }))
            .send()
            .await
            .map_err(|e| AgentError::ExternalApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AgentError::ExternalApiError(format!(
                "speech endpoint returned {}",
                response.status()
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| AgentError::ExternalApiError(e.to_string()))?;

        tokio::fs::create_dir_all(&self.audio_dir).await?;
        let path = self
            .audio_dir
            .join(format!("sentiment_{}.mp3", Utc::now().format("%Y%m%d_%H%M%S")));
        tokio::fs::write(&path, &audio).await?;
        Ok(path)
    }
}

async fn play(path: &Path) -> Result<()> {
    let status = if cfg!(target_os = "windows") {
        Command::new("cmd").arg("/C").arg("start").arg("").arg(path).status().await?
    } else if cfg!(target_os = "macos") {
        Command::new("afplay").arg(path).status().await?
    } else {
        Command::new("ffplay")
            .args(["-nodisp", "-autoexit", "-loglevel", "quiet"])
            .arg(path)
            .status()
            .await?
    };

    if !status.success() {
        warn!("Audio player exited with {}", status);
    }
    Ok(())
}

#[async_trait]
impl Announcer for VoiceAnnouncer {
    async fn announce(&self, message: &str, important: bool) -> Result<()> {
        println!("\n🗣️ {}", message.bright_magenta());
        info!("{}", message);

        if !important || !self.settings.enabled {
            return Ok(());
        }
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("OPENAI_KEY not set, skipping voice announcement");
            return Ok(());
        };

        let path = self.synthesize(api_key, message).await?;
        let played = play(&path).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
        played
    }
}
