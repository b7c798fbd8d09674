pub mod config;
pub mod env;
pub mod error;
pub mod logging;
pub mod providers;

pub use config::Settings;
pub use error::{AgentError, Result};
pub use providers::{CompletionClient, ModelFactory, ModelProvider};
