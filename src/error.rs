use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellmateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not read configuration at {path}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: ::config::ConfigError,
    },

    #[error("{provider} API key not set (environment variable {env_var} or [ai_provider] api_key)")]
    MissingApiKey {
        provider: String,
        env_var: &'static str,
    },

    #[error("Unknown AI provider: {0}. Use 'gemini', 'openai' or 'ollama'")]
    UnknownProvider(String),

    #[error("{provider} request failed: {message}")]
    Provider { provider: String, message: String },

    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: String },
}

impl ShellmateError {
    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}
