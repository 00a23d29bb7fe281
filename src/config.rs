use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::ai::HistoryRetention;
use crate::error::ShellmateError;

const CONFIG_FILE_NAME: &str = "shellmate.toml";
const ENV_PREFIX: &str = "SHELLMATE";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ai_provider: AiProviderConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiProviderConfig {
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub command_timeout_secs: u64,
    /// Hand tool output straight back to the model instead of waiting for
    /// the next user message.
    pub auto_continue: bool,
    /// Upper bound on model rounds per user message; 0 means no bound.
    pub max_rounds: usize,
    pub history: HistoryRetention,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub log_dir: PathBuf,
}

impl Default for AiProviderConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            // each backend falls back to its own default model
            model: None,
            base_url: None,
            api_key: None,
            temperature: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 30,
            auto_continue: true,
            max_rounds: 0,
            history: HistoryRetention::Full,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl AiProviderConfig {
    /// The environment wins over the file, matching how API keys are usually
    /// rotated without touching configuration.
    pub fn resolve_api_key(&self, env_var: &'static str, provider: &str) -> Result<String, ShellmateError> {
        std::env::var(env_var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.api_key.clone().filter(|key| !key.trim().is_empty()))
            .ok_or_else(|| ShellmateError::MissingApiKey {
                provider: provider.to_string(),
                env_var,
            })
    }
}

impl SessionConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.max(1))
    }
}

impl Config {
    /// `./shellmate.toml` when present, otherwise the per-user config file.
    pub fn default_path() -> PathBuf {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return local;
        }
        dirs::config_dir()
            .map(|dir| dir.join("shellmate").join("config.toml"))
            .unwrap_or(local)
    }

    /// Loads defaults, then the TOML file, then `SHELLMATE_*` variables.
    ///
    /// An explicitly named file must exist; the default location is optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let (path, required) = match config_path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        debug!("Loading configuration from {} (required: {})", path.display(), required);

        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_path()).required(required))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|source| ShellmateError::ConfigFile {
                path: path.clone(),
                source,
            })?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|source| ShellmateError::ConfigFile {
                path: path.clone(),
                source,
            })?;

        Ok(config)
    }

    /// Writes the default configuration, refusing to overwrite an existing file.
    pub fn write_default(config_path: &Path) -> Result<()> {
        if config_path.exists() {
            return Err(ShellmateError::Config(format!(
                "{} already exists",
                config_path.display()
            ))
            .into());
        }

        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Could not create config directory")?;
        }

        let mut default_config = Self::default();
        default_config.ai_provider.model = Some(DEFAULT_GEMINI_MODEL.to_string());

        let config_str = toml::to_string_pretty(&default_config)
            .context("Could not serialize default config")?;
        std::fs::write(config_path, config_str).with_context(|| {
            format!("Could not write default config file {}", config_path.display())
        })?;

        info!("Wrote default configuration to {}", config_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_providers::AiProviderFactory;
    use crate::AiProvider;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.ai_provider.provider, "gemini");
        assert_eq!(config.ai_provider.model, None);
        assert_eq!(config.session.command_timeout_secs, 30);
        assert_eq!(config.session.command_timeout(), Duration::from_secs(30));
        assert!(config.session.auto_continue);
        assert_eq!(config.session.max_rounds, 0);
        assert_eq!(config.session.history, HistoryRetention::Full);
        assert_eq!(config.logging.log_dir, PathBuf::from("logs"));
    }

    #[test]
    fn test_config_load_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("shellmate.toml");
        std::fs::write(
            &config_path,
            r#"
[ai_provider]
provider = "openai"
model = "gpt-4o"
api_key = "sk-from-file"

[session]
command_timeout_secs = 5
auto_continue = false
history = { last_turns = 12 }

[logging]
level = "debug"
log_dir = "/tmp/shellmate-logs"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&config_path)).unwrap();

        assert_eq!(config.ai_provider.provider, "openai");
        assert_eq!(config.ai_provider.model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.session.command_timeout(), Duration::from_secs(5));
        assert!(!config.session.auto_continue);
        assert_eq!(config.session.history, HistoryRetention::LastTurns(12));
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        // unspecified values keep their defaults
        assert_eq!(config.session.max_rounds, 0);
    }

    #[test]
    fn test_config_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("partial.toml");
        std::fs::write(&config_path, "[session]\nhistory = \"full\"\n").unwrap();

        let config = Config::load(Some(&config_path)).unwrap();
        assert_eq!(config.ai_provider.provider, "gemini");
        assert_eq!(config.session.history, HistoryRetention::Full);
    }

    #[test]
    fn test_provider_only_table_uses_backend_default_model() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("openai.toml");
        std::fs::write(
            &config_path,
            "[ai_provider]\nprovider = \"openai\"\napi_key = \"sk-test\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&config_path)).unwrap();
        assert_eq!(config.ai_provider.provider, "openai");
        assert_eq!(config.ai_provider.model, None);

        let provider = AiProviderFactory::from_config(&config.ai_provider).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_config_missing_explicit_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.toml");
        let err = Config::load(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }

    #[test]
    fn test_write_default_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        Config::write_default(&config_path).unwrap();
        let loaded = Config::load(Some(&config_path)).unwrap();
        assert_eq!(loaded.ai_provider.provider, "gemini");
        assert_eq!(loaded.ai_provider.model.as_deref(), Some("gemini-2.5-flash"));
        assert_eq!(loaded.session.command_timeout_secs, 30);

        // second write must not clobber the file
        assert!(Config::write_default(&config_path).is_err());
    }

    #[test]
    fn test_api_key_resolution() {
        let mut provider = AiProviderConfig::default();
        provider.api_key = Some("from-file".to_string());
        assert_eq!(
            provider
                .resolve_api_key("SHELLMATE_TEST_UNSET_KEY_4821", "Gemini")
                .unwrap(),
            "from-file"
        );

        std::env::set_var("SHELLMATE_TEST_SET_KEY_4821", "from-env");
        assert_eq!(
            provider
                .resolve_api_key("SHELLMATE_TEST_SET_KEY_4821", "Gemini")
                .unwrap(),
            "from-env"
        );

        provider.api_key = None;
        assert_matches!(
            provider.resolve_api_key("SHELLMATE_TEST_UNSET_KEY_4821", "Gemini"),
            Err(ShellmateError::MissingApiKey { .. })
        );
    }
}
