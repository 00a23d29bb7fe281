use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::AiProviderConfig;
use crate::error::ShellmateError;
use crate::types::{Role, Turn};
use crate::AiProvider;

const DEFAULT_TEMPERATURE: f32 = 0.7;

fn http_client() -> Client {
    // Only connecting is bounded; a slow model answer is waited for.
    Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| Client::new())
}

async fn error_body(provider: &str, response: reqwest::Response) -> ShellmateError {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    ShellmateError::provider(provider, format!("{}: {}", status, error_text))
}

// ==================== OpenAI Provider ====================

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            client: http_client(),
            api_key,
            model: model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

fn chat_messages(turns: &[Turn], system_instruction: &str) -> Vec<OpenAiMessage> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    messages.push(OpenAiMessage {
        role: "system".to_string(),
        content: system_instruction.to_string(),
    });
    messages.extend(turns.iter().map(|turn| OpenAiMessage {
        role: match turn.role {
            Role::User => "user",
            Role::Model => "assistant",
        }
        .to_string(),
        content: turn.text(),
    }));
    messages
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, turns: &[Turn], system_instruction: &str) -> Result<String> {
        let request = OpenAiRequest {
            model: self.model.clone(),
            messages: chat_messages(turns, system_instruction),
            temperature: self.temperature,
        };

        debug!("Sending {} message(s) to OpenAI", request.messages.len());

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("OpenAI API request failed")?;

        if !response.status().is_success() {
            return Err(error_body("OpenAI", response).await.into());
        }

        let openai_response: OpenAiResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI response")?;

        openai_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                ShellmateError::EmptyResponse {
                    provider: "OpenAI".to_string(),
                }
                .into()
            })
    }
}

// ==================== Google Gemini Provider ====================

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            client: http_client(),
            api_key,
            model: model.unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

fn gemini_contents(turns: &[Turn]) -> Vec<GeminiContent> {
    turns
        .iter()
        .map(|turn| GeminiContent {
            role: Some(turn.role.as_str().to_string()),
            parts: turn
                .parts
                .iter()
                .map(|text| GeminiPart { text: text.clone() })
                .collect(),
        })
        .collect()
}

#[async_trait]
impl AiProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, turns: &[Turn], system_instruction: &str) -> Result<String> {
        let request = GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: system_instruction.to_string(),
                }],
            },
            contents: gemini_contents(turns),
            generation_config: GeminiGenerationConfig {
                temperature: self.temperature,
            },
        };

        debug!("Sending {} turn(s) to Gemini", request.contents.len());

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Gemini API request failed")?;

        if !response.status().is_success() {
            return Err(error_body("Gemini", response).await.into());
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        let text = gemini_response
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ShellmateError::EmptyResponse {
                provider: "Gemini".to_string(),
            }
            .into());
        }
        Ok(text)
    }
}

// ==================== Local/Ollama Provider ====================

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OpenAiMessage,
}

impl OllamaProvider {
    pub fn new(model: String, base_url: Option<String>) -> Self {
        Self {
            client: http_client(),
            base_url: base_url
                .unwrap_or_else(|| "http://localhost:11434".to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl AiProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, turns: &[Turn], system_instruction: &str) -> Result<String> {
        let request = OllamaRequest {
            model: self.model.clone(),
            messages: chat_messages(turns, system_instruction),
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .context("Ollama API request failed")?;

        if !response.status().is_success() {
            return Err(error_body("Ollama", response).await.into());
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(ollama_response.message.content)
    }
}

// ==================== Provider Factory ====================

pub struct AiProviderFactory;

impl AiProviderFactory {
    pub fn create_openai(api_key: String, model: Option<String>) -> OpenAiProvider {
        OpenAiProvider::new(api_key, model)
    }

    pub fn create_gemini(api_key: String, model: Option<String>) -> GeminiProvider {
        GeminiProvider::new(api_key, model)
    }

    pub fn create_ollama(model: String, base_url: Option<String>) -> OllamaProvider {
        OllamaProvider::new(model, base_url)
    }

    pub fn from_config(config: &AiProviderConfig) -> Result<Box<dyn AiProvider + Send + Sync>> {
        let temperature = config.temperature.unwrap_or(DEFAULT_TEMPERATURE);

        let provider: Box<dyn AiProvider + Send + Sync> =
            match config.provider.to_lowercase().as_str() {
                "openai" => {
                    let api_key = config.resolve_api_key("OPENAI_API_KEY", "OpenAI")?;
                    let mut provider = Self::create_openai(api_key, config.model.clone())
                        .with_temperature(temperature);
                    if let Some(ref base_url) = config.base_url {
                        provider = provider.with_base_url(base_url.clone());
                    }
                    Box::new(provider)
                }
                "gemini" | "google" => {
                    let api_key = config.resolve_api_key("GEMINI_API_KEY", "Gemini")?;
                    let mut provider = Self::create_gemini(api_key, config.model.clone())
                        .with_temperature(temperature);
                    if let Some(ref base_url) = config.base_url {
                        provider = provider.with_base_url(base_url.clone());
                    }
                    Box::new(provider)
                }
                "ollama" => {
                    let model = config
                        .model
                        .clone()
                        .ok_or_else(|| ShellmateError::Config("Model name required for Ollama".to_string()))?;
                    Box::new(
                        Self::create_ollama(model, config.base_url.clone())
                            .with_temperature(temperature),
                    )
                }
                other => return Err(ShellmateError::UnknownProvider(other.to_string()).into()),
            };

        info!(
            "Using AI provider {} with model {}",
            provider.name(),
            provider.model()
        );
        Ok(provider)
    }
}
