
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::{ChatMessage, Embedder, Generator, build_agent, get_text, parse_response, post_json};
use crate::config::OpenAiConfig;
use crate::{RagError, Result};

const GENERATE_TEMPERATURE: f32 = 0.2;
const CHAT_TEMPERATURE: f32 = 0.0;

/// Blocking client for OpenAI-compatible embeddings and chat completions
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    api_key: String,
    model: String,
    embed_model: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

impl OpenAiClient {
    /// Create a client from configuration
    ///
    /// Fails when no API key is configured.
    #[inline]
    pub fn new(config: &OpenAiConfig, timeout: Duration) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                RagError::Config("OPENAI_API_KEY is required for this command".to_string())
            })?
            .to_string();

        let base_url = config
            .base_url()
            .map_err(|e| RagError::Config(e.to_string()))?;

        Ok(Self {
            base_url,
            api_key,
            model: config.model.clone(),
            embed_model: config.embed_model.clone(),
            agent: build_agent(timeout),
        })
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    /// List model ids visible to the configured key
    #[inline]
    pub fn list_models(&self) -> Result<Vec<String>> {
        let url = self.endpoint("models")?;
        debug!("Fetching available models from {}", url);

        let text = get_text(&self.agent, url.as_str(), Some(&self.api_key))?;
        let response: ModelsResponse = parse_response(&text, "OpenAI models")?;

        Ok(response.data.into_iter().map(|m| m.id).collect())
    }

    /// Check that the API is reachable and the key is accepted
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        let models = self.list_models()?;
        info!(
            "Health check passed for {} ({} models visible)",
            self.base_url,
            models.len()
        );
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| RagError::Config(format!("Failed to build {} URL: {}", path, e)))
    }

    fn chat_completion(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        let url = self.endpoint("chat/completions")?;
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| RagError::Provider(format!("Failed to serialize chat request: {}", e)))?;

        debug!(
            "Requesting chat completion with {} messages from {}",
            messages.len(),
            self.model
        );

        let text = post_json(&self.agent, url.as_str(), Some(&self.api_key), &body)?;
        let response: ChatResponse = parse_response(&text, "OpenAI")?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| RagError::Provider("Unexpected response from OpenAI: no content".into()))
    }
}

impl Embedder for OpenAiClient {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.endpoint("embeddings")?;
        let request = EmbeddingsRequest {
            model: &self.embed_model,
            input: texts,
        };
        let body = serde_json::to_string(&request).map_err(|e| {
            RagError::Provider(format!("Failed to serialize embedding request: {}", e))
        })?;

        debug!("Embedding {} texts with {}", texts.len(), self.embed_model);

        let text = post_json(&self.agent, url.as_str(), Some(&self.api_key), &body)?;
        let response: EmbeddingsResponse = parse_response(&text, "OpenAI embeddings")?;

        if response.data.len() != texts.len() {
            return Err(RagError::Provider(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            )));
        }

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

impl Generator for OpenAiClient {
    #[inline]
    fn generate(&self, prompt: &str) -> Result<String> {
        self.chat_completion(&[ChatMessage::user(prompt)], GENERATE_TEMPERATURE)
    }

    #[inline]
    fn generate_chat(&self, messages: &[ChatMessage]) -> Result<String> {
        self.chat_completion(messages, CHAT_TEMPERATURE)
    }
}
