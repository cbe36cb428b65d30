
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::{ChatMessage, Embedder, Generator, build_agent, get_text, parse_response, post_json};
use crate::config::OllamaConfig;
use crate::{RagError, Result};

/// Blocking client for a local Ollama server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    embed_model: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig, timeout: Duration) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .map_err(|e| RagError::Config(e.to_string()))?;

        Ok(Self {
            base_url,
            model: config.model.clone(),
            embed_model: config.embed_model.clone(),
            agent: build_agent(timeout),
        })
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Test connection to Ollama server and verify model availability
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models()?;
        for wanted in [&self.model, &self.embed_model] {
            if !models.iter().any(|m| &m.name == wanted) {
                let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
                warn!(
                    "Model {} not found. Available models: {:?}",
                    wanted, available
                );
                return Err(RagError::Provider(format!(
                    "Model '{}' is not available. Available models: {:?}",
                    wanted, available
                )));
            }
        }

        info!(
            "Health check passed for Ollama server at {} with models {} and {}",
            self.base_url, self.model, self.embed_model
        );
        Ok(())
    }

    /// Ping the Ollama server to check if it's responsive
    #[inline]
    pub fn ping(&self) -> Result<()> {
        let url = self.endpoint("/api/tags")?;
        debug!("Pinging Ollama server at {}", url);
        get_text(&self.agent, url.as_str(), None)?;
        Ok(())
    }

    /// List all available models
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("/api/tags")?;
        debug!("Fetching available models from {}", url);

        let text = get_text(&self.agent, url.as_str(), None)?;
        let response: ModelsResponse = parse_response(&text, "Ollama models")?;

        debug!("Found {} models", response.models.len());
        Ok(response.models)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| RagError::Config(format!("Failed to build {} URL: {}", path, e)))
    }
}

impl Embedder for OllamaClient {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.endpoint("/api/embed")?;
        let request = EmbedRequest {
            model: &self.embed_model,
            input: texts,
        };
        let body = serde_json::to_string(&request).map_err(|e| {
            RagError::Provider(format!("Failed to serialize embedding request: {}", e))
        })?;

        debug!("Embedding {} texts with {}", texts.len(), self.embed_model);

        let text = post_json(&self.agent, url.as_str(), None, &body)?;
        let response: EmbedResponse = parse_response(&text, "Ollama embeddings")?;

        if response.embeddings.len() != texts.len() {
            return Err(RagError::Provider(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings)
    }
}

impl Generator for OllamaClient {
    #[inline]
    fn generate(&self, prompt: &str) -> Result<String> {
        let url = self.endpoint("/api/generate")?;
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let body = serde_json::to_string(&request).map_err(|e| {
            RagError::Provider(format!("Failed to serialize generate request: {}", e))
        })?;

        let text = post_json(&self.agent, url.as_str(), None, &body)?;
        let response: GenerateResponse = parse_response(&text, "Ollama generate")?;
        Ok(response.response.trim().to_string())
    }

    #[inline]
    fn generate_chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = self.endpoint("/api/chat")?;
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| RagError::Provider(format!("Failed to serialize chat request: {}", e)))?;

        debug!("Requesting chat with {} messages from {}", messages.len(), self.model);

        let text = post_json(&self.agent, url.as_str(), None, &body)?;
        let response: ChatResponse = parse_response(&text, "Ollama chat")?;
        Ok(response.message.content.trim().to_string())
    }
}
