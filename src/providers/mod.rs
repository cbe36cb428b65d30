// Providers module
// Embedding and generation capabilities, plus HTTP clients implementing them

pub mod ollama;
pub mod openai;


use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Config, ProviderKind};
use crate::{RagError, Result};

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// Turns texts into fixed-length vectors
pub trait Embedder {
    /// Embed every text, returning one vector per input in the same order
    ///
    /// An empty input returns an empty output without contacting the provider.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Produces text from a prompt or a conversation
pub trait Generator {
    /// Single-turn generation; the returned text is trimmed
    fn generate(&self, prompt: &str) -> Result<String>;

    /// Multi-turn generation over an ordered conversation; the returned text is trimmed
    fn generate_chat(&self, messages: &[ChatMessage]) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The configured provider, dispatching to a concrete HTTP client
#[derive(Debug, Clone)]
pub enum Provider {
    OpenAi(OpenAiClient),
    Ollama(OllamaClient),
}

impl Provider {
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = config.request_timeout();
        debug!(
            "Building {:?} provider with {:?} timeout",
            config.provider, timeout
        );

        match config.provider {
            ProviderKind::OpenAi => {
                OpenAiClient::new(&config.openai, timeout).map(Self::OpenAi)
            }
            ProviderKind::Ollama => {
                OllamaClient::new(&config.ollama, timeout).map(Self::Ollama)
            }
        }
    }
}

impl Embedder for Provider {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self {
            Self::OpenAi(client) => client.embed(texts),
            Self::Ollama(client) => client.embed(texts),
        }
    }
}

impl Generator for Provider {
    #[inline]
    fn generate(&self, prompt: &str) -> Result<String> {
        match self {
            Self::OpenAi(client) => client.generate(prompt),
            Self::Ollama(client) => client.generate(prompt),
        }
    }

    #[inline]
    fn generate_chat(&self, messages: &[ChatMessage]) -> Result<String> {
        match self {
            Self::OpenAi(client) => client.generate_chat(messages),
            Self::Ollama(client) => client.generate_chat(messages),
        }
    }
}

/// Build a blocking agent that reports non-2xx responses instead of failing on them
pub(crate) fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// POST a JSON body and return the response text, failing on any non-2xx status
///
/// Transport errors and timeouts are returned immediately; nothing is retried here.
pub(crate) fn post_json(
    agent: &ureq::Agent,
    url: &str,
    bearer: Option<&str>,
    body: &str,
) -> Result<String> {
    let mut request = agent.post(url).header("Content-Type", "application/json");
    if let Some(token) = bearer {
        request = request.header("Authorization", format!("Bearer {}", token.trim()));
    }

    let mut response = request
        .send(body)
        .map_err(|e| RagError::Provider(format!("Request to {} failed: {}", url, e)))?;

    let status = response.status();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| RagError::Provider(format!("Failed to read response from {}: {}", url, e)))?;

    if !status.is_success() {
        return Err(RagError::Provider(format!(
            "request failed with status {}: {}",
            status.as_u16(),
            text
        )));
    }

    Ok(text)
}

/// GET a URL and return the response text, failing on any non-2xx status
pub(crate) fn get_text(agent: &ureq::Agent, url: &str, bearer: Option<&str>) -> Result<String> {
    let mut request = agent.get(url);
    if let Some(token) = bearer {
        request = request.header("Authorization", format!("Bearer {}", token.trim()));
    }

    let mut response = request
        .call()
        .map_err(|e| RagError::Provider(format!("Request to {} failed: {}", url, e)))?;

    let status = response.status();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| RagError::Provider(format!("Failed to read response from {}: {}", url, e)))?;

    if !status.is_success() {
        return Err(RagError::Provider(format!(
            "request failed with status {}: {}",
            status.as_u16(),
            text
        )));
    }

    Ok(text)
}

/// Parse a provider response body, reporting shape problems as provider errors
pub(crate) fn parse_response<T: serde::de::DeserializeOwned>(text: &str, what: &str) -> Result<T> {
    serde_json::from_str(text)
        .map_err(|e| RagError::Provider(format!("Unexpected response from {}: {}", what, e)))
}
