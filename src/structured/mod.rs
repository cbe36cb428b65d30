//! Structured output generation
//!
//! Drives a chat-capable generator through a bounded correction loop until the
//! response parses as JSON and matches the [`StructuredOutput`] schema exactly.
//!
//! The loop is an explicit state machine:
//!
//! ```text
//! Calling -> Parsing -> Validating -> Accepted
//!               |            |
//!               +-----+------+
//!                     v
//!        attempt < max_retries ? Correcting -> Calling
//!                              : Failed
//! ```
//!
//! Every correction appends the rejected response and a corrective user message
//! to the conversation, so later attempts see every earlier failure.

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::providers::{ChatMessage, Generator};
use crate::{RagError, Result};

pub const DEFAULT_MAX_RETRIES: u32 = 2;

pub const SYSTEM_PROMPT: &str = "Return ONLY valid JSON with keys: title, summary, keywords. \
Do not wrap the JSON in markdown or add extra text.";

/// The only schema the validator accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructuredOutput {
    pub title: String,
    pub summary: String,
    pub keywords: Vec<String>,
}

impl StructuredOutput {
    /// Parse a raw model response
    ///
    /// Surrounding code fences are removed first. Text that is not JSON is
    /// `MalformedData`; JSON of the wrong shape is `SchemaViolation`.
    #[inline]
    pub fn parse(raw: &str) -> Result<Self> {
        let cleaned = strip_code_fence(raw);
        let value: serde_json::Value =
            serde_json::from_str(cleaned).map_err(|e| RagError::MalformedData(e.to_string()))?;
        Self::from_value(value)
    }

    /// Validate an already-parsed JSON value against the schema
    #[inline]
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(RagError::SchemaViolation(
                "expected a JSON object with keys title, summary, keywords".to_string(),
            ));
        }

        let output: Self =
            serde_json::from_value(value).map_err(|e| RagError::SchemaViolation(e.to_string()))?;

        if output.title.trim().is_empty() {
            return Err(RagError::SchemaViolation(
                "field `title` must not be empty".to_string(),
            ));
        }
        if output.summary.trim().is_empty() {
            return Err(RagError::SchemaViolation(
                "field `summary` must not be empty".to_string(),
            ));
        }

        Ok(output)
    }
}

/// Remove a surrounding triple-backtick fence and an optional `json` language tag
#[inline]
pub fn strip_code_fence(text: &str) -> &str {
    let cleaned = text.trim();
    if !cleaned.starts_with("```") {
        return cleaned;
    }

    let cleaned = cleaned.trim_matches('`').trim();
    match cleaned.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => cleaned.get(4..).unwrap_or("").trim(),
        _ => cleaned,
    }
}

/// Append-only conversation log carried across attempts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    #[inline]
    pub fn new(system: &str, prompt: &str) -> Self {
        Self {
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
        }
    }

    /// Extend the log with a rejected response and the correction that follows it
    #[inline]
    #[must_use]
    pub fn with_correction(mut self, rejected: String, error: &RagError) -> Self {
        self.messages.push(ChatMessage::assistant(rejected));
        self.messages.push(ChatMessage::user(correction_message(error)));
        self
    }

    #[inline]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

fn correction_message(error: &RagError) -> String {
    format!(
        "The previous response was invalid JSON or did not match the schema. Error: {}. \
Return ONLY valid JSON with keys: title, summary, keywords.",
        error
    )
}

/// States of the correction loop
#[derive(Debug)]
enum State {
    Calling,
    Parsing { raw: String },
    Validating { raw: String, value: serde_json::Value },
    Correcting { raw: String, error: RagError },
    Accepted(StructuredOutput),
    Failed(RagError),
}

/// Bounded retry loop around structured generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuredValidator {
    max_retries: u32,
}

impl Default for StructuredValidator {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl StructuredValidator {
    /// `max_retries` corrections are allowed, so at most `max_retries + 1` calls are made
    #[inline]
    pub const fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Run the loop to completion
    ///
    /// Only correctable failures (see [`RagError::is_correctable`]) lead to another
    /// attempt, including ones reported by the generator itself. Anything else ends
    /// the loop immediately.
    #[inline]
    pub fn run<G: Generator + ?Sized>(&self, generator: &G, prompt: &str) -> Result<StructuredOutput> {
        let mut conversation = Conversation::new(SYSTEM_PROMPT, prompt);
        let mut attempt: u32 = 0;
        let mut state = State::Calling;

        loop {
            state = match state {
                State::Calling => {
                    debug!(
                        "Structured attempt {}/{} with {} messages",
                        attempt + 1,
                        self.max_retries + 1,
                        conversation.messages().len()
                    );
                    match generator.generate_chat(conversation.messages()) {
                        Ok(raw) => State::Parsing { raw },
                        Err(error) if error.is_correctable() => State::Correcting {
                            raw: String::new(),
                            error,
                        },
                        Err(error) => return Err(error),
                    }
                }
                State::Parsing { raw } => {
                    match serde_json::from_str::<serde_json::Value>(strip_code_fence(&raw)) {
                        Ok(value) => State::Validating { raw, value },
                        Err(e) => State::Correcting {
                            raw,
                            error: RagError::MalformedData(e.to_string()),
                        },
                    }
                }
                State::Validating { raw, value } => match StructuredOutput::from_value(value) {
                    Ok(output) => State::Accepted(output),
                    Err(error) => State::Correcting { raw, error },
                },
                State::Correcting { raw, error } => {
                    if attempt < self.max_retries {
                        warn!(
                            "Structured attempt {} rejected, asking for a correction: {}",
                            attempt + 1,
                            error
                        );
                        conversation = conversation.with_correction(raw, &error);
                        attempt += 1;
                        State::Calling
                    } else {
                        State::Failed(error)
                    }
                }
                State::Accepted(output) => {
                    info!("Structured output accepted on attempt {}", attempt + 1);
                    return Ok(output);
                }
                State::Failed(last) => {
                    warn!("Structured output failed after {} attempts", attempt + 1);
                    return Err(RagError::RetryExhausted {
                        attempts: attempt + 1,
                        last: Box::new(last),
                    });
                }
            };
        }
    }
}

/// Generate a validated [`StructuredOutput`] for `prompt`
#[inline]
pub fn structured_output<G: Generator + ?Sized>(
    generator: &G,
    prompt: &str,
    max_retries: u32,
) -> Result<StructuredOutput> {
    StructuredValidator::new(max_retries).run(generator, prompt)
}
