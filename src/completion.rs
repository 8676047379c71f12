//! Completion endpoint boundary.
//!
//! The pipeline only needs "chunk text in, structured payload out", captured by
//! [`CompletionInvoker`]. [`OpenAiClient`] is the production implementation for
//! OpenAI-compatible chat completion APIs; tests substitute scripted fakes.

use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::deck::deck_schema;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

const FREQUENCY_PENALTY: f32 = 0.5;
const PRESENCE_PENALTY: f32 = 0.5;

/// Turns chunk text into a structured completion.
///
/// Implementations must be thread-safe: the deck stream calls them from its
/// worker thread.
pub trait CompletionInvoker: Send + Sync {
    /// Requests flashcards for `text`.
    ///
    /// The token is advisory. Implementations may refuse to start when it is
    /// already cancelled but are not expected to abort a request midway.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the endpoint answers with a
    /// non-success status.
    fn complete(&self, text: &str, token: &CancellationToken) -> Result<Completion>;
}

/// Chat completion result, reduced to the parts the pipeline reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Candidate answers, best first
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// One candidate answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Assistant message
    pub message: ChoiceMessage,
}

/// Assistant message of a choice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    /// Raw text payload
    #[serde(default)]
    pub content: Option<String>,

    /// Set instead of `content` when the model declines to answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal: Option<String>,
}

impl Completion {
    /// Builds a single-choice completion carrying `content`.
    #[must_use]
    pub fn from_content(content: impl Into<String>) -> Self {
        Self {
            choices: vec![Choice {
                message: ChoiceMessage {
                    content: Some(content.into()),
                    refusal: None,
                },
            }],
        }
    }

    /// Returns the first choice's message, if any.
    #[must_use]
    pub fn first_message(&self) -> Option<&ChoiceMessage> {
        self.choices.first().map(|choice| &choice.message)
    }
}

/// Request body for `POST /chat/completions`.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    description: &'static str,
    schema: Value,
    strict: bool,
}

/// Blocking client for OpenAI-compatible chat completion APIs.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
    prompt: String,
    temperature: f32,
}

impl OpenAiClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is configured or the HTTP client cannot
    /// be built.
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            Error::config("an API key is required (pass --api-key or set OPENAI_API_KEY)")
        })?;

        let http = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            prompt: config.prompt.clone(),
            temperature: config.temperature,
        })
    }

    fn request<'a>(&'a self, text: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: self.temperature,
            frequency_penalty: FREQUENCY_PENALTY,
            presence_penalty: PRESENCE_PENALTY,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: "deck",
                    description: "A deck consisting of flashcards with questions and answers",
                    schema: deck_schema(),
                    strict: true,
                },
            },
        }
    }
}

impl CompletionInvoker for OpenAiClient {
    fn complete(&self, text: &str, token: &CancellationToken) -> Result<Completion> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        debug!(model = %self.model, chars = text.len(), "Requesting completion");
        let start = Instant::now();

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request(text))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!("Completion endpoint returned {}", status);
            return Err(Error::invocation(format!("{status}: {body}")));
        }

        let completion: Completion = response.json()?;

        info!(
            "Completion received in {:.2}s ({} choices)",
            start.elapsed().as_secs_f64(),
            completion.choices.len()
        );

        Ok(completion)
    }
}
