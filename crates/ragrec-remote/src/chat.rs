//! OpenAI-compatible chat completions client.

use async_trait::async_trait;
use ragrec_core::{Error, GenerateError, Generator};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::client::{EndpointSettings, build_client, post_json};

/// Generation options sent with every completion request.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Optional system message placed before the prompt
    pub system_prompt: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Completion length limit
    pub max_tokens: Option<usize>,
}

/// Generator backed by `POST {base}/chat/completions`.
pub struct ChatGenerator {
    client: Client,
    endpoint: String,
    model: String,
    options: ChatOptions,
}

impl ChatGenerator {
    /// Create a client for the chat completions endpoint.
    pub fn new(settings: &EndpointSettings, options: ChatOptions) -> Result<Self, Error> {
        Ok(Self {
            client: build_client(settings)?,
            endpoint: settings.url("chat/completions"),
            model: settings.model.clone(),
            options,
        })
    }

    fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.options.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });
        ChatRequest {
            model: &self.model,
            messages,
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
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
    #[serde(default)]
    content: Option<String>,
}

fn first_answer(response: ChatResponse) -> Result<String, GenerateError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| GenerateError::InvalidResponse("response has no message content".to_string()))
}

#[async_trait]
impl Generator for ChatGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let request = self.request(prompt);
        let response: ChatResponse = post_json(&self.client, &self.endpoint, &request).await?;
        first_answer(response)
    }
}
