//! OpenAI-compatible client for chat completions and the responses endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{flatten_prompt, ChatMessage, Completer, CompletionStrategy};
use crate::error::{RagError, Result};

/// Completion client for OpenAI-compatible chat and responses endpoints.
pub struct OpenAiCompleter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    strategy: CompletionStrategy,
    temperature: f32,
    max_tokens: usize,
}

impl OpenAiCompleter {
    /// Builds a completer; a missing key surfaces on the first call.
    pub fn new(
        api_key: Option<String>,
        base_url: &str,
        model: String,
        strategy: CompletionStrategy,
        timeout: Duration,
    ) -> Result<Self> {
        if model.trim().is_empty() {
            return Err(RagError::Config("missing OpenAI chat model name".into()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            strategy,
            temperature: 0.2,
            max_tokens: 600,
        })
    }

    /// Overrides sampling temperature and the completion token cap.
    pub fn with_sampling(mut self, temperature: f32, max_tokens: usize) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens.max(1);
        self
    }

    /// Endpoint strategy in use.
    pub fn strategy(&self) -> CompletionStrategy {
        self.strategy
    }

    fn auth_header(&self) -> Result<HeaderValue> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| RagError::Config("OPENAI_API_KEY is not set".into()))?;
        HeaderValue::from_str(&format!("Bearer {}", key.trim()))
            .map_err(|_| RagError::Config("invalid OpenAI API key".into()))
    }

    async fn chat(&self, auth: HeaderValue, messages: &[ChatMessage]) -> Result<String> {
        debug!(model = %self.model, messages = messages.len(), "calling chat completions");
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages,
        };
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(AUTHORIZATION, auth)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RagError::from_response("chat completions", resp).await);
        }
        let parsed: ChatResponse = resp.json().await?;
        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content.filter(|text| !text.trim().is_empty()))
            .ok_or_else(|| RagError::Upstream {
                service: "chat completions",
                status: 0,
                body: "response carried no message content".into(),
            })
    }

    async fn prompt(&self, auth: HeaderValue, messages: &[ChatMessage]) -> Result<String> {
        let prompt = flatten_prompt(messages);
        debug!(model = %self.model, prompt_len = prompt.len(), "calling responses endpoint");
        let body = PromptRequest {
            model: &self.model,
            input: &prompt,
            temperature: self.temperature,
            max_output_tokens: self.max_tokens,
        };
        let resp = self
            .client
            .post(format!("{}/responses", self.base_url))
            .header(AUTHORIZATION, auth)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RagError::from_response("responses", resp).await);
        }
        let parsed: PromptResponse = resp.json().await?;
        parsed.into_text().ok_or_else(|| RagError::Upstream {
            service: "responses",
            status: 0,
            body: "response carried no text output".into(),
        })
    }
}

#[async_trait]
impl Completer for OpenAiCompleter {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let auth = self.auth_header()?;
        match self.strategy {
            CompletionStrategy::Chat => self.chat(auth, messages).await,
            CompletionStrategy::Prompt => self.prompt(auth, messages).await,
            CompletionStrategy::ChatThenPrompt => {
                let chat_err = match self.chat(auth.clone(), messages).await {
                    Ok(text) => return Ok(text),
                    Err(err) => err,
                };
                warn!(error = %chat_err, "chat completions failed; falling back to flattened prompt");
                self.prompt(auth, messages)
                    .await
                    .map_err(|prompt_err| RagError::Upstream {
                        service: "completion",
                        status: 0,
                        body: format!("chat: {chat_err}; prompt: {prompt_err}"),
                    })
            }
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: &'a [ChatMessage],
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

#[derive(Serialize)]
struct PromptRequest<'a> {
    model: &'a str,
    input: &'a str,
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Debug, Default, Deserialize)]
struct PromptResponse {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(default)]
    text: Option<String>,
}

impl PromptResponse {
    fn into_text(self) -> Option<String> {
        if let Some(text) = self.output_text.filter(|t| !t.is_empty()) {
            return Some(text);
        }
        let fragments: Vec<String> = self
            .output
            .into_iter()
            .flat_map(|item| item.content)
            .filter_map(|part| part.text)
            .collect();
        if fragments.is_empty() {
            None
        } else {
            Some(fragments.concat())
        }
    }
}
