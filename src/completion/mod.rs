//! Chat completion clients.

use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod openai;

pub use openai::OpenAiCompleter;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that frame the conversation.
    System,
    /// End-user turn.
    User,
    /// Model turn.
    Assistant,
}

impl Role {
    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One role-tagged message of a conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// System message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Generates text for a conversation.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Returns the model's reply to `messages`.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Which endpoint shape a completer talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompletionStrategy {
    /// Structured chat-completions endpoint only.
    Chat,
    /// Single flattened prompt against the responses endpoint only.
    Prompt,
    /// Chat first; on failure retry once with the flattened prompt.
    ChatThenPrompt,
}

/// Flattens messages into one prompt, one `[role] content` line per message.
pub fn flatten_prompt(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|msg| format!("[{}] {}", msg.role.as_str(), msg.content))
        .collect::<Vec<_>>()
        .join("\n")
}
