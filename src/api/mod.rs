//! Request and response payloads for the BlueGPT HTTP API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod client;
pub mod error;

pub use client::{ByteStream, ChatBackend, HttpBackend};
pub use error::ApiError;

/// Body of `POST /api/chat/stream` and `POST /api/chat`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub chat_id: Option<String>,
    /// Replaces the server's system prompt; only honoured when a chat starts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Model for this request instead of the server's current one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, chat_id: Option<String>) -> Self {
        Self {
            message: message.into(),
            chat_id,
            ..Self::default()
        }
    }
}

/// Response of the non-streaming `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatReply {
    pub chat_id: String,
    pub reply: String,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub output: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub chat_id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatHistory {
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolActiveUpdate {
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolActiveResponse {
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelSettings {
    pub model: String,
    #[serde(default)]
    pub available: Vec<String>,
    #[serde(default)]
    pub reasoning_effort: Option<String>,
    /// Allowed reasoning efforts keyed by model name.
    #[serde(default)]
    pub reasoning_options: std::collections::HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelUpdate {
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub reasoning_effort: String,
    pub text_verbosity: String,
    pub max_output_tokens: u32,
}

/// Response of `GET /api/generation`, which also reports server defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerationState {
    #[serde(flatten)]
    pub current: GenerationSettings,
    #[serde(default)]
    pub defaults: Option<GenerationSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Sample {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub prompt: String,
}
