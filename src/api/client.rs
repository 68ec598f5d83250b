use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;
use tracing::debug;

use super::{
    ApiError, ChatHistory, ChatReply, ChatRequest, GenerationSettings, GenerationState,
    ModelSettings, ModelUpdate, Sample, SessionSummary, ToolActiveResponse, ToolActiveUpdate,
    ToolInfo,
};
use crate::utils::url::endpoint_url;

/// Raw response body of the streaming endpoint, chunked as the transport delivers it.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ApiError>> + Send>>;

/// The backend calls a chat turn depends on.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// `POST /api/chat/stream`; resolves once response headers arrive.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ApiError>;

    /// `POST /api/chat`, the non-streaming fallback.
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, ApiError>;

    /// `GET /api/sessions`.
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, ApiError>;

    /// `GET /api/chat/{chat_id}`.
    async fn chat_history(&self, chat_id: &str) -> Result<ChatHistory, ApiError>;
}

/// reqwest-backed client for a BlueGPT server.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        endpoint_url(&self.base_url, segments).map_err(ApiError::InvalidUrl)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.url(segments)?;
        debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        read_json(response).await
    }

    async fn post_json<B, T>(&self, segments: &[&str], body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(segments)?;
        debug!(%url, "POST");
        let response = self.client.post(url).json(body).send().await?;
        read_json(response).await
    }

    /// `GET /health`.
    pub async fn health(&self) -> Result<serde_json::Value, ApiError> {
        self.get_json(&["health"]).await
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>, ApiError> {
        self.get_json(&["api", "tools"]).await
    }

    pub async fn set_tool_active(
        &self,
        name: &str,
        active: bool,
    ) -> Result<ToolActiveResponse, ApiError> {
        self.post_json(&["api", "tools", name, "active"], &ToolActiveUpdate { active })
            .await
    }

    pub async fn model(&self) -> Result<ModelSettings, ApiError> {
        self.get_json(&["api", "model"]).await
    }

    pub async fn set_model(&self, model: &str) -> Result<ModelSettings, ApiError> {
        let update = ModelUpdate {
            model: model.to_string(),
        };
        self.post_json(&["api", "model"], &update).await
    }

    pub async fn generation(&self) -> Result<GenerationState, ApiError> {
        self.get_json(&["api", "generation"]).await
    }

    pub async fn set_generation(
        &self,
        settings: &GenerationSettings,
    ) -> Result<GenerationSettings, ApiError> {
        self.post_json(&["api", "generation"], settings).await
    }

    pub async fn samples(&self) -> Result<Vec<Sample>, ApiError> {
        self.get_json(&["api", "samples"]).await
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ApiError> {
        let url = self.url(&["api", "chat", "stream"])?;
        debug!(%url, chat_id = ?request.chat_id, "opening chat stream");
        let response = self
            .client
            .post(url)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Err(ApiError::MissingBody);
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ApiError::from));
        Ok(Box::pin(body))
    }

    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, ApiError> {
        self.post_json(&["api", "chat"], request).await
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, ApiError> {
        self.get_json(&["api", "sessions"]).await
    }

    async fn chat_history(&self, chat_id: &str) -> Result<ChatHistory, ApiError> {
        self.get_json(&["api", "chat", chat_id]).await
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let response = ensure_success(response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::InvalidResponse(err.to_string()))
}
