//! Completion API client: chat completions and the responses endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Ceiling for a single HTTP round trip.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Result of a tool call, tagged with the id of the call it answers.
    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::new(Role::Tool, content)
        }
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, exactly as the model produced them.
    #[serde(default)]
    pub arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

/// A function tool declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: serde_json::Value,
}

/// Chat completion request. `max_tokens` and `max_completion_tokens` are
/// mutually exclusive; which one is set depends on the model family.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseRequest {
    pub model: String,
    pub input: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ResponseTool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseTool {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseBody {
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
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: String,
}

impl ResponseBody {
    fn into_text(self) -> String {
        if let Some(text) = self.output_text {
            return text;
        }
        self.output
            .into_iter()
            .flat_map(|item| item.content)
            .filter(|c| c.kind == "output_text")
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Anything that can run a chat completion.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    async fn create_chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError>;
}

/// Anything that can run a request against the responses endpoint.
#[async_trait]
pub trait ResponsesApi: Send + Sync {
    /// Returns the output text of the response, untrimmed.
    async fn create_response(&self, request: &ResponseRequest) -> Result<String, ApiError>;
}

pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn post<T: Serialize + ?Sized>(&self, endpoint: &str, body: &T) -> Result<String, ApiError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("POST {url}");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let status = response.status();
        let text = response.text().await.map_err(ApiError::from_transport)?;

        if !status.is_success() {
            debug!("{endpoint} returned {status}");
            return Err(ApiError::Api {
                status: status.as_u16(),
                body: text.trim().to_string(),
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl ChatCompleter for OpenAiClient {
    async fn create_chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        let body = self.post("chat/completions", request).await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ResponsesApi for OpenAiClient {
    async fn create_response(&self, request: &ResponseRequest) -> Result<String, ApiError> {
        let body = self.post("responses", request).await?;
        let parsed: ResponseBody =
            serde_json::from_str(&body).map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(parsed.into_text())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Connection-level failure.
    Http(String),
    /// The request or the surrounding deadline ran out.
    Timeout,
    /// Non-2xx status with the raw body.
    Api { status: u16, body: String },
    Parse(String),
    Empty,
}

impl ApiError {
    fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Http(e.to_string())
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Http(e) => write!(f, "network error: {e}"),
            ApiError::Timeout => write!(f, "request timeout"),
            ApiError::Api { status, body } => {
                let reason = reqwest::StatusCode::from_u16(*status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("");
                write!(f, "API error {status} {reason}: {body}")
            }
            ApiError::Parse(e) => write!(f, "parse error: {e}"),
            ApiError::Empty => write!(f, "empty response"),
        }
    }
}

impl std::error::Error for ApiError {}
