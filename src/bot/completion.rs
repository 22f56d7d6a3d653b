//! Completion engine: request building, dispatch, tool-call resolution.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tracing::{debug, warn};

use crate::bot::models;
use crate::bot::runtime::{RuntimeConfig, RuntimeSettings};
use crate::bot::search::{SearchProvider, first_text, follow_up_tool_calls, web_search_tool};
use crate::openai::{ApiError, ChatCompleter, ChatMessage, ChatRequest};

/// Deadline for interactive commands and scheduled runs.
pub const COMPLETION_TIMEOUT: Duration = Duration::from_secs(180);

const TEMPERATURE: f32 = 0.9;

/// Request with model-family sizing and passthrough fields, no tools.
///
/// Reasoning models get `max_completion_tokens` and no temperature; all
/// others get `temperature` and `max_tokens`.
pub(crate) fn sized_request(model: &str, messages: Vec<ChatMessage>, cfg: &RuntimeConfig) -> ChatRequest {
    let mut request = ChatRequest {
        model: model.to_string(),
        messages,
        ..Default::default()
    };
    if models::is_reasoning_model(model) {
        request.max_completion_tokens = Some(cfg.max_tokens);
    } else {
        request.temperature = Some(TEMPERATURE);
        request.max_tokens = Some(cfg.max_tokens);
    }
    if !cfg.service_tier.is_empty() {
        request.service_tier = Some(cfg.service_tier.clone());
    }
    if !cfg.reasoning_effort.is_empty() {
        request.reasoning_effort = Some(cfg.reasoning_effort.clone());
    }
    if !cfg.tool_choice.is_empty() && !cfg.tools_disabled() {
        request.tool_choice = Some(cfg.tool_choice.clone());
    }
    request
}

pub struct CompletionEngine {
    client: Arc<dyn ChatCompleter>,
    search: Arc<dyn SearchProvider>,
    settings: Arc<RuntimeSettings>,
}

impl CompletionEngine {
    pub fn new(
        client: Arc<dyn ChatCompleter>,
        search: Arc<dyn SearchProvider>,
        settings: Arc<RuntimeSettings>,
    ) -> Self {
        Self {
            client,
            search,
            settings,
        }
    }

    pub fn settings(&self) -> &Arc<RuntimeSettings> {
        &self.settings
    }

    /// Outbound request for `messages` against `model` under `cfg`.
    ///
    /// The `web_search` tool is declared only when search is enabled, the
    /// model is known to support it, and tool choice is not `"none"`.
    pub fn build_request(&self, messages: Vec<ChatMessage>, model: &str, cfg: &RuntimeConfig) -> ChatRequest {
        let mut request = sized_request(model, messages, cfg);
        if cfg.web_search && models::is_web_search_capable(model) && !cfg.tools_disabled() {
            request.tools = vec![web_search_tool()];
        } else {
            request.tool_choice = None;
        }
        request
    }

    /// Runs one completion and returns the trimmed text.
    ///
    /// An empty message list, a blank message, or a response without choices
    /// all yield `Ok("")`.
    pub async fn complete(&self, messages: Vec<ChatMessage>, model: &str) -> Result<String, ApiError> {
        if messages.is_empty() || messages.iter().any(|m| m.text().trim().is_empty()) {
            debug!("Skipping completion: empty conversation");
            return Ok(String::new());
        }

        let cfg = self.settings.snapshot();
        let mut messages = messages;
        messages.push(ChatMessage::system(format!(
            "Current datetime: {}",
            Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        )));

        let request = self.build_request(messages, model, &cfg);
        debug!(
            "🤖 completion: model={model} messages={} tools={}",
            request.messages.len(),
            request.tools.len()
        );

        let response = self.client.create_chat_completion(&request).await?;
        let Some(reply) = response.choices.into_iter().next().map(|c| c.message) else {
            debug!("Completion returned no choices");
            return Ok(String::new());
        };

        if cfg.web_search && !reply.tool_calls.is_empty() {
            if let Some(follow_up) =
                follow_up_tool_calls(self.client.as_ref(), &request, &reply, self.search.as_ref()).await?
            {
                return Ok(first_text(&follow_up).unwrap_or_default());
            }
        }

        let text = reply.text().trim().to_string();
        if text.is_empty() {
            warn!("⚠️ Empty completion from {model}");
        }
        Ok(text)
    }

    /// [`complete`](Self::complete) bound to a deadline. The in-flight call is
    /// dropped when it expires.
    pub async fn complete_within(
        &self,
        messages: Vec<ChatMessage>,
        model: &str,
        timeout: Duration,
    ) -> Result<String, ApiError> {
        tokio::time::timeout(timeout, self.complete(messages, model))
            .await
            .map_err(|_| ApiError::Timeout)?
    }

    /// Single system-role prompt, as used by scheduled tasks and digests.
    pub async fn system_completion(&self, prompt: &str, model: &str, timeout: Duration) -> Result<String, ApiError> {
        self.complete_within(vec![ChatMessage::system(prompt)], model, timeout).await
    }

    /// Single user-role message, as used by `/chat`.
    pub async fn user_completion(&self, message: &str, model: &str, timeout: Duration) -> Result<String, ApiError> {
        self.complete_within(vec![ChatMessage::user(message)], model, timeout).await
    }
}
