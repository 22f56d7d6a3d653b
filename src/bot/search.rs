//! Web search providers and the caching search service.
//!
//! Two strategies share the [`SearchProvider`] contract:
//! - [`ResponsesSearch`] asks the responses endpoint directly.
//! - [`ToolCallSearch`] goes through chat completions with the `web_search`
//!   function declared, resolving any tool calls via a nested provider.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::bot::cache::{CacheConfig, SearchCache, normalize_query};
use crate::bot::completion::sized_request;
use crate::bot::models;
use crate::bot::runtime::RuntimeSettings;
use crate::openai::{
    ApiError, ChatCompleter, ChatMessage, ChatRequest, ChatResponse, FunctionDefinition,
    ResponseRequest, ResponseTool, ResponsesApi, Tool,
};

pub const WEB_SEARCH_TOOL: &str = "web_search";

/// Tool message content used when a search came back empty.
pub const NO_RESULTS: &str = "no results";

pub fn web_search_tool() -> Tool {
    Tool {
        kind: "function",
        function: FunctionDefinition {
            name: WEB_SEARCH_TOOL,
            description: "Search the web for a query and return top results",
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query text"
                    }
                },
                "required": ["query"]
            }),
        },
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<String, ApiError>;
    fn supports_model(&self, model: &str) -> bool;
}

/// One call to the responses endpoint with the current model.
pub struct ResponsesSearch {
    api: Arc<dyn ResponsesApi>,
    settings: Arc<RuntimeSettings>,
}

impl ResponsesSearch {
    pub fn new(api: Arc<dyn ResponsesApi>, settings: Arc<RuntimeSettings>) -> Self {
        Self { api, settings }
    }
}

#[async_trait]
impl SearchProvider for ResponsesSearch {
    async fn search(&self, query: &str) -> Result<String, ApiError> {
        let cfg = self.settings.snapshot();
        let model = cfg.current_model.clone();
        debug!("🔍 responses search with {model}: {query}");

        let tools = if cfg.web_search && models::is_web_search_capable(&model) {
            vec![ResponseTool { kind: WEB_SEARCH_TOOL }]
        } else {
            Vec::new()
        };
        let request = ResponseRequest {
            model,
            input: query.to_string(),
            tools,
        };
        let text = self.api.create_response(&request).await?;
        Ok(text.trim().to_string())
    }

    fn supports_model(&self, model: &str) -> bool {
        models::is_web_search_capable(model)
    }
}

/// Search through the chat endpoint, letting the model decide what to look up.
///
/// For deployments whose API has no responses endpoint; `resolver` still does
/// the actual lookups.
pub struct ToolCallSearch {
    client: Arc<dyn ChatCompleter>,
    resolver: Arc<dyn SearchProvider>,
    settings: Arc<RuntimeSettings>,
}

impl ToolCallSearch {
    pub fn new(
        client: Arc<dyn ChatCompleter>,
        resolver: Arc<dyn SearchProvider>,
        settings: Arc<RuntimeSettings>,
    ) -> Self {
        Self {
            client,
            resolver,
            settings,
        }
    }
}

#[async_trait]
impl SearchProvider for ToolCallSearch {
    async fn search(&self, query: &str) -> Result<String, ApiError> {
        let cfg = self.settings.snapshot();
        debug!("🔍 tool-call search with {}: {query}", cfg.current_model);

        let mut request = sized_request(&cfg.current_model, vec![ChatMessage::user(query)], &cfg);
        if !cfg.tools_disabled() && models::is_web_search_capable(&cfg.current_model) {
            request.tools = vec![web_search_tool()];
        } else {
            request.tool_choice = None;
        }

        let response = self.client.create_chat_completion(&request).await?;
        let reply = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or(ApiError::Empty)?;

        if let Some(follow_up) =
            follow_up_tool_calls(self.client.as_ref(), &request, &reply, self.resolver.as_ref())
                .await?
        {
            return first_text(&follow_up).ok_or(ApiError::Empty);
        }
        Ok(reply.text().trim().to_string())
    }

    fn supports_model(&self, model: &str) -> bool {
        models::is_web_search_capable(model)
    }
}

/// Wraps a provider with a result cache.
pub struct SearchService {
    provider: Arc<dyn SearchProvider>,
    cache: Arc<dyn SearchCache>,
    config: CacheConfig,
}

impl SearchService {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        cache: Arc<dyn SearchCache>,
        config: CacheConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            config,
        }
    }
}

#[async_trait]
impl SearchProvider for SearchService {
    async fn search(&self, query: &str) -> Result<String, ApiError> {
        let normalized = normalize_query(query);

        if !self.config.disabled {
            if let Some(hit) = self.cache.get(&normalized) {
                debug!("🔍 cache hit: {normalized}");
                return Ok(hit);
            }
        }

        let result = self.provider.search(&normalized).await?;
        if !self.config.disabled && !result.is_empty() {
            self.cache.set(&normalized, &result);
        }
        Ok(result)
    }

    fn supports_model(&self, model: &str) -> bool {
        self.provider.supports_model(model)
    }
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
}

/// Resolves the `web_search` tool calls carried by `reply` and re-asks the
/// model with the results appended to `request`'s conversation.
///
/// Returns `Ok(None)` when no tool call was usable: other function names are
/// ignored and calls with undecodable arguments are skipped. A failed search
/// is reported to the model as the tool result.
pub async fn follow_up_tool_calls(
    client: &dyn ChatCompleter,
    request: &ChatRequest,
    reply: &ChatMessage,
    resolver: &dyn SearchProvider,
) -> Result<Option<ChatResponse>, ApiError> {
    let mut tool_messages = Vec::with_capacity(reply.tool_calls.len());

    for call in &reply.tool_calls {
        if call.function.name != WEB_SEARCH_TOOL {
            debug!("Ignoring tool call {}", call.function.name);
            continue;
        }
        let args: SearchArgs = match serde_json::from_str(&call.function.arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!("⚠️ Skipping tool call {}: bad arguments: {e}", call.id);
                continue;
            }
        };

        info!("🔍 web_search: {}", args.query);
        let mut result = match resolver.search(&args.query).await {
            Ok(result) => result,
            Err(e) => {
                warn!("⚠️ web_search '{}' failed: {e}", args.query);
                e.to_string()
            }
        };
        if result.trim().is_empty() {
            result = NO_RESULTS.to_string();
        }
        tool_messages.push(ChatMessage::tool(call.id.clone(), result));
    }

    if tool_messages.is_empty() {
        return Ok(None);
    }

    let mut follow_up = request.clone();
    follow_up.messages.push(reply.clone());
    follow_up.messages.extend(tool_messages);

    client.create_chat_completion(&follow_up).await.map(Some)
}

/// Trimmed text of the first choice, if there is one.
pub fn first_text(response: &ChatResponse) -> Option<String> {
    response.choices.first().map(|c| c.message.text().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::cache::MemoryCache;
    use crate::bot::runtime::RuntimeConfig;
    use crate::bot::testing::{StubCompleter, StubResponses, StubSearch};
    use crate::openai::Role;

    fn settings(model: &str) -> Arc<RuntimeSettings> {
        Arc::new(RuntimeSettings::new(RuntimeConfig {
            current_model: model.to_string(),
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn test_responses_search_attaches_tool_for_capable_model() {
        let api = Arc::new(StubResponses::new());
        api.push_ok("  result text \n");
        let search = ResponsesSearch::new(api.clone(), settings("gpt-4o"));

        let text = search.search("rust news").await.unwrap();
        assert_eq!(text, "result text");

        let requests = api.requests();
        assert_eq!(requests[0].model, "gpt-4o");
        assert_eq!(requests[0].input, "rust news");
        assert_eq!(requests[0].tools, vec![ResponseTool { kind: "web_search" }]);
    }

    #[tokio::test]
    async fn test_responses_search_no_tool_for_plain_model() {
        let api = Arc::new(StubResponses::new());
        api.push_ok("x");
        let search = ResponsesSearch::new(api.clone(), settings("gpt-3.5-turbo"));
        search.search("q").await.unwrap();
        assert!(api.requests()[0].tools.is_empty());
    }

    #[tokio::test]
    async fn test_responses_search_propagates_errors() {
        let api = Arc::new(StubResponses::new());
        api.push_err(ApiError::Timeout);
        let search = ResponsesSearch::new(api, settings("gpt-4o"));
        assert_eq!(search.search("q").await, Err(ApiError::Timeout));
    }

    #[tokio::test]
    async fn test_tool_call_search_resolves_and_follows_up() {
        let client = Arc::new(StubCompleter::new());
        client.push_tool_call("call_1", "web_search", r#"{"query":"btc price"}"#);
        client.push_text(" final answer ");
        let resolver = Arc::new(StubSearch::returning("42k"));
        let search = ToolCallSearch::new(client.clone(), resolver.clone(), settings("gpt-4o"));

        let text = search.search("what is btc at").await.unwrap();
        assert_eq!(text, "final answer");
        assert_eq!(resolver.queries(), vec!["btc price".to_string()]);

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools.len(), 1);
        let last = requests[1].messages.last().unwrap();
        assert_eq!(last.role, Role::Tool);
        assert_eq!(last.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(last.text(), "42k");
    }

    #[tokio::test]
    async fn test_tool_call_search_without_calls_returns_first_round() {
        let client = Arc::new(StubCompleter::new());
        client.push_text("direct");
        let search = ToolCallSearch::new(
            client.clone(),
            Arc::new(StubSearch::returning("unused")),
            settings("gpt-4o"),
        );
        assert_eq!(search.search("q").await.unwrap(), "direct");
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_tool_call_search_zero_choices_is_error() {
        let client = Arc::new(StubCompleter::new());
        client.push_empty();
        let search = ToolCallSearch::new(client, Arc::new(StubSearch::returning("")), settings("gpt-4o"));
        assert_eq!(search.search("q").await, Err(ApiError::Empty));
    }

    #[tokio::test]
    async fn test_follow_up_substitutes_placeholder_for_empty_result() {
        let client = StubCompleter::new();
        client.push_text("done");
        let resolver = StubSearch::returning("   ");
        let request = ChatRequest {
            model: "gpt-4o".into(),
            messages: vec![ChatMessage::user("q")],
            ..Default::default()
        };
        let reply = StubCompleter::tool_call_message("c1", "web_search", r#"{"query":"x"}"#);

        let out = follow_up_tool_calls(&client, &request, &reply, &resolver).await.unwrap();
        assert_eq!(out.as_ref().and_then(first_text).as_deref(), Some("done"));

        let sent = &client.requests()[0].messages;
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1].tool_calls[0].id, "c1");
        assert_eq!(sent[2].text(), NO_RESULTS);
    }

    #[tokio::test]
    async fn test_follow_up_skips_bad_arguments_and_other_tools() {
        let client = StubCompleter::new();
        let resolver = StubSearch::returning("r");
        let request = ChatRequest::default();
        let mut reply = StubCompleter::tool_call_message("c1", "web_search", "{not json");
        reply
            .tool_calls
            .extend(StubCompleter::tool_call_message("c2", "get_weather", r#"{"query":"x"}"#).tool_calls);

        let out = follow_up_tool_calls(&client, &request, &reply, &resolver).await.unwrap();
        assert_eq!(out, None);
        assert!(client.requests().is_empty());
        assert!(resolver.queries().is_empty());
    }

    #[tokio::test]
    async fn test_follow_up_keeps_valid_calls_when_one_is_malformed() {
        let client = StubCompleter::new();
        client.push_text("merged");
        let resolver = StubSearch::returning("r");
        let mut reply = StubCompleter::tool_call_message("c1", "web_search", "oops");
        reply
            .tool_calls
            .extend(StubCompleter::tool_call_message("c2", "web_search", r#"{"query":"ok"}"#).tool_calls);

        let out = follow_up_tool_calls(&client, &ChatRequest::default(), &reply, &resolver)
            .await
            .unwrap();
        assert_eq!(out.as_ref().and_then(first_text).as_deref(), Some("merged"));
        let sent = &client.requests()[0].messages;
        assert_eq!(sent.last().unwrap().tool_call_id.as_deref(), Some("c2"));
    }

    #[tokio::test]
    async fn test_follow_up_reports_search_failure_to_model() {
        let client = StubCompleter::new();
        client.push_text("answer without search");
        let resolver = StubSearch::failing(ApiError::Http("search down".into()));
        let reply = StubCompleter::tool_call_message("c1", "web_search", r#"{"query":"x"}"#);

        let out = follow_up_tool_calls(&client, &ChatRequest::default(), &reply, &resolver)
            .await
            .unwrap();
        assert_eq!(out.as_ref().and_then(first_text).as_deref(), Some("answer without search"));

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        let tool = requests[0].messages.last().unwrap();
        assert_eq!(tool.role, Role::Tool);
        assert_eq!(tool.text(), ApiError::Http("search down".into()).to_string());
    }

    #[tokio::test]
    async fn test_follow_up_zero_choices_has_no_text() {
        let client = StubCompleter::new();
        client.push_empty();
        let resolver = StubSearch::returning("r");
        let reply = StubCompleter::tool_call_message("c1", "web_search", r#"{"query":"x"}"#);

        let out = follow_up_tool_calls(&client, &ChatRequest::default(), &reply, &resolver)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first_text(&out), None);
    }

    #[tokio::test]
    async fn test_tool_call_search_skips_tool_for_plain_model() {
        let client = Arc::new(StubCompleter::new());
        client.push_text("plain");
        let search = ToolCallSearch::new(
            client.clone(),
            Arc::new(StubSearch::returning("unused")),
            settings("gpt-3.5-turbo"),
        );
        assert_eq!(search.search("q").await.unwrap(), "plain");

        let body = serde_json::to_value(&client.requests()[0]).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[tokio::test]
    async fn test_tool_call_search_empty_follow_up_is_error() {
        let client = Arc::new(StubCompleter::new());
        client.push_tool_call("call_1", "web_search", r#"{"query":"q"}"#);
        client.push_empty();
        let search = ToolCallSearch::new(client.clone(), Arc::new(StubSearch::returning("r")), settings("gpt-4o"));
        assert_eq!(search.search("q").await, Err(ApiError::Empty));
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_service_serves_hits_from_cache() {
        let provider = Arc::new(StubSearch::returning("fresh"));
        let cache = Arc::new(MemoryCache::new(CacheConfig::default()));
        let service = SearchService::new(provider.clone(), cache, CacheConfig::default());

        assert_eq!(service.search("  Rust  News ").await.unwrap(), "fresh");
        assert_eq!(service.search("rust news").await.unwrap(), "fresh");
        assert_eq!(provider.queries(), vec!["rust news".to_string()]);
    }

    #[tokio::test]
    async fn test_service_does_not_cache_empty_results() {
        let provider = Arc::new(StubSearch::returning(""));
        let cache = Arc::new(MemoryCache::new(CacheConfig::default()));
        let service = SearchService::new(provider.clone(), cache.clone(), CacheConfig::default());

        service.search("q").await.unwrap();
        service.search("q").await.unwrap();
        assert_eq!(provider.queries().len(), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_service_disabled_bypasses_cache() {
        let provider = Arc::new(StubSearch::returning("r"));
        let cache = Arc::new(MemoryCache::new(CacheConfig::default()));
        let config = CacheConfig {
            disabled: true,
            ..Default::default()
        };
        let service = SearchService::new(provider.clone(), cache.clone(), config);

        service.search("q").await.unwrap();
        service.search("q").await.unwrap();
        assert_eq!(provider.queries().len(), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_service_propagates_provider_error() {
        let service = SearchService::new(
            Arc::new(StubSearch::failing(ApiError::Timeout)),
            Arc::new(MemoryCache::new(CacheConfig::default())),
            CacheConfig::default(),
        );
        assert_eq!(service.search("q").await, Err(ApiError::Timeout));
    }
}
