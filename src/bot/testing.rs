//! In-memory stand-ins for the network and storage collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::bot::search::SearchProvider;
use crate::bot::telegram::MessageSender;
use crate::bot::whitelist::{WhitelistError, WhitelistStore};
use crate::openai::{
    ApiError, ChatCompleter, ChatMessage, ChatRequest, ChatResponse, Choice, FunctionCall,
    ResponseRequest, ResponsesApi, ToolCall,
};

/// Replays queued chat responses in order and records every request.
#[derive(Default)]
pub struct StubCompleter {
    responses: Mutex<VecDeque<Result<ChatResponse, ApiError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl StubCompleter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool_call_message(id: &str, name: &str, arguments: &str) -> ChatMessage {
        ChatMessage {
            content: None,
            tool_calls: vec![ToolCall {
                id: id.to_string(),
                kind: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            }],
            ..ChatMessage::assistant("")
        }
    }

    pub fn push_message(&self, message: ChatMessage) {
        self.responses.lock().unwrap().push_back(Ok(ChatResponse {
            choices: vec![Choice { message }],
        }));
    }

    pub fn push_text(&self, text: &str) {
        self.push_message(ChatMessage::assistant(text));
    }

    pub fn push_tool_call(&self, id: &str, name: &str, arguments: &str) {
        self.push_message(Self::tool_call_message(id, name, arguments));
    }

    /// A response with no choices.
    pub fn push_empty(&self) {
        self.responses.lock().unwrap().push_back(Ok(ChatResponse::default()));
    }

    pub fn push_error(&self, err: ApiError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompleter for StubCompleter {
    async fn create_chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Http("no stubbed response".into())))
    }
}

/// Never answers.
pub struct HangingCompleter;

#[async_trait]
impl ChatCompleter for HangingCompleter {
    async fn create_chat_completion(&self, _request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        std::future::pending().await
    }
}

#[derive(Default)]
pub struct StubResponses {
    results: Mutex<VecDeque<Result<String, ApiError>>>,
    requests: Mutex<Vec<ResponseRequest>>,
}

impl StubResponses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, text: &str) {
        self.results.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn push_err(&self, err: ApiError) {
        self.results.lock().unwrap().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<ResponseRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResponsesApi for StubResponses {
    async fn create_response(&self, request: &ResponseRequest) -> Result<String, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Http("no stubbed response".into())))
    }
}

/// Answers every query the same way and records what was asked.
pub struct StubSearch {
    result: Result<String, ApiError>,
    queries: Mutex<Vec<String>>,
}

impl StubSearch {
    pub fn returning(result: &str) -> Self {
        Self {
            result: Ok(result.to_string()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: ApiError) -> Self {
        Self {
            result: Err(err),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, query: &str) -> Result<String, ApiError> {
        self.queries.lock().unwrap().push(query.to_string());
        self.result.clone()
    }

    fn supports_model(&self, _model: &str) -> bool {
        true
    }
}

/// Records delivered messages. Chats listed as failing reject every send;
/// a per-chat budget makes sends fail once it is used up.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(i64, String)>>,
    failing: Vec<i64>,
    budgets: Mutex<HashMap<i64, usize>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(chats: &[i64]) -> Self {
        Self {
            failing: chats.to_vec(),
            ..Self::default()
        }
    }

    pub fn failing_after(chat_id: i64, successes: usize) -> Self {
        let sender = Self::default();
        sender.budgets.lock().unwrap().insert(chat_id, successes);
        sender
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, chat_id: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, text)| text)
            .collect()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), String> {
        if self.failing.contains(&chat_id) {
            return Err(format!("chat {chat_id} unreachable"));
        }
        if let Some(left) = self.budgets.lock().unwrap().get_mut(&chat_id) {
            if *left == 0 {
                return Err(format!("chat {chat_id} unreachable"));
            }
            *left -= 1;
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryWhitelist {
    ids: Mutex<Vec<i64>>,
}

impl MemoryWhitelist {
    pub fn with(ids: Vec<i64>) -> Self {
        Self { ids: Mutex::new(ids) }
    }
}

impl WhitelistStore for MemoryWhitelist {
    fn load(&self) -> Result<Vec<i64>, WhitelistError> {
        Ok(self.ids.lock().unwrap().clone())
    }

    fn add(&self, id: i64) -> Result<(), WhitelistError> {
        let mut ids = self.ids.lock().unwrap();
        if !ids.contains(&id) {
            ids.push(id);
        }
        Ok(())
    }

    fn remove(&self, id: i64) -> Result<(), WhitelistError> {
        self.ids.lock().unwrap().retain(|&v| v != id);
        Ok(())
    }
}
