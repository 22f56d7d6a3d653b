//! Slash-command dispatch.
//!
//! Lookup order: fixed commands, then digest commands, then task names.
//! Anything else is ignored.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::bot::blockchain::BlockchainClient;
use crate::bot::completion::CompletionEngine;
use crate::bot::digest::DigestCatalog;
use crate::bot::errors::format_api_error;
use crate::bot::models;
use crate::bot::tasks::{TaskRegistry, Templater, format_task_names, format_tasks};
use crate::bot::telegram::{MessageSender, send_long};
use crate::bot::whitelist::{WhitelistStore, format_whitelist};

pub const EMPTY_RESPONSE: &str = "❌ Empty response received";

const FIXED_COMMANDS: &[(&str, &str)] = &[
    ("chat", "<text> – ask the bot a question"),
    ("ping", "health check"),
    ("help", "show this list"),
    ("start", "subscribe this chat to broadcasts"),
    ("whitelist", "list subscribed chats"),
    ("remove", "<id> – unsubscribe a chat"),
    ("model", "[name] – show or switch the model"),
    ("websearch", "[on|off] – show or toggle web search"),
    ("config", "show runtime settings"),
    ("tasks", "show the task schedule"),
    ("task", "[name] – list tasks or run one"),
    ("blockchain", "bitcoin network stats"),
];

/// Splits `/name@bot args` into `("name", "args")`.
pub fn parse_command(text: &str) -> Option<(&str, &str)> {
    let rest = text.trim_start().strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    Some((name, args))
}

/// An inbound chat message.
#[derive(Debug, Clone)]
pub struct Incoming {
    pub chat_id: i64,
    /// Sender's user id; their private chat shares this id.
    pub user_id: Option<i64>,
    pub text: String,
}

pub struct CommandRouter {
    engine: Arc<CompletionEngine>,
    registry: Arc<TaskRegistry>,
    digests: DigestCatalog,
    templater: Arc<Templater>,
    whitelist: Arc<dyn WhitelistStore>,
    sender: Arc<dyn MessageSender>,
    blockchain: BlockchainClient,
    timeout: Duration,
}

impl CommandRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: Arc<CompletionEngine>,
        registry: Arc<TaskRegistry>,
        digests: DigestCatalog,
        templater: Arc<Templater>,
        whitelist: Arc<dyn WhitelistStore>,
        sender: Arc<dyn MessageSender>,
        blockchain: BlockchainClient,
        timeout: Duration,
    ) -> Self {
        Self {
            engine,
            registry,
            digests,
            templater,
            whitelist,
            sender,
            blockchain,
            timeout,
        }
    }

    /// Human-readable command list, including one line per named task.
    pub fn commands_list(&self) -> String {
        self.menu()
            .into_iter()
            .map(|(name, description)| format!("/{name} – {description}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `(command, description)` pairs for the bot menu.
    pub fn menu(&self) -> Vec<(String, String)> {
        let mut menu: Vec<(String, String)> = FIXED_COMMANDS
            .iter()
            .map(|(n, d)| (n.to_string(), d.to_string()))
            .collect();
        menu.extend(
            self.digests
                .iter()
                .map(|d| (d.command.to_string(), d.name.to_lowercase())),
        );
        for task in self.registry.snapshot().iter() {
            if self.is_task_command(&task.name) {
                menu.push((task.name.clone(), "run task".to_string()));
            }
        }
        menu
    }

    fn is_task_command(&self, name: &str) -> bool {
        !name.is_empty()
            && !FIXED_COMMANDS.iter().any(|(n, _)| *n == name)
            && self.digests.by_command(name).is_none()
    }

    /// Handles `msg` if it is a known command. Returns false when ignored.
    pub async fn handle(&self, msg: &Incoming) -> bool {
        let Some((name, args)) = parse_command(&msg.text) else {
            return false;
        };
        let chat = msg.chat_id;

        match name {
            "ping" => self.reply(chat, "pong").await,
            "help" => self.reply(chat, &self.commands_list()).await,
            "start" => {
                if let Err(e) = self.whitelist.add(chat) {
                    error!("❌ whitelist add failed: {e}");
                }
                self.reply(chat, "Bot activated").await;
            }
            "whitelist" => match self.whitelist.load() {
                Ok(ids) if ids.is_empty() => self.reply(chat, "Whitelist is empty").await,
                Ok(ids) => self.reply(chat, &format_whitelist(&ids)).await,
                Err(e) => {
                    error!("❌ whitelist load failed: {e}");
                    self.reply(chat, "❌ Cannot load whitelist").await;
                }
            },
            "remove" => self.remove(chat, args).await,
            "model" => self.model(chat, args).await,
            "websearch" => self.websearch(chat, args).await,
            "config" => {
                let text = self.engine.settings().snapshot().describe();
                self.reply(chat, &text).await;
            }
            "tasks" => self.reply(chat, &format_tasks(&self.registry.snapshot())).await,
            "task" => {
                if args.is_empty() {
                    self.reply(chat, &format_task_names(&self.registry.snapshot())).await;
                } else {
                    self.run_task(chat, args).await;
                }
            }
            "blockchain" => match self.blockchain.fetch().await {
                Ok(stats) => self.reply(chat, &stats.format()).await,
                Err(e) => {
                    error!("❌ blockchain fetch failed: {e}");
                    self.reply(chat, "blockchain error").await;
                }
            },
            "chat" => self.chat(msg, args).await,
            other => {
                if let Some(digest) = self.digests.by_command(other) {
                    info!("📰 {} requested in {chat}", digest.name);
                    let model = self.engine.settings().current_model();
                    let prompt = self.templater.apply(&digest.prompt, &model);
                    self.complete_and_reply(chat, chat, &prompt, &model, false).await;
                } else if self.registry.resolve(other).is_some() {
                    self.run_task(chat, other).await;
                } else {
                    return false;
                }
            }
        }
        true
    }

    async fn remove(&self, chat: i64, args: &str) {
        if args.is_empty() {
            self.reply(chat, "Usage: /remove <id>").await;
            return;
        }
        let Ok(id) = args.parse::<i64>() else {
            self.reply(chat, "Invalid id. Example: /remove 123456789").await;
            return;
        };
        match self.whitelist.remove(id) {
            Ok(()) => self.reply(chat, "ID removed from whitelist.").await,
            Err(e) => {
                error!("❌ whitelist remove failed: {e}");
                self.reply(chat, "❌ Cannot update whitelist").await;
            }
        }
    }

    async fn model(&self, chat: i64, args: &str) {
        let settings = self.engine.settings();
        if args.is_empty() {
            let text = format!(
                "Current model: {}\nSupported: {}",
                settings.current_model(),
                models::supported_models().join(", ")
            );
            self.reply(chat, &text).await;
            return;
        }
        match settings.set_current_model(args) {
            Ok(()) => {
                info!("🔄 Model switched to {args}");
                self.reply(chat, &format!("Model set to {args}")).await;
            }
            Err(e) => self.reply(chat, &format!("❌ {e}")).await,
        }
    }

    async fn websearch(&self, chat: i64, args: &str) {
        let settings = self.engine.settings();
        let enabled = match args.to_lowercase().as_str() {
            "" => {
                let state = if settings.snapshot().web_search { "on" } else { "off" };
                self.reply(chat, &format!("Web search: {state}")).await;
                return;
            }
            "on" | "true" | "1" => true,
            "off" | "false" | "0" => false,
            _ => {
                self.reply(chat, "Usage: /websearch [on|off]").await;
                return;
            }
        };
        settings.set_web_search(enabled);
        let state = if enabled { "on" } else { "off" };
        self.reply(chat, &format!("Web search {state}")).await;
    }

    async fn run_task(&self, chat: i64, name: &str) {
        let Some(task) = self.registry.resolve(name) else {
            self.reply(chat, "Task not found").await;
            return;
        };
        let current = self.engine.settings().current_model();
        let model = task.effective_model(&current).to_string();
        let prompt = self.templater.apply(&task.prompt, &model);
        self.complete_and_reply(chat, chat, &prompt, &model, false).await;
    }

    async fn chat(&self, msg: &Incoming, args: &str) {
        if args.is_empty() {
            self.reply(msg.chat_id, "Usage: /chat <message>").await;
            return;
        }
        let model = self.engine.settings().current_model();
        let target = msg.user_id.unwrap_or(msg.chat_id);
        self.complete_and_reply(msg.chat_id, target, args, &model, true).await;
    }

    /// Runs a completion and replies to `target`. Failures are reported in
    /// `origin`, the chat the command came from.
    async fn complete_and_reply(&self, origin: i64, target: i64, prompt: &str, model: &str, as_user: bool) {
        let result = if as_user {
            self.engine.user_completion(prompt, model, self.timeout).await
        } else {
            self.engine.system_completion(prompt, model, self.timeout).await
        };
        match result {
            Ok(text) if text.is_empty() => self.reply(origin, EMPTY_RESPONSE).await,
            Ok(text) => self.reply(target, &text).await,
            Err(e) => {
                error!("❌ completion failed with {model}: {e}");
                self.reply(origin, &format_api_error(&e, model)).await;
            }
        }
    }

    async fn reply(&self, chat: i64, text: &str) {
        if let Err(e) = send_long(self.sender.as_ref(), chat, text).await {
            warn!("⚠️ Reply to {chat} failed: {e}");
        }
    }
}
