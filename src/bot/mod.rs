//! Digest bot: completion pipeline, search, tasks and scheduled broadcast.

pub mod blockchain;
pub mod cache;
pub mod commands;
pub mod completion;
pub mod digest;
pub mod errors;
pub mod models;
pub mod prompts;
pub mod runtime;
pub mod scheduler;
pub mod search;
pub mod tasks;
pub mod telegram;
pub mod whitelist;

#[cfg(test)]
pub(crate) mod testing;

pub use commands::{CommandRouter, Incoming};
pub use completion::CompletionEngine;
pub use runtime::{RuntimeConfig, RuntimeSettings};
pub use scheduler::{FailurePolicy, Scheduler};
pub use telegram::TelegramClient;
