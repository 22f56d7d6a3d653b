pub mod bot;
pub mod config;
pub mod openai;
pub mod telegram_log;
