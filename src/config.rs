use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

use crate::bot::blockchain::DEFAULT_BLOCKCHAIN_API;
use crate::bot::cache::CacheConfig;
use crate::bot::models;
use crate::bot::runtime::RuntimeConfig;
use crate::bot::scheduler::FailurePolicy;
use crate::bot::tasks::{DEFAULT_BRIEF_TIME, DEFAULT_LUNCH_TIME, TaskSources};
use crate::openai::DEFAULT_BASE_URL;

/// Errors that can occur when loading configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    Missing(&'static str),
    /// A variable is set but cannot be parsed.
    Invalid { var: &'static str, message: String },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(var) => write!(f, "{var} is required"),
            Self::Invalid { var, message } => write!(f, "invalid {var}: {message}"),
            Self::Validation(msg) => write!(f, "config validation error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    /// Pinned broadcast chat. Overrides the whitelist when set.
    pub chat_id: Option<i64>,
    pub log_chat_id: Option<i64>,
    pub error_chat_id: Option<i64>,
    pub model: String,
    pub max_tokens: u32,
    pub web_search: bool,
    pub tool_choice: String,
    pub service_tier: String,
    pub reasoning_effort: String,
    pub base_prompt: String,
    pub blockchain_api: String,
    pub tasks_file: Option<PathBuf>,
    pub tasks_json: Option<String>,
    pub lunch_time: String,
    pub brief_time: String,
    pub timezone: Tz,
    pub whitelist_file: PathBuf,
    pub log_dir: PathBuf,
    pub exchange_api: String,
    pub chart_path: String,
    pub cache_ttl: Duration,
    pub cache_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let telegram_token = required("TELEGRAM_TOKEN")?;
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        match telegram_token.split_once(':') {
            Some((id, secret)) if id.parse::<u64>().is_ok() && !secret.is_empty() => {}
            _ => {
                return Err(ConfigError::Invalid {
                    var: "TELEGRAM_TOKEN",
                    message: "expected format 123456789:ABCdefGHI...".into(),
                });
            }
        }
        let openai_api_key = required("OPENAI_API_KEY")?;

        let model = or("OPENAI_MODEL", "gpt-4.1");
        if !models::is_supported(&model) {
            return Err(ConfigError::Validation(format!(
                "OPENAI_MODEL '{model}' is not supported (supported: {})",
                models::supported_models().join(", ")
            )));
        }

        let timezone = match get("TIMEZONE") {
            Some(name) => Tz::from_str(&name).map_err(|e| ConfigError::Invalid {
                var: "TIMEZONE",
                message: e.to_string(),
            })?,
            None => chrono_tz::Europe::Moscow,
        };

        Ok(Self {
            telegram_token,
            openai_api_key,
            openai_base_url: or("OPENAI_BASE_URL", DEFAULT_BASE_URL),
            chat_id: parse_opt(&get, "CHAT_ID")?,
            log_chat_id: parse_opt(&get, "LOG_CHAT_ID")?,
            error_chat_id: parse_opt(&get, "ERROR_CHAT_ID")?,
            model,
            max_tokens: parse_opt(&get, "OPENAI_MAX_TOKENS")?.unwrap_or(600),
            web_search: get("ENABLE_WEB_SEARCH").is_none_or(|v| parse_flag(&v)),
            tool_choice: or("OPENAI_TOOL_CHOICE", "auto"),
            service_tier: or("OPENAI_SERVICE_TIER", ""),
            reasoning_effort: or("OPENAI_REASONING_EFFORT", ""),
            base_prompt: or("BASE_PROMPT", ""),
            blockchain_api: or("BLOCKCHAIN_API", DEFAULT_BLOCKCHAIN_API),
            tasks_file: get("TASKS_FILE").map(PathBuf::from),
            tasks_json: get("TASKS_JSON"),
            lunch_time: or("LUNCH_TIME", DEFAULT_LUNCH_TIME),
            brief_time: or("BRIEF_TIME", DEFAULT_BRIEF_TIME),
            timezone,
            whitelist_file: PathBuf::from(or("WHITELIST_FILE", "whitelist.json")),
            log_dir: PathBuf::from(or("LOG_DIR", "logs")),
            exchange_api: or("EXCHANGE_API", ""),
            chart_path: or("CHART_PATH", ""),
            cache_ttl: Duration::from_secs(parse_opt(&get, "SEARCH_CACHE_TTL_SECS")?.unwrap_or(600)),
            cache_size: parse_opt(&get, "SEARCH_CACHE_SIZE")?.unwrap_or(100),
        })
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            current_model: self.model.clone(),
            max_tokens: self.max_tokens,
            web_search: self.web_search,
            tool_choice: self.tool_choice.clone(),
            service_tier: self.service_tier.clone(),
            reasoning_effort: self.reasoning_effort.clone(),
            base_prompt: self.base_prompt.clone(),
        }
    }

    pub fn task_sources(&self) -> TaskSources {
        TaskSources {
            file: self.tasks_file.clone(),
            json: self.tasks_json.clone(),
            lunch_time: self.lunch_time.clone(),
            brief_time: self.brief_time.clone(),
            ..TaskSources::default()
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: self.cache_ttl,
            max_size: self.cache_size,
            disabled: self.cache_size == 0,
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        match self.error_chat_id {
            Some(chat) => FailurePolicy::NotifyChat(chat),
            None => FailurePolicy::LogOnly,
        }
    }
}

fn parse_opt<T>(get: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    get(var)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::Invalid {
                var,
                message: format!("'{raw}': {e}"),
            })
        })
        .transpose()
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true")
}
