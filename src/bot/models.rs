//! Known model identifiers and their capabilities.

/// Models that accept the `web_search` tool declaration.
const WEB_SEARCH_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-2024-05-13",
    "gpt-4o-2024-08-06",
    "gpt-4o-2024-11-20",
    "chatgpt-4o-latest",
    "gpt-4o-mini",
    "gpt-4o-mini-2024-07-18",
    "gpt-4-turbo",
    "gpt-4-turbo-2024-04-09",
    "gpt-4-0125-preview",
    "gpt-4-1106-preview",
    "gpt-4-turbo-preview",
    "gpt-4",
    "gpt-4.1",
    "gpt-4.1-2025-04-14",
    "gpt-4.1-mini",
    "gpt-4.1-mini-2025-04-14",
    "gpt-4.1-nano",
    "gpt-4.1-nano-2025-04-14",
    "gpt-4.5-preview",
    "gpt-4.5-preview-2025-02-27",
    "o1-mini",
    "o1-mini-2024-09-12",
    "o1-preview",
    "o1-preview-2024-09-12",
    "o1",
    "o1-2024-12-17",
    "o3",
    "o3-2025-04-16",
    "o3-mini",
    "o3-mini-2025-01-31",
    "o4-mini",
    "o4-mini-2025-04-16",
];

/// Selectable models that must never be sent tool declarations.
const PLAIN_MODELS: &[&str] = &["gpt-3.5-turbo", "gpt-3.5-turbo-0125"];

/// Prefixes of the reasoning family (max_completion_tokens, no temperature).
const REASONING_PREFIXES: &[&str] = &["o1", "o3"];

pub fn is_web_search_capable(model: &str) -> bool {
    WEB_SEARCH_MODELS.contains(&model)
}

pub fn is_supported(model: &str) -> bool {
    is_web_search_capable(model) || PLAIN_MODELS.contains(&model)
}

pub fn supported_models() -> Vec<&'static str> {
    WEB_SEARCH_MODELS.iter().chain(PLAIN_MODELS).copied().collect()
}

pub fn is_reasoning_model(model: &str) -> bool {
    REASONING_PREFIXES.iter().any(|p| model.starts_with(p))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedModel(pub String);

impl std::fmt::Display for UnsupportedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unsupported model '{}'", self.0)
    }
}

impl std::error::Error for UnsupportedModel {}
