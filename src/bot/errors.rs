//! User-facing rendering of completion failures.

use crate::openai::ApiError;

/// Classifies `err` by the text it renders to and returns a short reply for
/// the chat. Matching is case-insensitive; the first category wins.
pub fn format_api_error(err: &ApiError, model: &str) -> String {
    let text = err.to_string();
    let lower = text.to_lowercase();

    if lower.contains("insufficient_quota") {
        "❌ Not enough credits on the OpenAI account\n💡 Top up the balance on platform.openai.com".to_string()
    } else if lower.contains("invalid_api_key") {
        "❌ Invalid OpenAI API key\n💡 Check OPENAI_API_KEY".to_string()
    } else if lower.contains("model_not_found") {
        format!("❌ Model {model} is unavailable\n💡 Try /model gpt-4o")
    } else if lower.contains("rate_limit") {
        "⏳ Rate limit exceeded\n💡 Wait a little and try again".to_string()
    } else if lower.contains("timeout") || lower.contains("deadline") {
        "⏰ Request timed out\n💡 Try later or switch to another model".to_string()
    } else if lower.contains("network") {
        "🌐 Network problem\n💡 Check the connection".to_string()
    } else if lower.contains("unauthorized") {
        "🔐 Authorization failed\n💡 Check the OpenAI API key".to_string()
    } else {
        format!("❌ OpenAI error: {text}\n💡 Try later or use /model gpt-4o")
    }
}
