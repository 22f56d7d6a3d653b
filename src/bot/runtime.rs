//! Process-wide runtime settings, adjustable through admin commands.

use std::sync::{Arc, PoisonError, RwLock};

use crate::bot::models::{self, UnsupportedModel};

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub current_model: String,
    pub max_tokens: u32,
    pub web_search: bool,
    /// Empty means "let the API decide"; `"none"` strips tools entirely.
    pub tool_choice: String,
    pub service_tier: String,
    pub reasoning_effort: String,
    pub base_prompt: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            current_model: "gpt-4.1".to_string(),
            max_tokens: 600,
            web_search: true,
            tool_choice: "auto".to_string(),
            service_tier: String::new(),
            reasoning_effort: String::new(),
            base_prompt: String::new(),
        }
    }
}

impl RuntimeConfig {
    pub fn tools_disabled(&self) -> bool {
        self.tool_choice == "none"
    }

    pub fn describe(&self) -> String {
        let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
        format!(
            "Model: {}\nMax tokens: {}\nWeb search: {}\nTool choice: {}\nService tier: {}\nReasoning effort: {}",
            self.current_model,
            self.max_tokens,
            if self.web_search { "on" } else { "off" },
            or_dash(&self.tool_choice),
            or_dash(&self.service_tier),
            or_dash(&self.reasoning_effort),
        )
    }
}

/// Copy-on-write cell holding the current [`RuntimeConfig`].
///
/// Readers take a cheap `Arc` snapshot; writers clone, modify and swap the
/// whole struct under the write lock, so a snapshot is never half-updated.
pub struct RuntimeSettings {
    current: RwLock<Arc<RuntimeConfig>>,
}

impl RuntimeSettings {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    pub fn snapshot(&self) -> Arc<RuntimeConfig> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Atomic read-modify-write. The closure sees a private copy; on `Err`
    /// nothing is published.
    pub fn update<F, E>(&self, f: F) -> Result<Arc<RuntimeConfig>, E>
    where
        F: FnOnce(&mut RuntimeConfig) -> Result<(), E>,
    {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = RuntimeConfig::clone(&guard);
        f(&mut next)?;
        let next = Arc::new(next);
        *guard = next.clone();
        Ok(next)
    }

    pub fn current_model(&self) -> String {
        self.snapshot().current_model.clone()
    }

    /// Switches the global model. Unsupported identifiers are rejected and
    /// leave the settings untouched.
    pub fn set_current_model(&self, model: &str) -> Result<(), UnsupportedModel> {
        self.update(|cfg| {
            if !models::is_supported(model) {
                return Err(UnsupportedModel(model.to_string()));
            }
            cfg.current_model = model.to_string();
            Ok(())
        })
        .map(|_| ())
    }

    pub fn set_web_search(&self, enabled: bool) {
        let _ = self.update::<_, std::convert::Infallible>(|cfg| {
            cfg.web_search = enabled;
            Ok(())
        });
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}
