//! Fixed catalog of themed digests, one command each.

use std::fmt;

use crate::bot::prompts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DigestType {
    Crypto,
    Tech,
    RealEstate,
    Business,
    Investment,
    Startup,
    Global,
}

impl DigestType {
    pub const ALL: [DigestType; 7] = [
        DigestType::Crypto,
        DigestType::Tech,
        DigestType::RealEstate,
        DigestType::Business,
        DigestType::Investment,
        DigestType::Startup,
        DigestType::Global,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DigestType::Crypto => "crypto",
            DigestType::Tech => "tech",
            DigestType::RealEstate => "realestate",
            DigestType::Business => "business",
            DigestType::Investment => "investment",
            DigestType::Startup => "startup",
            DigestType::Global => "global",
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            DigestType::Crypto => "Crypto digest",
            DigestType::Tech => "Tech digest",
            DigestType::RealEstate => "Real estate digest",
            DigestType::Business => "Business digest",
            DigestType::Investment => "Investment digest",
            DigestType::Startup => "Startup digest",
            DigestType::Global => "Global digest",
        }
    }

    fn prompt(self) -> &'static str {
        match self {
            DigestType::Crypto => prompts::CRYPTO_DIGEST_PROMPT,
            DigestType::Tech => prompts::TECH_DIGEST_PROMPT,
            DigestType::RealEstate => prompts::REAL_ESTATE_DIGEST_PROMPT,
            DigestType::Business => prompts::BUSINESS_DIGEST_PROMPT,
            DigestType::Investment => prompts::INVESTMENT_DIGEST_PROMPT,
            DigestType::Startup => prompts::STARTUP_DIGEST_PROMPT,
            DigestType::Global => prompts::GLOBAL_DIGEST_PROMPT,
        }
    }
}

impl fmt::Display for DigestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DigestConfig {
    pub kind: DigestType,
    pub name: &'static str,
    /// Command without the leading slash.
    pub command: &'static str,
    pub prompt: String,
}

/// Immutable digest catalog, in [`DigestType::ALL`] order.
pub struct DigestCatalog {
    configs: Vec<DigestConfig>,
}

impl DigestCatalog {
    pub fn new() -> Self {
        let configs = DigestType::ALL
            .iter()
            .map(|&kind| DigestConfig {
                kind,
                name: kind.display_name(),
                command: kind.as_str(),
                prompt: prompts::with_footer(kind.prompt()),
            })
            .collect();
        Self { configs }
    }

    pub fn get(&self, kind: DigestType) -> Option<&DigestConfig> {
        self.configs.iter().find(|c| c.kind == kind)
    }

    pub fn by_command(&self, command: &str) -> Option<&DigestConfig> {
        self.configs.iter().find(|c| c.command == command)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DigestConfig> {
        self.configs.iter()
    }
}

impl Default for DigestCatalog {
    fn default() -> Self {
        Self::new()
    }
}
