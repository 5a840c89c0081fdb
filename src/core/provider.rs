//! Provider identifiers and selection.
//!
//! The provider set is closed: every analysis backend the product can call is
//! a variant here, so result maps and ledger rows are keyed by a type rather
//! than by free-form strings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CogError, Result};

// =============================================================================
// Provider Enum
// =============================================================================

/// Supported analysis providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    DeepSeek,
    Perplexity,
}

impl Provider {
    /// All providers in display order.
    pub const ALL: &'static [Self] = &[Self::OpenAi, Self::Anthropic, Self::DeepSeek, Self::Perplexity];

    /// CLI name for this provider.
    #[must_use]
    pub const fn cli_name(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::DeepSeek => "deepseek",
            Self::Perplexity => "perplexity",
        }
    }

    /// Display name for human output.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::DeepSeek => "DeepSeek",
            Self::Perplexity => "Perplexity",
        }
    }

    /// Parse from CLI argument.
    pub fn from_cli_name(name: &str) -> Result<Self> {
        let lower = name.trim().to_lowercase();
        Self::ALL
            .iter()
            .find(|p| p.cli_name() == lower)
            .copied()
            .ok_or_else(|| CogError::InvalidProvider(name.to_string()))
    }

    /// Default timeout for one analysis call.
    ///
    /// Long-form profile generation is slow; search-backed providers are slower still.
    #[must_use]
    pub const fn default_timeout(self) -> Duration {
        match self {
            Self::Perplexity => Duration::from_secs(120),
            Self::DeepSeek => Duration::from_secs(150),
            Self::OpenAi | Self::Anthropic => Duration::from_secs(90),
        }
    }

    /// Default model requested from the backend when none is configured.
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o",
            Self::Anthropic => "claude-sonnet-4",
            Self::DeepSeek => "deepseek-chat",
            Self::Perplexity => "sonar-pro",
        }
    }

    /// Environment variable holding the API key when none is configured.
    #[must_use]
    pub const fn default_api_key_env(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::DeepSeek => "DEEPSEEK_API_KEY",
            Self::Perplexity => "PERPLEXITY_API_KEY",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.cli_name())
    }
}

impl std::str::FromStr for Provider {
    type Err = CogError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_cli_name(s)
    }
}

// =============================================================================
// Provider Selection
// =============================================================================

/// Provider selection from CLI arguments or config.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProviderSelection {
    /// All providers.
    #[default]
    All,
    /// Explicit list of providers.
    Custom(Vec<Provider>),
}

impl ProviderSelection {
    /// Parse from an argument: `all` or a comma-separated list of names.
    pub fn from_arg(arg: &str) -> Result<Self> {
        if arg.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }

        let providers = arg
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Provider::from_cli_name)
            .collect::<Result<Vec<_>>>()?;

        if providers.is_empty() {
            return Err(CogError::InvalidProvider(arg.to_string()));
        }

        Ok(Self::Custom(providers))
    }

    /// Get the providers in this selection.
    #[must_use]
    pub fn providers(&self) -> Vec<Provider> {
        match self {
            Self::All => Provider::ALL.to_vec(),
            Self::Custom(ps) => ps.clone(),
        }
    }
}
