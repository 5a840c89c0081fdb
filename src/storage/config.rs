//! Configuration file loading and management.
//!
//! Loads configuration from:
//! - Linux: `~/.config/cogmeter/config.toml`
//! - macOS: `~/Library/Application Support/com.cogmeter.cogmeter/config.toml`
//! - Windows: `%APPDATA%/cogmeter/config/config.toml`
//!
//! ## Precedence
//!
//! Settings are resolved with the following precedence (highest first):
//! 1. CLI flags
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `COGMETER_PROVIDERS`: Comma-separated provider list (e.g., "openai,anthropic")
//! - `COGMETER_FORMAT`: Output format (human, json)
//! - `COGMETER_TIMEOUT`: Per-provider timeout in seconds
//! - `COGMETER_ACCOUNT`: Account billed for analyses
//! - `COGMETER_LEDGER`: Ledger database path
//! - `COGMETER_NO_COLOR` or `NO_COLOR`: Disable colors
//! - `COGMETER_PRETTY`: Pretty-print JSON output (1, true, yes)
//! - `COGMETER_CONFIG`: Override config file path

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::cli::args::{Cli, OutputFormat};
use crate::core::costs::CostSchedule;
use crate::core::models::AnalysisKind;
use crate::core::orchestrator::RetryPolicy;
use crate::core::preview::DEFAULT_EXCERPT_WORDS;
use crate::core::provider::{Provider, ProviderSelection};
use crate::error::{CogError, Result};

// =============================================================================
// Environment Variable Names
// =============================================================================

/// Environment variable for comma-separated provider list.
pub const ENV_PROVIDERS: &str = "COGMETER_PROVIDERS";
/// Environment variable for output format.
pub const ENV_FORMAT: &str = "COGMETER_FORMAT";
/// Environment variable for timeout in seconds.
pub const ENV_TIMEOUT: &str = "COGMETER_TIMEOUT";
/// Environment variable for the billed account.
pub const ENV_ACCOUNT: &str = "COGMETER_ACCOUNT";
/// Environment variable for the ledger database path.
pub const ENV_LEDGER: &str = "COGMETER_LEDGER";
/// Environment variable to disable colors.
pub const ENV_NO_COLOR: &str = "COGMETER_NO_COLOR";
/// Standard environment variable to disable colors.
pub const ENV_NO_COLOR_STD: &str = "NO_COLOR";
/// Environment variable for pretty JSON output.
pub const ENV_PRETTY: &str = "COGMETER_PRETTY";
/// Environment variable to override config file path.
pub const ENV_CONFIG: &str = "COGMETER_CONFIG";

/// Account used when nothing else names one.
pub const DEFAULT_ACCOUNT: &str = "default";

/// Upper bound for any configured timeout.
pub const MAX_TIMEOUT_SECONDS: u64 = 600;

// =============================================================================
// Command Overrides
// =============================================================================

/// Per-command CLI values that take part in resolution.
#[derive(Debug, Clone, Default)]
pub struct CommandOverrides {
    pub provider: Option<String>,
    pub account: Option<String>,
    pub timeout_seconds: Option<u64>,
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Fully resolved configuration after merging CLI, env vars, and config file.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Providers to call.
    pub providers: Vec<Provider>,
    /// Output format.
    pub format: OutputFormat,
    /// Effective timeout per provider.
    pub timeouts: BTreeMap<Provider, Duration>,
    /// Account billed for analyses.
    pub account: String,
    /// Ledger database path.
    pub ledger_path: PathBuf,
    /// Whether to disable colored output.
    pub no_color: bool,
    /// Whether to pretty-print JSON output.
    pub pretty: bool,
    /// Cost table.
    pub costs: CostSchedule,
    /// Orchestrator retry policy.
    pub retry: RetryPolicy,
    /// Preview excerpt length.
    pub excerpt_words: usize,
    /// The loaded file config (provider endpoints, keys, models).
    pub file: Config,
    /// Source of each setting for debugging.
    pub sources: ConfigSources,
}

/// Tracks the source of each configuration value.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub providers: ConfigSource,
    pub format: ConfigSource,
    pub timeout: ConfigSource,
    pub account: ConfigSource,
    pub ledger_path: ConfigSource,
    pub no_color: ConfigSource,
    pub pretty: ConfigSource,
}

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value from CLI flag.
    Cli,
    /// Value from environment variable.
    Env,
    /// Value from config file.
    ConfigFile,
    /// Built-in default.
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI flag"),
            Self::Env => write!(f, "environment variable"),
            Self::ConfigFile => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

impl ResolvedConfig {
    /// Resolve final configuration from CLI args, environment variables, and config file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file exists but is invalid
    /// - Any resolved value is invalid (e.g., unknown provider)
    pub fn resolve(cli: &Cli, overrides: &CommandOverrides) -> Result<Self> {
        let config = Self::load_config()?;
        Self::resolve_with(cli, overrides, config)
    }

    /// Resolve against an already-loaded config file.
    ///
    /// # Errors
    ///
    /// Same as [`ResolvedConfig::resolve`], minus file loading.
    pub fn resolve_with(cli: &Cli, overrides: &CommandOverrides, config: Config) -> Result<Self> {
        config.validate()?;

        let mut sources = ConfigSources::default();

        let providers = Self::resolve_providers(overrides, &config, &mut sources.providers)?;
        let format = Self::resolve_format(cli, &config, &mut sources.format)?;
        let timeouts = Self::resolve_timeouts(overrides, &config, &mut sources.timeout)?;
        let account = Self::resolve_account(overrides, &config, &mut sources.account)?;
        let ledger_path = Self::resolve_ledger_path(cli, &config, &mut sources.ledger_path);
        let no_color = Self::resolve_no_color(cli, &config, &mut sources.no_color);
        let pretty = Self::resolve_pretty(cli, &config, &mut sources.pretty);

        Ok(Self {
            providers,
            format,
            timeouts,
            account,
            ledger_path,
            no_color,
            pretty,
            costs: config.costs.to_schedule()?,
            retry: config.retry.to_policy(),
            excerpt_words: config.preview.excerpt_words,
            file: config,
            sources,
        })
    }

    /// Whether human output should carry ANSI colors on this terminal.
    #[must_use]
    pub fn use_color(&self) -> bool {
        !self.no_color && crate::util::env::should_use_color(false)
    }

    /// Load config file, respecting `COGMETER_CONFIG` override.
    fn load_config() -> Result<Config> {
        match non_empty_env(ENV_CONFIG) {
            Some(path) => Config::load_from(Path::new(&path)),
            None => Config::load(),
        }
    }

    fn resolve_providers(
        overrides: &CommandOverrides,
        config: &Config,
        source: &mut ConfigSource,
    ) -> Result<Vec<Provider>> {
        // 1. CLI flag
        if let Some(arg) = &overrides.provider {
            *source = ConfigSource::Cli;
            return Ok(ProviderSelection::from_arg(arg)?.providers());
        }

        // 2. Environment variable
        if let Some(value) = non_empty_env(ENV_PROVIDERS) {
            *source = ConfigSource::Env;
            return Ok(ProviderSelection::from_arg(&value)?.providers());
        }

        // 3. Config file
        if !config.providers.default_providers.is_empty() {
            *source = ConfigSource::ConfigFile;
            return config
                .providers
                .default_providers
                .iter()
                .map(|s| Provider::from_cli_name(s))
                .collect();
        }

        // 4. Default
        *source = ConfigSource::Default;
        Ok(Provider::ALL.to_vec())
    }

    fn resolve_format(
        cli: &Cli,
        config: &Config,
        source: &mut ConfigSource,
    ) -> Result<OutputFormat> {
        // 1. CLI --json flag (shorthand)
        if cli.json {
            *source = ConfigSource::Cli;
            return Ok(OutputFormat::Json);
        }

        // 2. Environment variable. clap always fills --format, so only a
        //    non-default CLI value can be told apart from the default.
        if let Some(value) = non_empty_env(ENV_FORMAT) {
            *source = ConfigSource::Env;
            return Self::parse_format(&value);
        }

        if cli.format != OutputFormat::Human {
            *source = ConfigSource::Cli;
            return Ok(cli.format);
        }

        // 3. Config file
        if let Some(ref format_str) = config.output.format {
            *source = ConfigSource::ConfigFile;
            return Self::parse_format(format_str);
        }

        // 4. Default
        *source = ConfigSource::Default;
        Ok(OutputFormat::Human)
    }

    fn parse_format(s: &str) -> Result<OutputFormat> {
        match s.trim().to_lowercase().as_str() {
            "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            _ => Err(CogError::Config(format!(
                "Invalid format '{s}'. Valid formats: human, json"
            ))),
        }
    }

    /// A CLI or env timeout applies to every provider. Otherwise each provider
    /// uses its own configured timeout, then the general one, then its default.
    fn resolve_timeouts(
        overrides: &CommandOverrides,
        config: &Config,
        source: &mut ConfigSource,
    ) -> Result<BTreeMap<Provider, Duration>> {
        let global = if let Some(seconds) = overrides.timeout_seconds {
            *source = ConfigSource::Cli;
            Some(seconds)
        } else if let Some(value) = non_empty_env(ENV_TIMEOUT) {
            let seconds = value.parse::<u64>().map_err(|_| {
                CogError::Config(format!("{ENV_TIMEOUT} must be a number of seconds, got '{value}'"))
            })?;
            *source = ConfigSource::Env;
            Some(seconds)
        } else {
            None
        };

        if let Some(seconds) = global {
            validate_timeout("timeout", seconds)?;
            return Ok(Provider::ALL
                .iter()
                .map(|p| (*p, Duration::from_secs(seconds)))
                .collect());
        }

        let file_values = Provider::ALL.iter().any(|p| {
            config.providers.settings(*p).timeout_seconds.is_some()
        }) || config.general.timeout_seconds.is_some();
        *source = if file_values {
            ConfigSource::ConfigFile
        } else {
            ConfigSource::Default
        };

        Ok(Provider::ALL
            .iter()
            .map(|p| {
                let timeout = config
                    .providers
                    .settings(*p)
                    .timeout_seconds
                    .or(config.general.timeout_seconds)
                    .map_or_else(|| p.default_timeout(), Duration::from_secs);
                (*p, timeout)
            })
            .collect())
    }

    fn resolve_account(
        overrides: &CommandOverrides,
        config: &Config,
        source: &mut ConfigSource,
    ) -> Result<String> {
        let (account, from) = if let Some(account) = &overrides.account {
            (account.clone(), ConfigSource::Cli)
        } else if let Some(account) = non_empty_env(ENV_ACCOUNT) {
            (account, ConfigSource::Env)
        } else if let Some(account) = &config.general.default_account {
            (account.clone(), ConfigSource::ConfigFile)
        } else {
            (DEFAULT_ACCOUNT.to_string(), ConfigSource::Default)
        };

        if account.trim().is_empty() {
            return Err(CogError::Config(format!("Account id from {from} is empty")));
        }
        *source = from;
        Ok(account.trim().to_string())
    }

    fn resolve_ledger_path(cli: &Cli, config: &Config, source: &mut ConfigSource) -> PathBuf {
        if let Some(path) = &cli.ledger {
            *source = ConfigSource::Cli;
            return path.clone();
        }
        if let Some(path) = non_empty_env(ENV_LEDGER) {
            *source = ConfigSource::Env;
            return PathBuf::from(path);
        }
        if let Some(path) = &config.general.ledger_path {
            *source = ConfigSource::ConfigFile;
            return path.clone();
        }
        *source = ConfigSource::Default;
        AppPaths::new().ledger_db_file()
    }

    fn resolve_no_color(cli: &Cli, config: &Config, source: &mut ConfigSource) -> bool {
        if cli.no_color {
            *source = ConfigSource::Cli;
            return true;
        }

        if Self::is_env_truthy(ENV_NO_COLOR) || std::env::var_os(ENV_NO_COLOR_STD).is_some() {
            *source = ConfigSource::Env;
            return true;
        }

        if !config.output.color {
            *source = ConfigSource::ConfigFile;
            return true;
        }

        *source = ConfigSource::Default;
        false
    }

    fn resolve_pretty(cli: &Cli, config: &Config, source: &mut ConfigSource) -> bool {
        if cli.pretty {
            *source = ConfigSource::Cli;
            return true;
        }

        if Self::is_env_truthy(ENV_PRETTY) {
            *source = ConfigSource::Env;
            return true;
        }

        if config.output.pretty {
            *source = ConfigSource::ConfigFile;
            return true;
        }

        *source = ConfigSource::Default;
        false
    }

    /// Check if an environment variable is set to a truthy value.
    fn is_env_truthy(var: &str) -> bool {
        std::env::var(var)
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_timeout(field: &str, seconds: u64) -> Result<()> {
    if seconds == 0 || seconds > MAX_TIMEOUT_SECONDS {
        return Err(CogError::Config(format!(
            "{field}: timeout must be between 1 and {MAX_TIMEOUT_SECONDS} seconds, got {seconds}"
        )));
    }
    Ok(())
}

// =============================================================================
// File Configuration
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub providers: ProvidersConfig,
    pub costs: CostsConfig,
    pub preview: PreviewConfig,
    pub retry: RetryConfig,
    pub output: OutputConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Timeout applied to providers without their own `timeout_seconds`.
    pub timeout_seconds: Option<u64>,
    /// Account billed when none is given.
    pub default_account: Option<String>,
    /// Ledger database path.
    pub ledger_path: Option<PathBuf>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Providers to call when none are specified.
    pub default_providers: Vec<String>,
    pub openai: ProviderSettings,
    pub anthropic: ProviderSettings,
    pub deepseek: ProviderSettings,
    pub perplexity: ProviderSettings,
}

impl ProvidersConfig {
    #[must_use]
    pub const fn settings(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::OpenAi => &self.openai,
            Provider::Anthropic => &self.anthropic,
            Provider::DeepSeek => &self.deepseek,
            Provider::Perplexity => &self.perplexity,
        }
    }

    pub const fn settings_mut(&mut self, provider: Provider) -> &mut ProviderSettings {
        match provider {
            Provider::OpenAi => &mut self.openai,
            Provider::Anthropic => &mut self.anthropic,
            Provider::DeepSeek => &mut self.deepseek,
            Provider::Perplexity => &mut self.perplexity,
        }
    }
}

/// Settings for one provider backend.
///
/// A provider without an `endpoint` has no adapter and is skipped as not
/// configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub enabled: bool,
    /// Analysis endpoint URL.
    pub endpoint: Option<String>,
    /// Environment variable holding the bearer token.
    pub api_key_env: Option<String>,
    /// Model requested from the backend.
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
            api_key_env: None,
            model: None,
            timeout_seconds: None,
        }
    }
}

/// Per-kind costs. Missing values fall back to the built-in schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindCosts {
    pub cognitive: Option<u64>,
    pub psychological: Option<u64>,
    pub comprehensive: Option<u64>,
}

impl KindCosts {
    fn entries(&self) -> impl Iterator<Item = (AnalysisKind, u64)> + '_ {
        [
            (AnalysisKind::Cognitive, self.cognitive),
            (AnalysisKind::Psychological, self.psychological),
            (AnalysisKind::Comprehensive, self.comprehensive),
        ]
        .into_iter()
        .filter_map(|(kind, cost)| cost.map(|c| (kind, c)))
    }
}

/// Cost schedule configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CostsConfig {
    #[serde(flatten)]
    pub defaults: KindCosts,
    /// Provider name → per-kind overrides.
    pub overrides: BTreeMap<String, KindCosts>,
}

impl CostsConfig {
    /// Build the cost schedule.
    ///
    /// # Errors
    /// Returns [`CogError::Config`] if an override names an unknown provider.
    pub fn to_schedule(&self) -> Result<CostSchedule> {
        let mut schedule = CostSchedule::default();
        for (kind, cost) in self.defaults.entries() {
            schedule = schedule.with_default(kind, cost);
        }
        for (name, costs) in &self.overrides {
            let provider = Provider::from_cli_name(name).map_err(|_| {
                CogError::Config(format!("Invalid provider \"{name}\" in [costs.overrides]"))
            })?;
            for (kind, cost) in costs.entries() {
                schedule = schedule.with_override(provider, kind, cost);
            }
        }
        Ok(schedule)
    }
}

/// Preview configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub excerpt_words: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            excerpt_words: DEFAULT_EXCERPT_WORDS,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 500,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }
}

/// Output formatting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format (human, json).
    pub format: Option<String>,
    pub color: bool,
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: None,
            color: true,
            pretty: false,
        }
    }
}

impl Config {
    /// Load configuration from the default config file path.
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns error only if the file exists but is invalid.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific path.
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns error only if the file exists but is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!(?path, "Loading config file");
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CogError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CogError::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)?;
        tracing::debug!(?path, "Config file saved");
        Ok(())
    }

    /// Get the config file path.
    #[must_use]
    pub fn config_path() -> PathBuf {
        AppPaths::new().config_file()
    }

    /// Validate configuration values.
    ///
    /// Checks that:
    /// - Provider names are valid
    /// - Output format is valid (human, json)
    /// - Timeouts are within 1..=600 seconds
    /// - Endpoints are absolute URLs
    /// - Retry and preview settings are usable
    pub fn validate(&self) -> Result<()> {
        let valid_providers = Provider::ALL
            .iter()
            .map(|provider| provider.cli_name())
            .collect::<Vec<_>>()
            .join(", ");

        for name in &self.providers.default_providers {
            Provider::from_cli_name(name).map_err(|_| {
                CogError::Config(format!(
                    "Invalid provider \"{name}\" in default_providers. Valid providers: {valid_providers}",
                ))
            })?;
        }

        if let Some(format) = &self.output.format {
            if !["human", "json"].contains(&format.as_str()) {
                return Err(CogError::Config(format!(
                    "Invalid format \"{format}\". Valid formats: human, json"
                )));
            }
        }

        if let Some(seconds) = self.general.timeout_seconds {
            validate_timeout("general.timeout_seconds", seconds)?;
        }

        for provider in Provider::ALL {
            let settings = self.providers.settings(*provider);
            if let Some(seconds) = settings.timeout_seconds {
                validate_timeout(&format!("providers.{provider}.timeout_seconds"), seconds)?;
            }
            if let Some(endpoint) = &settings.endpoint {
                reqwest::Url::parse(endpoint).map_err(|e| {
                    CogError::Config(format!(
                        "providers.{provider}.endpoint \"{endpoint}\" is not a valid URL: {e}"
                    ))
                })?;
            }
        }

        if !(1..=10).contains(&self.retry.max_attempts) {
            return Err(CogError::Config(
                "retry.max_attempts must be between 1 and 10".to_string(),
            ));
        }

        if self.preview.excerpt_words == 0 {
            return Err(CogError::Config(
                "preview.excerpt_words must be greater than 0".to_string(),
            ));
        }

        self.costs.to_schedule().map(|_| ())
    }
}

/// Serializes unit tests that read or write process environment variables.
#[cfg(test)]
pub(crate) static TEST_ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
