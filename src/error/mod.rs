//! Error types for cogmeter.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! Errors are categorized into five categories:
//! - **Configuration**: Config file parsing, validation, unknown names
//! - **Request**: Analysis requests that fail validation before any work starts
//! - **Ledger**: Credit storage failures (always fatal to a request)
//! - **Provider**: Whole-run provider outcomes surfaced to the caller
//! - **Internal**: Unexpected errors, I/O, serialization
//!
//! Individual provider failures are *not* errors: they travel as data inside
//! [`crate::core::models::ProviderOutcome`]. Only failures that make the
//! whole request meaningless are represented here.
//!
//! Each error has a stable error code (e.g., `COG-L001`) for programmatic handling.

pub mod suggestions;

use thiserror::Error;

pub use suggestions::FixSuggestion;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration issues (parse errors, invalid values, unknown names).
    Configuration,
    /// Invalid analysis requests.
    Request,
    /// Credit ledger storage issues.
    Ledger,
    /// Provider outcomes that fail the whole run.
    Provider,
    /// Internal errors (bugs, unexpected state, unclassified).
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Configuration => "Configuration error",
            Self::Request => "Request error",
            Self::Ledger => "Ledger error",
            Self::Provider => "Provider error",
            Self::Internal => "Internal error",
        }
    }

    /// Returns a short code prefix for this category.
    #[must_use]
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            Self::Configuration => "C",
            Self::Request => "R",
            Self::Ledger => "L",
            Self::Provider => "P",
            Self::Internal => "X",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success (including partial success)
    Success = 0,
    /// Unexpected failure
    GeneralError = 1,
    /// Invalid configuration
    ConfigError = 2,
    /// Invalid request
    RequestError = 3,
    /// Credit ledger unavailable or inconsistent
    LedgerError = 4,
    /// Every requested provider failed
    AllProvidersFailed = 5,
    /// Run cancelled by the caller
    Cancelled = 130,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

/// Main error type for cogmeter operations.
#[derive(Error, Debug)]
pub enum CogError {
    // ==========================================================================
    // Configuration errors (Category: Configuration)
    // ==========================================================================
    /// Generic configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Error parsing configuration file.
    #[error("config parse error at {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// Unknown provider name.
    #[error("invalid provider: {0}")]
    InvalidProvider(String),

    /// Unknown analysis kind.
    #[error("invalid analysis kind: {0}")]
    InvalidKind(String),

    // ==========================================================================
    // Request errors (Category: Request)
    // ==========================================================================
    /// The analysis request failed validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // ==========================================================================
    // Ledger errors (Category: Ledger)
    // ==========================================================================
    /// Credit storage failed or is unreachable.
    #[error("credit ledger unavailable: {0}")]
    Ledger(String),

    /// A debit was attempted against a balance that cannot cover it.
    #[error("insufficient balance for {account}/{provider}: requested {requested}, available {available}")]
    InsufficientBalance {
        account: String,
        provider: String,
        requested: u64,
        available: u64,
    },

    // ==========================================================================
    // Provider errors (Category: Provider)
    // ==========================================================================
    /// No provider produced a live or preview result.
    #[error("all {failed} provider(s) failed")]
    AllProvidersFailed { failed: usize },

    /// HTTP client setup failed.
    #[error("network error: {0}")]
    Network(String),

    // ==========================================================================
    // Run control (Category: Internal)
    // ==========================================================================
    /// The orchestration was cancelled before every provider settled.
    #[error("analysis cancelled")]
    Cancelled,

    // ==========================================================================
    // I/O errors (Category: Internal)
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CogError {
    /// Wrap a storage-layer failure with context.
    pub fn ledger(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Ledger(format!("{context}: {err}"))
    }

    /// Map error to process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_)
            | Self::ConfigParse { .. }
            | Self::InvalidProvider(_)
            | Self::InvalidKind(_) => ExitCode::ConfigError,

            Self::InvalidRequest(_) => ExitCode::RequestError,

            Self::Ledger(_) | Self::InsufficientBalance { .. } => ExitCode::LedgerError,

            Self::AllProvidersFailed { .. } => ExitCode::AllProvidersFailed,

            Self::Cancelled => ExitCode::Cancelled,

            Self::Network(_) | Self::Io(_) | Self::Json(_) | Self::Other(_) => {
                ExitCode::GeneralError
            }
        }
    }

    /// Returns the error category for classification and routing.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_)
            | Self::ConfigParse { .. }
            | Self::InvalidProvider(_)
            | Self::InvalidKind(_) => ErrorCategory::Configuration,

            Self::InvalidRequest(_) => ErrorCategory::Request,

            Self::Ledger(_) | Self::InsufficientBalance { .. } => ErrorCategory::Ledger,

            Self::AllProvidersFailed { .. } | Self::Network(_) => ErrorCategory::Provider,

            Self::Cancelled | Self::Io(_) | Self::Json(_) | Self::Other(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Returns a stable error code for programmatic handling.
    ///
    /// Format: `COG-{category}{number}`.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            // Configuration errors (C001-C099)
            Self::Config(_) => "COG-C001",
            Self::ConfigParse { .. } => "COG-C002",
            Self::InvalidProvider(_) => "COG-C010",
            Self::InvalidKind(_) => "COG-C011",

            // Request errors (R001-R099)
            Self::InvalidRequest(_) => "COG-R001",

            // Ledger errors (L001-L099)
            Self::Ledger(_) => "COG-L001",
            Self::InsufficientBalance { .. } => "COG-L002",

            // Provider errors (P001-P099)
            Self::AllProvidersFailed { .. } => "COG-P001",
            Self::Network(_) => "COG-P002",

            // Internal errors (X001-X099)
            Self::Cancelled => "COG-X010",
            Self::Io(_) => "COG-X001",
            Self::Json(_) => "COG-X002",
            Self::Other(_) => "COG-X099",
        }
    }

    /// Returns actionable fix suggestions for this error.
    #[must_use]
    pub fn fix_suggestions(&self) -> Vec<FixSuggestion> {
        match self {
            Self::Config(msg) | Self::ConfigParse { message: msg, .. } => {
                suggestions::config_suggestions(msg)
            }
            Self::InvalidProvider(name) => suggestions::invalid_provider_suggestions(name),
            Self::InvalidKind(name) => suggestions::invalid_kind_suggestions(name),
            Self::InvalidRequest(msg) => suggestions::invalid_request_suggestions(msg),
            Self::Ledger(msg) => suggestions::ledger_unavailable_suggestions(msg),
            Self::InsufficientBalance {
                account, provider, ..
            } => suggestions::insufficient_balance_suggestions(account, provider),
            Self::AllProvidersFailed { .. } => suggestions::all_failed_suggestions(),
            Self::Network(_)
            | Self::Cancelled
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => Vec::new(),
        }
    }
}

/// Result type alias for cogmeter operations.
pub type Result<T> = std::result::Result<T, CogError>;
