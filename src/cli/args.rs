//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Multi-provider text analysis with credit metering.
#[derive(Parser, Debug)]
#[command(name = "cogmeter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    // === Global flags ===
    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Credit ledger database path
    #[arg(long, value_name = "PATH", global = true)]
    pub ledger: Option<PathBuf>,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSONL logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the effective output format.
    #[must_use]
    pub fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one analysis across providers
    Analyze(AnalyzeArgs),

    /// Inspect and top up credit balances
    #[command(subcommand)]
    Credits(CreditsCommand),

    /// Show the credit cost schedule
    Costs(CostsArgs),
}

/// Arguments for the `analyze` command.
#[derive(Parser, Debug, Default)]
pub struct AnalyzeArgs {
    /// Text to analyze (reads --file or stdin when omitted)
    #[arg(long, value_name = "TEXT", conflicts_with = "file")]
    pub text: Option<String>,

    /// Read the text from a file
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Additional context passed to providers
    #[arg(long, value_name = "TEXT")]
    pub context: Option<String>,

    /// Analysis kind (cognitive, psychological, comprehensive)
    #[arg(long, value_name = "KIND", default_value = "cognitive")]
    pub kind: String,

    /// Providers to call (name, comma-separated list, or "all")
    #[arg(long, value_name = "PROVIDER")]
    pub provider: Option<String>,

    /// Account to bill
    #[arg(long, value_name = "ID")]
    pub account: Option<String>,

    /// Per-provider timeout in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Do not draw live progress on stderr
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

impl AnalyzeArgs {
    /// Validate argument combinations.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::CogError;

        if self.timeout == Some(0) {
            return Err(CogError::Config(
                "Timeout must be greater than 0 seconds".to_string(),
            ));
        }

        Ok(())
    }
}

/// Credit subcommands.
#[derive(Subcommand, Debug)]
pub enum CreditsCommand {
    /// Show balances for an account
    Balance {
        /// Account to inspect
        #[arg(long, value_name = "ID")]
        account: Option<String>,

        /// Only show these providers
        #[arg(long, value_name = "PROVIDER")]
        provider: Option<String>,
    },

    /// Add credit to one provider balance
    Grant {
        /// Account to credit
        #[arg(long, value_name = "ID")]
        account: Option<String>,

        /// Provider balance to credit
        #[arg(long, value_name = "PROVIDER")]
        provider: String,

        /// Credit units to add
        #[arg(long, value_name = "UNITS")]
        amount: u64,

        /// Journal memo
        #[arg(long, default_value = "manual grant")]
        memo: String,
    },

    /// Show recent balance changes
    Journal {
        /// Account to inspect
        #[arg(long, value_name = "ID")]
        account: Option<String>,

        /// Maximum entries to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

/// Arguments for the `costs` command.
#[derive(Parser, Debug, Default)]
pub struct CostsArgs {
    /// Providers to show (name, comma-separated list, or "all")
    #[arg(long, value_name = "PROVIDER")]
    pub provider: Option<String>,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
}
