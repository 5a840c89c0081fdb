//! Fix suggestions for cogmeter errors.
//!
//! Maps error variants to copy-paste ready commands and short explanations.

use crate::core::models::AnalysisKind;
use crate::core::provider::Provider;

/// A fix suggestion for an error.
#[derive(Debug, Clone)]
pub struct FixSuggestion {
    /// Fix commands in order of preference.
    pub commands: Vec<String>,

    /// Explanation of why this error occurred.
    pub context: String,

    /// Tips to prevent this error in the future.
    pub prevention: Option<String>,
}

impl FixSuggestion {
    /// Creates a new fix suggestion with required fields.
    #[must_use]
    pub fn new(commands: Vec<String>, context: impl Into<String>) -> Self {
        Self {
            commands,
            context: context.into(),
            prevention: None,
        }
    }

    /// Builder: adds prevention tips.
    #[must_use]
    pub fn with_prevention(mut self, prevention: impl Into<String>) -> Self {
        self.prevention = Some(prevention.into());
        self
    }
}

pub(crate) fn config_suggestions(message: &str) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec!["cogmeter costs".to_string()],
            format!("The configuration could not be used: {message}"),
        )
        .with_prevention("Set COGMETER_CONFIG to point at a known-good config file."),
    ]
}

pub(crate) fn invalid_provider_suggestions(name: &str) -> Vec<FixSuggestion> {
    let valid = Provider::ALL
        .iter()
        .map(|p| p.cli_name())
        .collect::<Vec<_>>()
        .join(", ");
    vec![FixSuggestion::new(
        vec!["cogmeter analyze --provider all --text \"...\"".to_string()],
        format!("Unknown provider '{name}'. Valid providers: {valid}"),
    )]
}

pub(crate) fn invalid_kind_suggestions(name: &str) -> Vec<FixSuggestion> {
    let valid = AnalysisKind::ALL
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    vec![FixSuggestion::new(
        vec!["cogmeter analyze --kind cognitive --text \"...\"".to_string()],
        format!("Unknown analysis kind '{name}'. Valid kinds: {valid}"),
    )]
}

pub(crate) fn invalid_request_suggestions(message: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec!["cogmeter analyze --file sample.txt --account <id>".to_string()],
        format!("The request was rejected before any provider was called: {message}"),
    )]
}

pub(crate) fn ledger_unavailable_suggestions(message: &str) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec!["cogmeter credits balance --account <id>".to_string()],
            format!(
                "Credit metering could not be performed ({message}). No provider was charged."
            ),
        )
        .with_prevention("Check that the ledger database path is writable (COGMETER_LEDGER)."),
    ]
}

pub(crate) fn insufficient_balance_suggestions(account: &str, provider: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec![format!(
            "cogmeter credits grant --account {account} --provider {provider} --amount <units>"
        )],
        "The balance no longer covers this debit.",
    )]
}

pub(crate) fn all_failed_suggestions() -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec!["cogmeter analyze --verbose --text \"...\"".to_string()],
            "Every provider failed. Each provider's failure kind is listed in the result.",
        )
        .with_prevention("Check provider endpoints and API key environment variables in config.toml."),
    ]
}
