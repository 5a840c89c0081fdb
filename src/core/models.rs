//! Core data models for analysis orchestration.
//!
//! Requests and results are plain values: a request is validated once at
//! construction and never mutated, and a result maps every requested provider
//! to exactly one [`ProviderOutcome`].

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::provider::Provider;
use crate::error::{CogError, Result};

/// Upper bound on input text length, in characters.
pub const MAX_TEXT_CHARS: usize = 200_000;

// =============================================================================
// Analysis Kind
// =============================================================================

/// The closed set of profile types a provider can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    /// Intelligence and reasoning-style profile.
    Cognitive,
    /// Personality and emotional-pattern profile.
    Psychological,
    /// Combined long-form report.
    Comprehensive,
}

impl AnalysisKind {
    /// All kinds in display order.
    pub const ALL: &'static [Self] = &[Self::Cognitive, Self::Psychological, Self::Comprehensive];

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cognitive => "cognitive",
            Self::Psychological => "psychological",
            Self::Comprehensive => "comprehensive",
        }
    }

    /// Display name for human output.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Cognitive => "Cognitive Profile",
            Self::Psychological => "Psychological Profile",
            Self::Comprehensive => "Comprehensive Report",
        }
    }

    /// Section titles a full report of this kind contains.
    #[must_use]
    pub const fn report_sections(self) -> &'static [&'static str] {
        match self {
            Self::Cognitive => &[
                "Intelligence Assessment",
                "Reasoning Style",
                "Conceptual Depth",
                "Originality",
            ],
            Self::Psychological => &[
                "Emotional Profile",
                "Motivational Structure",
                "Interpersonal Style",
                "Stress Response",
            ],
            Self::Comprehensive => &[
                "Cognitive Summary",
                "Psychological Summary",
                "Strengths",
                "Blind Spots",
                "Recommendations",
            ],
        }
    }

    /// Parse from CLI argument.
    pub fn from_arg(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .find(|k| k.as_str() == lower)
            .copied()
            .ok_or_else(|| CogError::InvalidKind(s.to_string()))
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Analysis Request
// =============================================================================

/// One analysis request: a text, what to produce from it, who pays, and which
/// providers to ask.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    request_id: Uuid,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    kind: AnalysisKind,
    account: String,
    providers: BTreeSet<Provider>,
}

impl AnalysisRequest {
    /// Build and validate a request.
    ///
    /// # Errors
    /// Returns [`CogError::InvalidRequest`] if the text is blank or longer than
    /// [`MAX_TEXT_CHARS`], the account is blank, or no provider is requested.
    pub fn new(
        text: impl Into<String>,
        kind: AnalysisKind,
        account: impl Into<String>,
        providers: impl IntoIterator<Item = Provider>,
    ) -> Result<Self> {
        let text = text.into();
        let account = account.into();
        let providers: BTreeSet<Provider> = providers.into_iter().collect();

        if text.trim().is_empty() {
            return Err(CogError::InvalidRequest("input text is empty".to_string()));
        }
        let chars = text.chars().count();
        if chars > MAX_TEXT_CHARS {
            return Err(CogError::InvalidRequest(format!(
                "input text is {chars} characters; the limit is {MAX_TEXT_CHARS}"
            )));
        }
        if account.trim().is_empty() {
            return Err(CogError::InvalidRequest("account id is empty".to_string()));
        }
        if providers.is_empty() {
            return Err(CogError::InvalidRequest(
                "at least one provider must be requested".to_string(),
            ));
        }

        Ok(Self {
            request_id: Uuid::new_v4(),
            text,
            context: None,
            kind,
            account,
            providers,
        })
    }

    /// Attach free-text additional context. Blank context is ignored.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.context = if context.trim().is_empty() {
            None
        } else {
            Some(context)
        };
        self
    }

    #[must_use]
    pub const fn request_id(&self) -> Uuid {
        self.request_id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    #[must_use]
    pub const fn kind(&self) -> AnalysisKind {
        self.kind
    }

    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Requested providers, in a stable order.
    #[must_use]
    pub const fn providers(&self) -> &BTreeSet<Provider> {
        &self.providers
    }
}

// =============================================================================
// Analysis Payload
// =============================================================================

/// One titled section of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSection {
    pub title: String,
    pub body: String,
}

/// Analysis content returned by a provider (or synthesized as a preview).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPayload {
    pub kind: AnalysisKind,
    pub summary: String,
    #[serde(default)]
    pub sections: Vec<ProfileSection>,
    #[serde(default)]
    pub is_preview: bool,
}

// =============================================================================
// Provider Outcome
// =============================================================================

/// Closed classification of provider and metering failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The call did not finish within its timeout.
    Timeout,
    /// The provider refused because of quota or billing limits.
    QuotaExceeded,
    /// The provider answered with something that is not a usable payload.
    Malformed,
    /// Network or connection failure, or the provider is down.
    Unavailable,
    /// Ledger-level denial. Never produced by an adapter.
    CreditDenied,
    /// Anything else.
    Unknown,
}

impl FailureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::QuotaExceeded => "quota_exceeded",
            Self::Malformed => "malformed",
            Self::Unavailable => "unavailable",
            Self::CreditDenied => "credit_denied",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a provider was not called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum SkipReason {
    /// The account's balance for this provider could not cover the cost.
    CreditDenied { required: u64, available: u64 },
    /// The provider was requested but has no adapter configured.
    NotConfigured,
}

/// Final outcome for one provider in one orchestration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderOutcome {
    Success {
        payload: AnalysisPayload,
        #[serde(rename = "elapsedMs")]
        elapsed_ms: u64,
    },
    Failure {
        kind: FailureKind,
        message: String,
    },
    Skipped {
        reason: SkipReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        preview: Option<AnalysisPayload>,
    },
}

impl ProviderOutcome {
    /// Create a successful outcome.
    #[must_use]
    pub fn success(payload: AnalysisPayload, elapsed: Duration) -> Self {
        Self::Success {
            payload,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Create a failed outcome.
    #[must_use]
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    /// Create a skipped outcome without preview content.
    #[must_use]
    pub const fn skipped(reason: SkipReason) -> Self {
        Self::Skipped {
            reason,
            preview: None,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// Whether this outcome carries preview content.
    #[must_use]
    pub const fn has_preview(&self) -> bool {
        matches!(self, Self::Skipped { preview: Some(_), .. })
    }

    /// Failure kind, if this is a failure.
    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failure { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Payload to show the user: live content or preview.
    #[must_use]
    pub const fn payload(&self) -> Option<&AnalysisPayload> {
        match self {
            Self::Success { payload, .. } => Some(payload),
            Self::Skipped { preview, .. } => preview.as_ref(),
            Self::Failure { .. } => None,
        }
    }
}

// =============================================================================
// Aggregate Result
// =============================================================================

/// Result of one orchestration: exactly one outcome per requested provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub request_id: Uuid,
    pub kind: AnalysisKind,
    pub text: String,
    pub outcomes: BTreeMap<Provider, ProviderOutcome>,
    pub completed_at: DateTime<Utc>,
}

impl AggregateResult {
    /// Outcome for one provider.
    #[must_use]
    pub fn get(&self, provider: Provider) -> Option<&ProviderOutcome> {
        self.outcomes.get(&provider)
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_failure()).count()
    }

    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_skipped()).count()
    }

    /// True when no provider produced live or preview content.
    #[must_use]
    pub fn is_all_failed(&self) -> bool {
        !self
            .outcomes
            .values()
            .any(|o| o.is_success() || o.has_preview())
    }

    /// True when some, but not all, providers produced live content.
    #[must_use]
    pub fn is_partial_success(&self) -> bool {
        !self.is_all_failed() && self.success_count() < self.outcomes.len()
    }
}

// =============================================================================
// Robot Output Envelope
// =============================================================================

/// Stable JSON envelope for machine consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotOutput<T> {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub command: String,
    pub data: T,

    #[serde(default)]
    pub errors: Vec<String>,
}

impl<T> RobotOutput<T> {
    /// Create a new robot output envelope.
    pub fn new(command: impl Into<String>, data: T) -> Self {
        Self {
            schema_version: "cogmeter.v1".to_string(),
            generated_at: Utc::now(),
            command: command.into(),
            data,
            errors: Vec::new(),
        }
    }

    /// Attach error messages.
    #[must_use]
    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }
}
