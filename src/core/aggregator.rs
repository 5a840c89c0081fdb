//! Result aggregation.
//!
//! Merges per-provider outcomes into one [`AggregateResult`] covering exactly
//! the requested provider set.

use std::collections::BTreeMap;

use chrono::Utc;

use super::models::{AggregateResult, AnalysisRequest, FailureKind, ProviderOutcome, SkipReason};
use super::preview::PreviewGenerator;
use super::provider::Provider;

/// Build the aggregate for `request` from whatever outcomes were collected.
///
/// - Credit-denied skips get preview content from `preview`.
/// - Requested providers with no outcome become `Failure { Unknown }`.
/// - Outcomes for providers that were not requested are dropped.
pub fn aggregate(
    request: &AnalysisRequest,
    mut outcomes: BTreeMap<Provider, ProviderOutcome>,
    preview: &dyn PreviewGenerator,
) -> AggregateResult {
    let mut merged = BTreeMap::new();

    for provider in request.providers() {
        let outcome = match outcomes.remove(provider) {
            Some(ProviderOutcome::Skipped {
                reason: reason @ SkipReason::CreditDenied { .. },
                preview: None,
            }) => ProviderOutcome::Skipped {
                reason,
                preview: Some(preview.generate(request.text(), request.kind())),
            },
            Some(outcome) => outcome,
            None => {
                tracing::warn!(provider = %provider, "Provider produced no outcome");
                ProviderOutcome::failure(FailureKind::Unknown, "no outcome recorded for provider")
            }
        };
        merged.insert(*provider, outcome);
    }

    for provider in outcomes.keys() {
        tracing::debug!(provider = %provider, "Dropping outcome for unrequested provider");
    }

    AggregateResult {
        request_id: request.request_id(),
        kind: request.kind(),
        text: request.text().to_string(),
        outcomes: merged,
        completed_at: Utc::now(),
    }
}
