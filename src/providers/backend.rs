//! HTTP analysis backend.
//!
//! Every provider is reached the same way: a JSON POST to its configured
//! endpoint. The response must carry a non-blank `summary`; `sections` is
//! optional.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::core::adapter::ProviderAdapter;
use crate::core::models::{AnalysisKind, AnalysisPayload, FailureKind, ProfileSection, ProviderOutcome};
use crate::core::provider::Provider;

/// Longest response body excerpt carried into a failure message.
const BODY_EXCERPT_CHARS: usize = 200;

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct AnalyzeBody<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
    kind: AnalysisKind,
    provider: Provider,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    sections: Vec<ProfileSection>,
}

// =============================================================================
// Adapter
// =============================================================================

/// Adapter that talks to one provider's HTTP analysis endpoint.
#[derive(Debug, Clone)]
pub struct HttpProviderAdapter {
    provider: Provider,
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpProviderAdapter {
    #[must_use]
    pub fn new(provider: Provider, client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            provider,
            client,
            endpoint: endpoint.into(),
            model: provider.default_model().to_string(),
            api_key: None,
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn call(
        &self,
        text: &str,
        context: Option<&str>,
        kind: AnalysisKind,
        timeout: Duration,
    ) -> ProviderOutcome {
        let started = Instant::now();
        let body = AnalyzeBody {
            text,
            context,
            kind,
            provider: self.provider,
            model: &self.model,
        };

        let mut request = self.client.post(&self.endpoint).timeout(timeout).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return classify_transport_error(&e, timeout),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return classify_status(status, &body);
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return classify_transport_error(&e, timeout),
        };

        match parse_payload(&bytes, kind) {
            Ok(payload) => ProviderOutcome::success(payload, started.elapsed()),
            Err(message) => ProviderOutcome::failure(FailureKind::Malformed, message),
        }
    }
}

#[async_trait]
impl ProviderAdapter for HttpProviderAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn invoke(
        &self,
        text: &str,
        context: Option<&str>,
        kind: AnalysisKind,
        timeout: Duration,
    ) -> ProviderOutcome {
        tracing::debug!(
            provider = %self.provider,
            endpoint = %self.endpoint,
            model = %self.model,
            kind = %kind,
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "Invoking analysis backend"
        );

        // reqwest's per-request timeout covers the body too, but the outer
        // bound is what the adapter contract promises.
        match tokio::time::timeout(timeout, self.call(text, context, kind, timeout)).await {
            Ok(outcome) => outcome,
            Err(_) => timeout_outcome(timeout),
        }
    }
}

// =============================================================================
// Classification
// =============================================================================

fn timeout_outcome(timeout: Duration) -> ProviderOutcome {
    ProviderOutcome::failure(
        FailureKind::Timeout,
        format!("no response within {}s", timeout.as_secs_f64()),
    )
}

fn classify_transport_error(err: &reqwest::Error, timeout: Duration) -> ProviderOutcome {
    if err.is_timeout() {
        return timeout_outcome(timeout);
    }
    if err.is_decode() {
        return ProviderOutcome::failure(FailureKind::Malformed, err.to_string());
    }
    ProviderOutcome::failure(FailureKind::Unavailable, err.to_string())
}

/// Map a non-2xx status to an outcome.
fn classify_status(status: StatusCode, body: &str) -> ProviderOutcome {
    let kind = match status {
        StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => FailureKind::Timeout,
        StatusCode::PAYMENT_REQUIRED | StatusCode::TOO_MANY_REQUESTS => FailureKind::QuotaExceeded,
        s if s.is_server_error() => FailureKind::Unavailable,
        _ => FailureKind::Unknown,
    };

    let excerpt: String = body.trim().chars().take(BODY_EXCERPT_CHARS).collect();
    let message = if excerpt.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {excerpt}")
    };
    ProviderOutcome::failure(kind, message)
}

fn parse_payload(bytes: &[u8], kind: AnalysisKind) -> Result<AnalysisPayload, String> {
    let response: AnalyzeResponse =
        serde_json::from_slice(bytes).map_err(|e| format!("response is not valid JSON: {e}"))?;

    let summary = response
        .summary
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "response has no summary".to_string())?;

    Ok(AnalysisPayload {
        kind,
        summary,
        sections: response.sections,
        is_preview: false,
    })
}
