//! Provider adapter contract.
//!
//! An adapter wraps one external analysis backend behind a uniform call. It
//! owns error classification (backend-specific failures become a
//! [`FailureKind`]) and must never block past the timeout it is given.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::models::{AnalysisKind, ProviderOutcome};
use super::provider::Provider;

/// Uniform call contract for one analysis provider.
///
/// Implementations make exactly one outbound call per invocation and do not
/// retry; retries belong to the orchestrator.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which provider this adapter talks to.
    fn provider(&self) -> Provider;

    /// Run one analysis.
    ///
    /// Returns `Failure { kind: Timeout }` if the backend has not answered
    /// within `timeout`.
    async fn invoke(
        &self,
        text: &str,
        context: Option<&str>,
        kind: AnalysisKind,
        timeout: Duration,
    ) -> ProviderOutcome;
}

/// Adapters keyed by provider.
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
}

impl AdapterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under the provider it reports.
    pub fn insert(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    /// Builder form of [`AdapterSet::insert`].
    #[must_use]
    pub fn with(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.insert(adapter);
        self
    }

    #[must_use]
    pub fn get(&self, provider: Provider) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider).cloned()
    }

    #[must_use]
    pub fn contains(&self, provider: Provider) -> bool {
        self.adapters.contains_key(&provider)
    }

    /// Configured providers, sorted.
    #[must_use]
    pub fn providers(&self) -> Vec<Provider> {
        let mut providers: Vec<_> = self.adapters.keys().copied().collect();
        providers.sort();
        providers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterSet")
            .field("providers", &self.providers())
            .finish()
    }
}
