//! Test utilities for cogmeter.
//!
//! Provides scripted adapters, fault-injecting balance stores, data
//! factories, and ANSI stripping for use across all test modules.
//!
//! # Usage
//!
//! ```rust,ignore
//! use cogmeter::test_utils::*;
//!
//! let adapter = ScriptedAdapter::succeeding(Provider::OpenAi);
//! let ledger = funded_ledger("acct", &[(Provider::OpenAi, 500)]);
//! let dir = TestDir::new();
//! dir.create_file("config.toml", "[general]\ntimeout_seconds = 30");
//! ```

#![allow(clippy::missing_panics_doc)]

use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::core::adapter::ProviderAdapter;
use crate::core::ledger::{BalanceStore, CreditLedger, LedgerKey, MemoryBalanceStore};
use crate::core::models::{
    AnalysisKind, AnalysisPayload, AnalysisRequest, FailureKind, ProfileSection, ProviderOutcome,
};
use crate::core::provider::Provider;
use crate::error::{CogError, Result};

// =============================================================================
// Data Factories
// =============================================================================

/// A live payload for `kind` with one section.
#[must_use]
pub fn make_test_payload(kind: AnalysisKind, summary: &str) -> AnalysisPayload {
    AnalysisPayload {
        kind,
        summary: summary.to_string(),
        sections: vec![ProfileSection {
            title: "Reasoning Style".to_string(),
            body: "Works from first principles and checks each step.".to_string(),
        }],
        is_preview: false,
    }
}

/// A valid request for `providers` billed to `account`.
#[must_use]
pub fn make_test_request(
    kind: AnalysisKind,
    account: &str,
    providers: &[Provider],
) -> AnalysisRequest {
    AnalysisRequest::new(
        "I keep notes on every decision and revisit them a month later to see \
         which assumptions held up and which did not.",
        kind,
        account,
        providers.iter().copied(),
    )
    .expect("valid test request")
}

/// A ledger over an in-memory store with the given balances.
#[must_use]
pub fn funded_ledger(account: &str, balances: &[(Provider, u64)]) -> Arc<CreditLedger> {
    let store = balances
        .iter()
        .fold(MemoryBalanceStore::new(), |store, (provider, amount)| {
            store.with_balance(account, *provider, *amount)
        });
    Arc::new(CreditLedger::new(Arc::new(store)))
}

/// A config file that points every provider at `base_url/<provider>`.
#[must_use]
pub fn make_test_config_toml(base_url: &str, ledger_path: &Path) -> String {
    let mut toml = format!(
        "[general]\ndefault_account = \"test-acct\"\nledger_path = \"{}\"\ntimeout_seconds = 5\n\n\
         [costs]\ncognitive = 100\npsychological = 100\ncomprehensive = 250\n",
        ledger_path.display().to_string().replace('\\', "\\\\")
    );
    for provider in Provider::ALL {
        toml.push_str(&format!(
            "\n[providers.{name}]\nendpoint = \"{base_url}/{name}\"\napi_key_env = \"COGMETER_TEST_KEY\"\n",
            name = provider.cli_name()
        ));
    }
    toml
}

// =============================================================================
// Scripted Adapters
// =============================================================================

/// What a [`ScriptedAdapter`] saw on one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub text: String,
    pub context: Option<String>,
    pub kind: AnalysisKind,
    pub timeout: Duration,
}

/// Adapter that replays scripted outcomes after an optional delay.
///
/// Outcomes are consumed in order; the last one repeats once the script is
/// exhausted.
pub struct ScriptedAdapter {
    provider: Provider,
    script: Mutex<VecDeque<ProviderOutcome>>,
    last: Mutex<ProviderOutcome>,
    delay: Duration,
    calls: AtomicUsize,
    recorded: Mutex<Vec<RecordedCall>>,
}

impl ScriptedAdapter {
    #[must_use]
    pub fn new(provider: Provider, outcome: ProviderOutcome) -> Self {
        Self {
            provider,
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(outcome),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Succeeds with a payload naming the provider.
    #[must_use]
    pub fn succeeding(provider: Provider) -> Self {
        let payload = make_test_payload(
            AnalysisKind::Cognitive,
            &format!("{} profile", provider.display_name()),
        );
        Self::new(provider, ProviderOutcome::success(payload, Duration::from_millis(5)))
    }

    /// Fails with `kind`.
    #[must_use]
    pub fn failing(provider: Provider, kind: FailureKind) -> Self {
        Self::new(provider, ProviderOutcome::failure(kind, format!("scripted {kind}")))
    }

    /// Play `outcomes` in order before falling back to the base outcome.
    #[must_use]
    pub fn with_script(self, outcomes: impl IntoIterator<Item = ProviderOutcome>) -> Self {
        *self.script.lock().expect("script lock") = outcomes.into_iter().collect();
        self
    }

    /// Sleep this long before answering.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of times `invoke` was entered.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Arguments of every call so far.
    #[must_use]
    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.recorded.lock().expect("recorded lock").clone()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
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
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.recorded.lock().expect("recorded lock").push(RecordedCall {
            text: text.to_string(),
            context: context.map(str::to_string),
            kind,
            timeout,
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.script.lock().expect("script lock").pop_front();
        next.unwrap_or_else(|| self.last.lock().expect("last lock").clone())
    }
}

/// Adapter that panics on every call.
pub struct PanickingAdapter {
    provider: Provider,
}

impl PanickingAdapter {
    #[must_use]
    pub const fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ProviderAdapter for PanickingAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn invoke(
        &self,
        _text: &str,
        _context: Option<&str>,
        _kind: AnalysisKind,
        _timeout: Duration,
    ) -> ProviderOutcome {
        panic!("scripted adapter panic for {}", self.provider);
    }
}

// =============================================================================
// Fault-Injecting Balance Store
// =============================================================================

/// Which store operations a [`FailingBalanceStore`] rejects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreFaults {
    pub reads: bool,
    pub debits: bool,
    pub credits: bool,
    /// Fail debits for this provider only.
    pub debits_for: Option<Provider>,
}

/// In-memory store that fails the selected operations with a ledger error.
pub struct FailingBalanceStore {
    inner: MemoryBalanceStore,
    faults: StoreFaults,
    debit_attempts: AtomicUsize,
}

impl FailingBalanceStore {
    #[must_use]
    pub fn new(inner: MemoryBalanceStore, faults: StoreFaults) -> Self {
        Self {
            inner,
            faults,
            debit_attempts: AtomicUsize::new(0),
        }
    }

    /// Every read fails, so no reservation can be made.
    #[must_use]
    pub fn unreachable() -> Self {
        Self::new(
            MemoryBalanceStore::new(),
            StoreFaults {
                reads: true,
                debits: true,
                credits: true,
                debits_for: None,
            },
        )
    }

    #[must_use]
    pub fn debit_attempts(&self) -> usize {
        self.debit_attempts.load(Ordering::SeqCst)
    }
}

impl BalanceStore for FailingBalanceStore {
    fn balance(&self, key: &LedgerKey) -> Result<u64> {
        if self.faults.reads {
            return Err(CogError::ledger("read balance", "injected fault"));
        }
        self.inner.balance(key)
    }

    fn debit(&self, key: &LedgerKey, amount: u64, memo: &str) -> Result<u64> {
        self.debit_attempts.fetch_add(1, Ordering::SeqCst);
        if self.faults.debits || self.faults.debits_for == Some(key.provider) {
            return Err(CogError::ledger("debit balance", "injected fault"));
        }
        self.inner.debit(key, amount, memo)
    }

    fn credit(&self, key: &LedgerKey, amount: u64, memo: &str) -> Result<u64> {
        if self.faults.credits {
            return Err(CogError::ledger("credit balance", "injected fault"));
        }
        self.inner.credit(key, amount, memo)
    }

    fn balances(&self, account: &str) -> Result<Vec<(Provider, u64)>> {
        if self.faults.reads {
            return Err(CogError::ledger("read balances", "injected fault"));
        }
        self.inner.balances(account)
    }
}

// =============================================================================
// Temp Directory Utilities
// =============================================================================

/// A temporary directory for tests with automatic cleanup.
///
/// # Examples
///
/// ```rust,ignore
/// use cogmeter::test_utils::TestDir;
///
/// let dir = TestDir::new();
/// dir.create_file("config.toml", "[general]\ntimeout_seconds = 30");
/// assert!(dir.file_path("config.toml").exists());
/// ```
pub struct TestDir {
    inner: tempfile::TempDir,
}

impl TestDir {
    /// Create a new isolated temporary directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: tempfile::tempdir().expect("Failed to create temp directory"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Create a file with the given content, creating parent directories.
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.inner.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        let mut file = fs::File::create(&path).expect("Failed to create test file");
        file.write_all(content.as_bytes())
            .expect("Failed to write test file");
    }

    #[must_use]
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.inner.path().join(name)
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Test Helpers
// =============================================================================

/// Strip ANSI escape codes from a string.
#[must_use]
pub fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if chars.peek() == Some(&'[') {
                chars.next();
                while let Some(&next) = chars.peek() {
                    chars.next();
                    if next.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
        } else {
            result.push(c);
        }
    }

    result
}
