//! Analysis orchestration.
//!
//! One orchestration fans a request out to every requested provider, runs the
//! calls concurrently under per-provider timeouts, meters each against the
//! credit ledger, and joins everything into one [`AggregateResult`].
//!
//! ## Flow
//!
//! 1. Reserve credit per provider. Denied providers are skipped (and later get
//!    a preview); providers without an adapter are skipped as not configured.
//!    A ledger storage error aborts the run before any adapter is called.
//! 2. Spawn one task per granted provider on a [`JoinSet`]. Each task marks
//!    `loading` and calls the adapter. A failed call marks `errored` and
//!    releases its reservation; a successful one hands the reservation back
//!    still held.
//! 3. Join. Panics inside an adapter become `Failure { Unknown }`. If the run
//!    is cancelled here, every held reservation is released, including those
//!    of calls that already succeeded.
//! 4. Commit each successful call, then mark it `completed`. A commit that
//!    fails turns that provider's outcome into a failure; its result is not
//!    returned and nothing is debited for it.
//! 5. Aggregate.
//!
//! Store-backed ledger calls run on the blocking pool. Dropping the future
//! returned by [`Orchestrator::run`] aborts all tasks; each aborted task drops
//! its [`Reservation`], which releases the hold.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::adapter::{AdapterSet, ProviderAdapter};
use super::aggregator::aggregate;
use super::costs::CostSchedule;
use super::ledger::{CreditLedger, Reservation, ReserveDecision};
use super::models::{
    AggregateResult, AnalysisKind, AnalysisRequest, FailureKind, ProviderOutcome, SkipReason,
};
use super::preview::{ExcerptPreview, PreviewGenerator};
use super::progress::ProgressTracker;
use super::provider::Provider;
use crate::error::{CogError, Result};

// =============================================================================
// Retry policy
// =============================================================================

/// Orchestrator-level retries.
///
/// Only `Unavailable` failures are retried, and every attempt shares the
/// provider's single timeout budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// Default backoff between attempts.
    pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

    /// Single attempt.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Self::DEFAULT_BACKOFF,
        }
    }

    /// `max_attempts` is clamped to at least one.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub const fn backoff(&self) -> Duration {
        self.backoff
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Concurrent fan-out over provider adapters with credit metering.
pub struct Orchestrator {
    adapters: AdapterSet,
    ledger: Arc<CreditLedger>,
    costs: CostSchedule,
    preview: Arc<dyn PreviewGenerator>,
    timeouts: HashMap<Provider, Duration>,
    retry: RetryPolicy,
}

/// What one provider task hands back to the join loop. A successful call
/// carries its reservation, still held.
struct TaskReport {
    provider: Provider,
    outcome: ProviderOutcome,
    reservation: Option<Reservation>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(adapters: AdapterSet, ledger: Arc<CreditLedger>) -> Self {
        Self {
            adapters,
            ledger,
            costs: CostSchedule::default(),
            preview: Arc::new(ExcerptPreview::default()),
            timeouts: HashMap::new(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_costs(mut self, costs: CostSchedule) -> Self {
        self.costs = costs;
        self
    }

    #[must_use]
    pub fn with_preview(mut self, preview: Arc<dyn PreviewGenerator>) -> Self {
        self.preview = preview;
        self
    }

    /// Override one provider's timeout.
    #[must_use]
    pub fn with_timeout(mut self, provider: Provider, timeout: Duration) -> Self {
        self.timeouts.insert(provider, timeout);
        self
    }

    /// Override every provider's timeout.
    #[must_use]
    pub fn with_global_timeout(mut self, timeout: Duration) -> Self {
        for provider in Provider::ALL {
            self.timeouts.insert(*provider, timeout);
        }
        self
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<CreditLedger> {
        &self.ledger
    }

    #[must_use]
    pub const fn costs(&self) -> &CostSchedule {
        &self.costs
    }

    /// Effective timeout for a provider.
    #[must_use]
    pub fn timeout_for(&self, provider: Provider) -> Duration {
        self.timeouts
            .get(&provider)
            .copied()
            .unwrap_or_else(|| provider.default_timeout())
    }

    /// Run one orchestration with a private tracker and no external cancel.
    ///
    /// # Errors
    /// See [`Orchestrator::run_with`].
    pub async fn run(&self, request: &AnalysisRequest) -> Result<AggregateResult> {
        self.run_with(
            request,
            Arc::new(ProgressTracker::new()),
            CancellationToken::new(),
        )
        .await
    }

    /// Run one orchestration, reporting to `tracker` and stopping early when
    /// `cancel` fires.
    ///
    /// The tracker is (re)started with the request's providers and closed when
    /// the run ends, so subscriber streams terminate.
    ///
    /// # Errors
    /// - [`CogError::Ledger`] if credit could not be reserved.
    /// - [`CogError::Cancelled`] if `cancel` fired before every provider
    ///   settled. Nothing is debited for a cancelled run.
    pub async fn run_with(
        &self,
        request: &AnalysisRequest,
        tracker: Arc<ProgressTracker>,
        cancel: CancellationToken,
    ) -> Result<AggregateResult> {
        let request_id = request.request_id();
        let started = Instant::now();
        tracker.start(request.providers().iter().copied());

        tracing::info!(
            request_id = %request_id,
            kind = %request.kind(),
            providers = request.providers().len(),
            "Starting orchestration"
        );

        let result = self.execute(request, &tracker, &cancel).await;
        finish_unsettled(&tracker);
        tracker.close();

        match &result {
            Ok(aggregate) => tracing::info!(
                request_id = %request_id,
                succeeded = aggregate.success_count(),
                failed = aggregate.failure_count(),
                skipped = aggregate.skipped_count(),
                duration_ms = elapsed_ms(started),
                "Orchestration finished"
            ),
            Err(err) => tracing::warn!(
                request_id = %request_id,
                error = %err,
                duration_ms = elapsed_ms(started),
                "Orchestration aborted"
            ),
        }
        result
    }

    async fn execute(
        &self,
        request: &AnalysisRequest,
        tracker: &Arc<ProgressTracker>,
        cancel: &CancellationToken,
    ) -> Result<AggregateResult> {
        let mut outcomes = BTreeMap::new();
        let granted = self.reserve_all(request, tracker, &mut outcomes).await?;

        let text: Arc<str> = Arc::from(request.text());
        let context: Option<Arc<str>> = request.context().map(Arc::from);
        let mut tasks = JoinSet::new();

        for (provider, adapter, reservation) in granted {
            let call = ProviderCall {
                provider,
                adapter,
                kind: request.kind(),
                text: Arc::clone(&text),
                context: context.clone(),
                timeout: self.timeout_for(provider),
                retry: self.retry,
            };
            tasks.spawn(run_provider(
                call,
                reservation,
                Arc::clone(&self.ledger),
                Arc::clone(tracker),
            ));
        }

        let mut reports = Vec::with_capacity(tasks.len());
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tasks.abort_all();
                    while let Some(joined) = tasks.join_next().await {
                        if let Ok(report) = joined {
                            tracing::debug!(
                                provider = %report.provider,
                                "Provider settled during cancellation"
                            );
                            reports.push(report);
                        }
                    }
                    let mut released = 0usize;
                    for reservation in reports.into_iter().filter_map(|report| report.reservation) {
                        self.ledger.release(reservation);
                        released += 1;
                    }
                    tracing::info!(
                        request_id = %request.request_id(),
                        released,
                        "Orchestration cancelled"
                    );
                    return Err(CogError::Cancelled);
                }
                joined = tasks.join_next() => {
                    let Some(joined) = joined else { break };
                    match joined {
                        Ok(report) => reports.push(report),
                        Err(err) => {
                            tracing::error!(error = %err, "Provider task did not complete");
                        }
                    }
                }
            }
        }

        for report in reports {
            let provider = report.provider;
            let outcome = self.settle(report, tracker).await;
            outcomes.insert(provider, outcome);
        }

        Ok(aggregate(request, outcomes, self.preview.as_ref()))
    }

    /// Commit a successful call's reservation and mark the provider terminal.
    ///
    /// A failed commit has already released the hold; the call's result is
    /// replaced by a failure so nothing unbilled reaches the caller.
    async fn settle(&self, report: TaskReport, tracker: &ProgressTracker) -> ProviderOutcome {
        let TaskReport {
            provider,
            outcome,
            reservation,
        } = report;
        let Some(reservation) = reservation else {
            return outcome;
        };

        let committed =
            on_blocking_pool(&self.ledger, "commit", move |ledger| ledger.commit(reservation)).await;
        match committed {
            Ok(balance) => {
                tracker.mark_completed(provider);
                tracing::debug!(provider = %provider, balance, "Charged for analysis");
                outcome
            }
            Err(err) => {
                tracing::error!(
                    provider = %provider,
                    error = %err,
                    "Commit failed, discarding provider result"
                );
                tracker.mark_errored(provider);
                let kind = if matches!(err, CogError::InsufficientBalance { .. }) {
                    FailureKind::CreditDenied
                } else {
                    FailureKind::Unknown
                };
                ProviderOutcome::failure(kind, format!("result withheld, charge failed: {err}"))
            }
        }
    }

    /// Reserve credit for every requested provider. Skips are recorded in
    /// `outcomes` and marked completed. Holds taken before a storage error are
    /// released.
    async fn reserve_all(
        &self,
        request: &AnalysisRequest,
        tracker: &ProgressTracker,
        outcomes: &mut BTreeMap<Provider, ProviderOutcome>,
    ) -> Result<Vec<(Provider, Arc<dyn ProviderAdapter>, Reservation)>> {
        let mut granted = Vec::with_capacity(request.providers().len());

        for provider in request.providers().iter().copied() {
            let Some(adapter) = self.adapters.get(provider) else {
                tracing::info!(provider = %provider, "Provider not configured, skipping");
                outcomes.insert(provider, ProviderOutcome::skipped(SkipReason::NotConfigured));
                tracker.mark_completed(provider);
                continue;
            };

            let cost = self.costs.cost(request.kind(), provider);
            let account = request.account().to_string();
            let decision = on_blocking_pool(&self.ledger, "reserve", move |ledger| {
                ledger.reserve(&account, provider, cost)
            })
            .await;

            match decision {
                Ok(ReserveDecision::Granted(mut reservation)) => {
                    reservation.set_memo(format!(
                        "{} analysis {}",
                        request.kind(),
                        request.request_id()
                    ));
                    granted.push((provider, adapter, reservation));
                }
                Ok(ReserveDecision::Denied {
                    required,
                    available,
                }) => {
                    outcomes.insert(
                        provider,
                        ProviderOutcome::skipped(SkipReason::CreditDenied {
                            required,
                            available,
                        }),
                    );
                    tracker.mark_completed(provider);
                }
                Err(err) => {
                    tracing::error!(
                        provider = %provider,
                        error = %err,
                        held = granted.len(),
                        "Reservation failed, releasing holds"
                    );
                    for (_, _, reservation) in granted {
                        self.ledger.release(reservation);
                    }
                    return Err(err);
                }
            }
        }

        Ok(granted)
    }
}

/// Run a ledger call that may block on the balance store.
async fn on_blocking_pool<T, F>(ledger: &Arc<CreditLedger>, what: &str, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&CreditLedger) -> Result<T> + Send + 'static,
{
    let ledger = Arc::clone(ledger);
    tokio::task::spawn_blocking(move || op(&ledger))
        .await
        .unwrap_or_else(|err| Err(CogError::ledger(&format!("{what} task"), err)))
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("adapters", &self.adapters)
            .field("costs", &self.costs)
            .field("timeouts", &self.timeouts)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Provider task
// =============================================================================

struct ProviderCall {
    provider: Provider,
    adapter: Arc<dyn ProviderAdapter>,
    kind: AnalysisKind,
    text: Arc<str>,
    context: Option<Arc<str>>,
    timeout: Duration,
    retry: RetryPolicy,
}

async fn run_provider(
    call: ProviderCall,
    reservation: Reservation,
    ledger: Arc<CreditLedger>,
    tracker: Arc<ProgressTracker>,
) -> TaskReport {
    let provider = call.provider;
    tracker.mark_loading(provider);

    let outcome = match AssertUnwindSafe(invoke_with_retry(&call)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(provider = %provider, panic = %message, "Adapter panicked");
            ProviderOutcome::failure(FailureKind::Unknown, format!("adapter panicked: {message}"))
        }
    };

    if outcome.is_success() {
        return TaskReport {
            provider,
            outcome,
            reservation: Some(reservation),
        };
    }

    tracing::info!(
        provider = %provider,
        kind = outcome.failure_kind().map_or("unknown", FailureKind::as_str),
        "Provider call failed"
    );
    tracker.mark_errored(provider);
    ledger.release(reservation);
    TaskReport {
        provider,
        outcome,
        reservation: None,
    }
}

/// Call the adapter, retrying `Unavailable` while the timeout budget lasts.
async fn invoke_with_retry(call: &ProviderCall) -> ProviderOutcome {
    let deadline = Instant::now() + call.timeout;
    let mut attempt = 1;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return timeout_failure(call.timeout);
        }

        let started = Instant::now();
        let outcome = match tokio::time::timeout(
            remaining,
            call.adapter
                .invoke(&call.text, call.context.as_deref(), call.kind, remaining),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => timeout_failure(call.timeout),
        };

        tracing::debug!(
            provider = %call.provider,
            attempt,
            duration_ms = elapsed_ms(started),
            success = outcome.is_success(),
            "Adapter call returned"
        );

        let retryable = outcome.failure_kind() == Some(FailureKind::Unavailable);
        if !retryable || attempt >= call.retry.max_attempts() {
            return outcome;
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining <= call.retry.backoff() {
            return outcome;
        }

        tracing::info!(
            provider = %call.provider,
            attempt,
            backoff_ms = u64::try_from(call.retry.backoff().as_millis()).unwrap_or(u64::MAX),
            "Provider unavailable, retrying"
        );
        tokio::time::sleep(call.retry.backoff()).await;
        attempt += 1;
    }
}

fn timeout_failure(timeout: Duration) -> ProviderOutcome {
    ProviderOutcome::failure(
        FailureKind::Timeout,
        format!("no response within {}s", timeout.as_secs_f64()),
    )
}

/// Providers still non-terminal after the join (aborted tasks, cancellation)
/// are marked errored.
fn finish_unsettled(tracker: &ProgressTracker) {
    for (provider, state) in tracker.snapshot().states {
        if !state.is_terminal() {
            tracker.mark_errored(provider);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
