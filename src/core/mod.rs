//! Orchestration core: data model, provider contract, credit ledger, progress
//! tracking and result assembly.

pub mod adapter;
pub mod aggregator;
pub mod costs;
pub mod http;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod preview;
pub mod progress;
pub mod provider;

pub use adapter::{AdapterSet, ProviderAdapter};
pub use aggregator::aggregate;
pub use costs::{CostRow, CostSchedule};
pub use ledger::{
    BalanceStore, CreditLedger, LedgerKey, MemoryBalanceStore, Reservation, ReserveDecision,
};
pub use models::{
    AggregateResult, AnalysisKind, AnalysisPayload, AnalysisRequest, FailureKind, ProfileSection,
    ProviderOutcome, RobotOutput, SkipReason,
};
pub use orchestrator::{Orchestrator, RetryPolicy};
pub use preview::{ExcerptPreview, PreviewGenerator};
pub use progress::{ProgressSnapshot, ProgressState, ProgressTracker, ProgressUpdate};
pub use provider::{Provider, ProviderSelection};
