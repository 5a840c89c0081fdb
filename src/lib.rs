//! cogmeter - multi-provider text analysis with credit metering
//!
//! Fans one piece of text out to several analysis providers at once, bills
//! each provider's balance through a reserve/commit credit ledger, streams
//! per-provider progress, and folds the outcomes into a single result where
//! providers the account could not afford get a preview instead.

// Note: deny (not forbid) to allow #[allow(unsafe_code)] in test helpers for env var manipulation
#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod core;
pub mod error;
pub mod providers;
pub mod render;
pub mod storage;
pub mod util;

/// Test utilities module - included in test builds or when test-utils feature is enabled.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{CogError, ExitCode, Result};
