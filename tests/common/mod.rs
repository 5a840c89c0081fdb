//! Common helpers for integration tests.
//!
//! - `logger`: structured per-test logging
//! - `cli`: isolated invocations of the `cogmeter` binary

pub mod cli;
pub mod logger;
