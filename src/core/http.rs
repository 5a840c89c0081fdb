//! HTTP client utilities.
//!
//! One shared client for all provider adapters. Per-call timeouts are set on
//! each request, so the client itself only bounds connection setup.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

use crate::error::{CogError, Result};

/// Bound on TCP/TLS connection setup.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// User agent sent with every provider request.
#[must_use]
pub fn user_agent() -> String {
    format!("cogmeter/{}", env!("CARGO_PKG_VERSION"))
}

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client() -> Result<Client> {
    ClientBuilder::new()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(user_agent())
        .build()
        .map_err(|e| CogError::Network(e.to_string()))
}
