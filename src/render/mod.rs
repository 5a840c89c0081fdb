//! Output rendering for human and robot modes.

pub mod error;
pub mod human;
pub mod robot;
pub mod theme;

use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::core::costs::CostRow;
use crate::core::models::AggregateResult;
use crate::core::provider::Provider;
use crate::error::Result;
use crate::storage::ledger_store::JournalEntry;

/// Balance of one provider for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceRow {
    pub provider: Provider,
    pub balance: u64,
}

/// Balances of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceReport {
    pub account: String,
    pub balances: Vec<BalanceRow>,
}

/// Render an orchestration result.
pub fn render_analysis(
    result: &AggregateResult,
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_analysis(result, no_color)),
        OutputFormat::Json => robot::render_analysis_json(result, pretty),
    }
}

/// Render account balances.
pub fn render_balances(
    report: &BalanceReport,
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_balances(report, no_color)),
        OutputFormat::Json => robot::render_balances_json(report, pretty),
    }
}

/// Render ledger journal entries.
pub fn render_journal(
    account: &str,
    entries: &[JournalEntry],
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_journal(account, entries, no_color)),
        OutputFormat::Json => robot::render_journal_json(account, entries, pretty),
    }
}

/// Render a completed grant.
pub fn render_grant(
    account: &str,
    provider: Provider,
    amount: u64,
    balance: u64,
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_grant(account, provider, amount, balance, no_color)),
        OutputFormat::Json => robot::render_grant_json(account, provider, amount, balance, pretty),
    }
}

/// Render the cost schedule.
pub fn render_costs(
    rows: &[CostRow],
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_costs(rows, no_color)),
        OutputFormat::Json => robot::render_costs_json(rows, pretty),
    }
}
