//! Robot-mode output (JSON).
//!
//! Every command emits one [`RobotOutput`] envelope on stdout.

use serde::Serialize;

use super::BalanceReport;
use crate::core::costs::CostRow;
use crate::core::models::{AggregateResult, ProviderOutcome, RobotOutput};
use crate::core::provider::Provider;
use crate::error::Result;
use crate::storage::ledger_store::JournalEntry;

/// Render any `RobotOutput` as JSON.
pub fn render_json<T: Serialize>(output: &T, pretty: bool) -> Result<String> {
    if pretty {
        Ok(serde_json::to_string_pretty(output)?)
    } else {
        Ok(serde_json::to_string(output)?)
    }
}

/// Render an orchestration result. Provider failures are listed in `errors`.
pub fn render_analysis_json(result: &AggregateResult, pretty: bool) -> Result<String> {
    let errors = result
        .outcomes
        .iter()
        .filter_map(|(provider, outcome)| match outcome {
            ProviderOutcome::Failure { kind, message } => {
                Some(format!("{provider}: {kind}: {message}"))
            }
            _ => None,
        })
        .collect();

    render_json(&RobotOutput::new("analyze", result).with_errors(errors), pretty)
}

pub fn render_balances_json(report: &BalanceReport, pretty: bool) -> Result<String> {
    render_json(&RobotOutput::new("credits.balance", report), pretty)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JournalData<'a> {
    account: &'a str,
    entries: &'a [JournalEntry],
}

pub fn render_journal_json(account: &str, entries: &[JournalEntry], pretty: bool) -> Result<String> {
    render_json(
        &RobotOutput::new("credits.journal", JournalData { account, entries }),
        pretty,
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GrantData<'a> {
    account: &'a str,
    provider: Provider,
    amount: u64,
    balance: u64,
}

pub fn render_grant_json(
    account: &str,
    provider: Provider,
    amount: u64,
    balance: u64,
    pretty: bool,
) -> Result<String> {
    render_json(
        &RobotOutput::new(
            "credits.grant",
            GrantData {
                account,
                provider,
                amount,
                balance,
            },
        ),
        pretty,
    )
}

pub fn render_costs_json(rows: &[CostRow], pretty: bool) -> Result<String> {
    render_json(&RobotOutput::new("costs", rows), pretty)
}
