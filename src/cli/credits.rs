//! Credits command implementation.

use std::sync::Arc;

use crate::cli::args::{Cli, CreditsCommand};
use crate::core::ledger::CreditLedger;
use crate::core::provider::{Provider, ProviderSelection};
use crate::error::{CogError, Result};
use crate::render::{self, BalanceReport, BalanceRow};
use crate::storage::config::{CommandOverrides, ResolvedConfig};
use crate::storage::ledger_store::SqliteBalanceStore;

/// Execute a credits subcommand.
pub fn execute(cli: &Cli, cmd: &CreditsCommand) -> Result<()> {
    let account = match cmd {
        CreditsCommand::Balance { account, .. }
        | CreditsCommand::Grant { account, .. }
        | CreditsCommand::Journal { account, .. } => account.clone(),
    };
    let config = ResolvedConfig::resolve(
        cli,
        &CommandOverrides {
            account,
            ..CommandOverrides::default()
        },
    )?;
    let store = Arc::new(SqliteBalanceStore::open(&config.ledger_path)?);

    let output = match cmd {
        CreditsCommand::Balance { provider, .. } => {
            let providers = match provider {
                Some(arg) => ProviderSelection::from_arg(arg)?.providers(),
                None => Provider::ALL.to_vec(),
            };
            let ledger = CreditLedger::new(store);
            let report = balance_report(&ledger, &config.account, &providers)?;
            render::render_balances(&report, config.format, config.pretty, !config.use_color())?
        }
        CreditsCommand::Grant {
            provider,
            amount,
            memo,
            ..
        } => {
            if *amount == 0 {
                return Err(CogError::InvalidRequest(
                    "grant amount must be greater than 0".to_string(),
                ));
            }
            let provider = Provider::from_cli_name(provider)?;
            let ledger = CreditLedger::new(store);
            let balance = ledger.grant(&config.account, provider, *amount, memo)?;
            tracing::info!(
                account = %config.account,
                provider = %provider,
                amount,
                balance,
                "Credit granted"
            );
            render::render_grant(
                &config.account,
                provider,
                *amount,
                balance,
                config.format,
                config.pretty,
                !config.use_color(),
            )?
        }
        CreditsCommand::Journal { limit, .. } => {
            let entries = store.journal(&config.account, *limit)?;
            render::render_journal(
                &config.account,
                &entries,
                config.format,
                config.pretty,
                !config.use_color(),
            )?
        }
    };

    print!("{output}");
    Ok(())
}

/// Balances for `providers`, zero where the account has no row.
pub fn balance_report(
    ledger: &CreditLedger,
    account: &str,
    providers: &[Provider],
) -> Result<BalanceReport> {
    let balances = providers
        .iter()
        .map(|provider| {
            Ok(BalanceRow {
                provider: *provider,
                balance: ledger.balance(account, *provider)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(BalanceReport {
        account: account.to_string(),
        balances,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::MemoryBalanceStore;

    #[test]
    fn report_fills_missing_providers_with_zero() {
        let store = MemoryBalanceStore::new().with_balance("acct", Provider::Anthropic, 300);
        let ledger = CreditLedger::new(Arc::new(store));

        let report =
            balance_report(&ledger, "acct", &[Provider::OpenAi, Provider::Anthropic]).unwrap();
        assert_eq!(
            report.balances,
            vec![
                BalanceRow {
                    provider: Provider::OpenAi,
                    balance: 0
                },
                BalanceRow {
                    provider: Provider::Anthropic,
                    balance: 300
                },
            ]
        );
    }
}
