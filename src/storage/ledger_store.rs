//! SQLite-backed balance store.
//!
//! Every mutation updates `credit_balances` and appends to `credit_journal`
//! in one transaction. Debits are conditional on the row covering the amount,
//! so the `balance >= 0` check constraint is never the thing that stops an
//! overdraft.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde::Serialize;

use super::ledger_schema::run_migrations;
use crate::core::ledger::{BalanceStore, LedgerKey};
use crate::core::provider::Provider;
use crate::error::{CogError, Result};

/// How long a writer waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// One journal row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: i64,
    pub account: String,
    pub provider: String,
    pub delta: i64,
    pub balance_after: u64,
    pub memo: String,
    pub created_at: DateTime<Utc>,
}

/// Balance store persisted in a `SQLite` database.
pub struct SqliteBalanceStore {
    conn: Mutex<Connection>,
}

impl SqliteBalanceStore {
    /// Create or open a ledger database at the given path.
    ///
    /// # Errors
    /// Returns an error if the parent directory cannot be created, the database
    /// cannot be opened, or schema migrations fail.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CogError::ledger(&format!("create {}", parent.display()), e))?;
        }

        let mut conn = Connection::open(path).map_err(|e| CogError::ledger("open ledger db", e))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| CogError::ledger("set busy timeout", e))?;
        run_migrations(&mut conn)?;

        tracing::debug!(path = %path.display(), "Opened ledger database");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory ledger database (for testing).
    ///
    /// # Errors
    /// Returns an error if the in-memory database cannot be opened or migrations fail.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn =
            Connection::open_in_memory().map_err(|e| CogError::ledger("open in-memory db", e))?;
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Most recent journal rows for an account, newest first.
    ///
    /// # Errors
    /// Returns [`CogError::Ledger`] if the query fails.
    pub fn journal(&self, account: &str, limit: usize) -> Result<Vec<JournalEntry>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, account, provider, delta, balance_after, memo, created_at \
                 FROM credit_journal WHERE account = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(|e| CogError::ledger("prepare journal query", e))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![account, limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .map_err(|e| CogError::ledger("query journal", e))?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, account, provider, delta, balance_after, memo, created_at) =
                row.map_err(|e| CogError::ledger("read journal row", e))?;
            entries.push(JournalEntry {
                id,
                account,
                provider,
                delta,
                balance_after: from_sql_amount(balance_after)?,
                memo,
                created_at: parse_timestamp(&created_at)?,
            });
        }
        Ok(entries)
    }
}

impl BalanceStore for SqliteBalanceStore {
    fn balance(&self, key: &LedgerKey) -> Result<u64> {
        let conn = self.lock();
        read_balance(&conn, key)
    }

    fn debit(&self, key: &LedgerKey, amount: u64, memo: &str) -> Result<u64> {
        let delta = to_sql_amount(amount)?;
        let now = Utc::now().to_rfc3339();
        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .map_err(|e| CogError::ledger("begin debit", e))?;

        let changed = tx
            .execute(
                "UPDATE credit_balances SET balance = balance - ?3, updated_at = ?4 \
                 WHERE account = ?1 AND provider = ?2 AND balance >= ?3",
                params![key.account, key.provider.cli_name(), delta, now],
            )
            .map_err(|e| CogError::ledger("debit balance", e))?;

        if changed == 0 {
            let available = read_balance(&tx, key)?;
            return Err(CogError::InsufficientBalance {
                account: key.account.clone(),
                provider: key.provider.cli_name().to_string(),
                requested: amount,
                available,
            });
        }

        let after = read_balance(&tx, key)?;
        append_journal(&tx, key, -delta, after, memo, &now)?;
        tx.commit().map_err(|e| CogError::ledger("commit debit", e))?;
        Ok(after)
    }

    fn credit(&self, key: &LedgerKey, amount: u64, memo: &str) -> Result<u64> {
        let delta = to_sql_amount(amount)?;
        let now = Utc::now().to_rfc3339();
        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .map_err(|e| CogError::ledger("begin credit", e))?;

        tx.execute(
            "INSERT INTO credit_balances (account, provider, balance, updated_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(account, provider) DO UPDATE SET \
                balance = balance + excluded.balance, updated_at = excluded.updated_at",
            params![key.account, key.provider.cli_name(), delta, now],
        )
        .map_err(|e| CogError::ledger("credit balance", e))?;

        let after = read_balance(&tx, key)?;
        append_journal(&tx, key, delta, after, memo, &now)?;
        tx.commit().map_err(|e| CogError::ledger("commit credit", e))?;
        Ok(after)
    }

    fn balances(&self, account: &str) -> Result<Vec<(Provider, u64)>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT provider, balance FROM credit_balances WHERE account = ?1 ORDER BY provider",
            )
            .map_err(|e| CogError::ledger("prepare balances query", e))?;

        let rows = stmt
            .query_map([account], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(|e| CogError::ledger("query balances", e))?;

        let mut balances = Vec::new();
        for row in rows {
            let (name, balance) = row.map_err(|e| CogError::ledger("read balance row", e))?;
            match Provider::from_cli_name(&name) {
                Ok(provider) => balances.push((provider, from_sql_amount(balance)?)),
                Err(_) => tracing::warn!(provider = %name, "Skipping balance row for unknown provider"),
            }
        }
        balances.sort();
        Ok(balances)
    }
}

impl std::fmt::Debug for SqliteBalanceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBalanceStore").finish_non_exhaustive()
    }
}

fn read_balance(conn: &Connection, key: &LedgerKey) -> Result<u64> {
    let balance: Option<i64> = conn
        .query_row(
            "SELECT balance FROM credit_balances WHERE account = ?1 AND provider = ?2",
            params![key.account, key.provider.cli_name()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| CogError::ledger("read balance", e))?;
    balance.map_or(Ok(0), from_sql_amount)
}

fn append_journal(
    tx: &Transaction<'_>,
    key: &LedgerKey,
    delta: i64,
    balance_after: u64,
    memo: &str,
    now: &str,
) -> Result<()> {
    tx.execute(
        "INSERT INTO credit_journal (account, provider, delta, balance_after, memo, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            key.account,
            key.provider.cli_name(),
            delta,
            to_sql_amount(balance_after)?,
            memo,
            now
        ],
    )
    .map_err(|e| CogError::ledger("append journal", e))?;
    Ok(())
}

fn to_sql_amount(amount: u64) -> Result<i64> {
    i64::try_from(amount).map_err(|_| CogError::Ledger(format!("amount {amount} out of range")))
}

fn from_sql_amount(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| CogError::Ledger(format!("negative balance {value} in store")))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CogError::ledger("parse journal timestamp", e))
}
