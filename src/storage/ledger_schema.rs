//! Credit ledger schema and migrations.
//!
//! Migrations are embedded SQL files applied in version order and recorded in
//! `schema_migrations`, so reopening an existing database is a no-op.

use rusqlite::Connection;

use crate::error::{CogError, Result};

const LEDGER_MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("../../migrations/001_credit_balances.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("../../migrations/002_credit_journal.sql"),
    },
];

/// Latest schema version this build knows about.
pub const LATEST_SCHEMA_VERSION: i32 = 2;

/// Run schema migrations for the ledger database.
///
/// Returns the latest schema version applied.
///
/// # Errors
/// Returns [`CogError::Ledger`] if creating the migrations table, reading the
/// schema version, or applying any migration fails, and [`CogError::Other`] if
/// the database was written by a newer schema.
pub fn run_migrations(conn: &mut Connection) -> Result<i32> {
    ensure_schema_migrations_table(conn)?;

    let mut current_version = get_schema_version(conn)?;
    if current_version > LATEST_SCHEMA_VERSION {
        return Err(CogError::Other(anyhow::anyhow!(
            "ledger schema version {current_version} is newer than this build supports \
             ({LATEST_SCHEMA_VERSION}); upgrade cogmeter"
        )));
    }

    for migration in LEDGER_MIGRATIONS {
        if migration.version > current_version {
            apply_migration(conn, migration)?;
            tracing::debug!(version = migration.version, "Applied ledger migration");
            current_version = migration.version;
        }
    }

    Ok(current_version)
}

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: i32,
    sql: &'static str,
}

fn ensure_schema_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (\
            version INTEGER PRIMARY KEY,\
            applied_at TEXT DEFAULT (datetime('now'))\
        );",
    )
    .map_err(|e| CogError::ledger("create schema_migrations", e))
}

fn get_schema_version(conn: &Connection) -> Result<i32> {
    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .map_err(|e| CogError::ledger("read schema version", e))?;

    Ok(version.unwrap_or(0))
}

fn apply_migration(conn: &mut Connection, migration: &Migration) -> Result<()> {
    let context = |step: &str| format!("{step} migration {}", migration.version);

    let tx = conn
        .transaction()
        .map_err(|e| CogError::ledger(&context("begin"), e))?;

    tx.execute_batch(migration.sql)
        .map_err(|e| CogError::ledger(&context("apply"), e))?;

    tx.execute(
        "INSERT INTO schema_migrations (version) VALUES (?1)",
        [migration.version],
    )
    .map_err(|e| CogError::ledger(&context("record"), e))?;

    tx.commit()
        .map_err(|e| CogError::ledger(&context("commit"), e))
}
