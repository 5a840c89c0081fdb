//! Storage for configuration and the credit ledger.

pub mod config;
pub mod ledger_schema;
pub mod ledger_store;
pub mod paths;

pub use config::{
    CommandOverrides, Config, ConfigSource, ConfigSources, ResolvedConfig, ENV_ACCOUNT,
    ENV_CONFIG, ENV_FORMAT, ENV_LEDGER, ENV_NO_COLOR, ENV_NO_COLOR_STD, ENV_PRETTY,
    ENV_PROVIDERS, ENV_TIMEOUT,
};
pub use ledger_schema::{run_migrations, LATEST_SCHEMA_VERSION};
pub use ledger_store::{JournalEntry, SqliteBalanceStore};
pub use paths::AppPaths;
