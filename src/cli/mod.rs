//! CLI argument parsing and command dispatch.

pub mod analyze;
pub mod args;
pub mod costs;
pub mod credits;

pub use args::{Cli, Commands, OutputFormat};
