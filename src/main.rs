//! cogmeter - multi-provider text analysis with credit metering
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use std::process::ExitCode;

use cogmeter::cli::{Cli, Commands};
use cogmeter::core::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = cli
        .log_level
        .as_deref()
        .and_then(logging::LogLevel::from_arg)
        .or_else(logging::parse_log_level_from_env)
        .unwrap_or_default();
    let log_format = if cli.json_output {
        logging::LogFormat::Json
    } else {
        logging::parse_log_format_from_env().unwrap_or_default()
    };
    let log_file = logging::parse_log_file_from_env();
    logging::init(log_level, log_format, log_file, cli.verbose);

    let format = cli.effective_format();
    let no_color = !cogmeter::util::env::should_use_color(cli.no_color);
    let pretty = cli.pretty;

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.error_code(), "{e}");
            let error_output = cogmeter::render::error::render_error(&e, format, no_color, pretty);
            eprintln!("{error_output}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: &Cli) -> cogmeter::Result<()> {
    match &cli.command {
        None => {
            print_quickstart();
            Ok(())
        }
        Some(Commands::Analyze(args)) => cogmeter::cli::analyze::execute(cli, args).await,
        Some(Commands::Credits(cmd)) => cogmeter::cli::credits::execute(cli, cmd),
        Some(Commands::Costs(args)) => cogmeter::cli::costs::execute(cli, args),
    }
}

/// Print quickstart help when no command is given.
fn print_quickstart() {
    println!(
        r#"cogmeter - multi-provider text analysis with credit metering

USAGE:
    cogmeter [OPTIONS] <COMMAND>

COMMANDS:
    analyze   Run one analysis across providers
    credits   Inspect and top up credit balances
    costs     Show the credit cost schedule

QUICK START:
    cogmeter credits grant --provider openai --amount 1000
    cogmeter analyze --text "..." --kind cognitive --provider openai,anthropic
    cogmeter analyze --file essay.txt --kind comprehensive
    cogmeter credits balance

ROBOT MODE (for AI agents):
    cogmeter analyze --file essay.txt --json

For more help: cogmeter --help

Version: {}"#,
        env!("CARGO_PKG_VERSION")
    );
}
