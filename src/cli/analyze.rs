//! Analyze command implementation.

use std::io::Read;
use std::sync::Arc;

use colored::Colorize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cli::args::{AnalyzeArgs, Cli};
use crate::core::adapter::AdapterSet;
use crate::core::http::build_client;
use crate::core::ledger::CreditLedger;
use crate::core::models::{AnalysisKind, AnalysisRequest};
use crate::core::orchestrator::Orchestrator;
use crate::core::preview::ExcerptPreview;
use crate::core::progress::{ProgressState, ProgressTracker, ProgressUpdate};
use crate::error::{CogError, Result};
use crate::providers::build_adapters;
use crate::render;
use crate::storage::config::{CommandOverrides, ResolvedConfig};
use crate::storage::ledger_store::SqliteBalanceStore;
use crate::util::env::should_show_progress;

/// Execute the analyze command.
pub async fn execute(cli: &Cli, args: &AnalyzeArgs) -> Result<()> {
    args.validate()?;

    let overrides = CommandOverrides {
        provider: args.provider.clone(),
        account: args.account.clone(),
        timeout_seconds: args.timeout,
    };
    let config = ResolvedConfig::resolve(cli, &overrides)?;

    let kind = AnalysisKind::from_arg(&args.kind)?;
    let text = read_input(args)?;
    let mut request =
        AnalysisRequest::new(text, kind, config.account.clone(), config.providers.clone())?;
    if let Some(context) = &args.context {
        request = request.with_context(context.clone());
    }

    let store = SqliteBalanceStore::open(&config.ledger_path)?;
    let ledger = Arc::new(CreditLedger::new(Arc::new(store)));
    let client = build_client()?;
    let adapters = build_adapters(&config.file, &client);

    tracing::debug!(
        request_id = %request.request_id(),
        configured = ?adapters.providers(),
        ledger = %config.ledger_path.display(),
        "Prepared analysis"
    );

    let orchestrator = build_orchestrator(adapters, ledger, &config);
    let tracker = Arc::new(ProgressTracker::new());
    let cancel = CancellationToken::new();

    let printer = should_show_progress(args.quiet).then(|| {
        let no_color = !config.use_color();
        tokio::spawn(print_progress(tracker.subscribe(), no_color))
    });
    let interrupt = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let outcome = orchestrator
        .run_with(&request, Arc::clone(&tracker), cancel)
        .await;

    interrupt.abort();
    if let Some(printer) = printer {
        // The tracker closes its subscribers when the run ends.
        let _ = printer.await;
    }

    let result = outcome?;
    let output = render::render_analysis(&result, config.format, config.pretty, !config.use_color())?;
    print!("{output}");

    if result.is_all_failed() {
        return Err(CogError::AllProvidersFailed {
            failed: result.outcomes.len(),
        });
    }
    Ok(())
}

/// Wire a resolved configuration into an orchestrator.
#[must_use]
pub fn build_orchestrator(
    adapters: AdapterSet,
    ledger: Arc<CreditLedger>,
    config: &ResolvedConfig,
) -> Orchestrator {
    let mut orchestrator = Orchestrator::new(adapters, ledger)
        .with_costs(config.costs.clone())
        .with_preview(Arc::new(ExcerptPreview::new(config.excerpt_words)))
        .with_retry(config.retry);
    for (provider, timeout) in &config.timeouts {
        orchestrator = orchestrator.with_timeout(*provider, *timeout);
    }
    orchestrator
}

/// Read the text from `--text`, `--file`, or stdin, in that order.
fn read_input(args: &AnalyzeArgs) -> Result<String> {
    if let Some(text) = &args.text {
        return Ok(text.clone());
    }
    if let Some(path) = &args.file {
        return std::fs::read_to_string(path).map_err(|e| {
            CogError::InvalidRequest(format!("cannot read {}: {e}", path.display()))
        });
    }
    if crate::util::env::stdin_is_tty() {
        return Err(CogError::InvalidRequest(
            "no input text: pass --text, --file, or pipe text on stdin".to_string(),
        ));
    }

    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    Ok(text)
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("Interrupt received, cancelling analysis");
        cancel.cancel();
    }
}

/// One stderr line per state change.
async fn print_progress(mut updates: mpsc::UnboundedReceiver<ProgressUpdate>, no_color: bool) {
    while let Some(update) = updates.recv().await {
        if update.state == ProgressState::Pending {
            continue;
        }
        let snapshot = &update.snapshot;
        let done = snapshot.count(ProgressState::Completed) + snapshot.count(ProgressState::Errored);
        let state = if no_color {
            update.state.as_str().to_string()
        } else {
            match update.state {
                ProgressState::Completed => update.state.as_str().green().to_string(),
                ProgressState::Errored => update.state.as_str().red().to_string(),
                _ => update.state.as_str().dimmed().to_string(),
            }
        };
        eprintln!(
            "[{done}/{}] {} {state}",
            snapshot.len(),
            update.provider.display_name()
        );
    }
}
