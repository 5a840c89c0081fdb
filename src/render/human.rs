//! Human-readable output using rich_rust panels.

use rich_rust::prelude::*;
use rich_rust::Segment;

use super::theme::{segments_to_string, Palette};
use super::BalanceReport;
use crate::core::costs::CostRow;
use crate::core::models::{AggregateResult, AnalysisPayload, ProviderOutcome, SkipReason};
use crate::core::provider::Provider;
use crate::storage::ledger_store::JournalEntry;
use crate::util::format::{format_credits, format_elapsed_ms, wrap_text};

const PANEL_WIDTH: usize = 72;
const BODY_WIDTH: usize = PANEL_WIDTH - 6;

// =============================================================================
// Analysis
// =============================================================================

/// Render one orchestration result: a panel per provider plus a summary line.
#[must_use]
pub fn render_analysis(result: &AggregateResult, no_color: bool) -> String {
    let palette = Palette::new(no_color);
    let mut output = String::new();

    for (provider, outcome) in &result.outcomes {
        output.push_str(&render_outcome(*provider, outcome, &palette));
        output.push('\n');
    }

    let summary = format!(
        "{} analysis: {} succeeded, {} failed, {} skipped",
        result.kind.display_name(),
        result.success_count(),
        result.failure_count(),
        result.skipped_count(),
    );
    let style = if result.is_all_failed() {
        palette.error.clone()
    } else {
        palette.muted.clone()
    };
    output.push_str(&segments_to_string(
        &[Segment::styled(summary, style)],
        no_color,
    ));
    output.push('\n');
    output
}

fn render_outcome(provider: Provider, outcome: &ProviderOutcome, palette: &Palette) -> String {
    let mut lines: Vec<Vec<Segment>> = Vec::new();

    let status = match outcome {
        ProviderOutcome::Success { payload, elapsed_ms } => {
            push_payload(&mut lines, payload, palette);
            format!("done in {}", format_elapsed_ms(*elapsed_ms))
        }
        ProviderOutcome::Failure { kind, message } => {
            for line in wrap_text(message, BODY_WIDTH) {
                lines.push(vec![Segment::plain(line)]);
            }
            format!("failed: {kind}")
        }
        ProviderOutcome::Skipped { reason, preview } => {
            let status = match reason {
                SkipReason::CreditDenied { required, available } => {
                    lines.push(vec![Segment::styled(
                        format!(
                            "Needs {} credits, {} available.",
                            format_credits(*required),
                            format_credits(*available)
                        ),
                        palette.warning.clone(),
                    )]);
                    "preview".to_string()
                }
                SkipReason::NotConfigured => {
                    lines.push(vec![Segment::styled(
                        "No endpoint configured for this provider.".to_string(),
                        palette.muted.clone(),
                    )]);
                    "not configured".to_string()
                }
            };
            if let Some(preview) = preview {
                lines.push(vec![Segment::plain(String::new())]);
                push_payload(&mut lines, preview, palette);
            }
            status
        }
    };

    let title_text = format!("{} · {status}", provider.display_name());
    render_panel(lines, &title_text, palette)
}

fn push_payload(lines: &mut Vec<Vec<Segment>>, payload: &AnalysisPayload, palette: &Palette) {
    for line in wrap_text(&payload.summary, BODY_WIDTH) {
        lines.push(vec![Segment::plain(line)]);
    }

    for section in &payload.sections {
        lines.push(vec![Segment::plain(String::new())]);
        lines.push(vec![Segment::styled(
            section.title.clone(),
            palette.label.clone(),
        )]);
        let style = if payload.is_preview {
            palette.muted.clone()
        } else {
            Style::new()
        };
        for line in wrap_text(&section.body, BODY_WIDTH - 2) {
            lines.push(vec![Segment::styled(format!("  {line}"), style.clone())]);
        }
    }
}

// =============================================================================
// Credits
// =============================================================================

/// Render balances for one account.
#[must_use]
pub fn render_balances(report: &BalanceReport, no_color: bool) -> String {
    let palette = Palette::new(no_color);
    let mut lines: Vec<Vec<Segment>> = Vec::new();

    for row in &report.balances {
        let style = if row.balance == 0 {
            palette.error.clone()
        } else {
            palette.success.clone()
        };
        lines.push(vec![
            Segment::styled(
                format!("{:<12}", row.provider.display_name()),
                palette.label.clone(),
            ),
            Segment::styled(format!("{:>14}", format_credits(row.balance)), style),
        ]);
    }

    if lines.is_empty() {
        lines.push(vec![Segment::styled(
            "No balances".to_string(),
            palette.muted.clone(),
        )]);
    }

    let title = format!("Credits · {}", report.account);
    format!("{}\n", render_panel(lines, &title, &palette))
}

/// Render journal entries, newest first.
#[must_use]
pub fn render_journal(account: &str, entries: &[JournalEntry], no_color: bool) -> String {
    let palette = Palette::new(no_color);
    let mut lines: Vec<Vec<Segment>> = Vec::new();

    for entry in entries {
        let (delta, style) = if entry.delta < 0 {
            (format!("{}", entry.delta), palette.warning.clone())
        } else {
            (format!("+{}", entry.delta), palette.success.clone())
        };
        lines.push(vec![
            Segment::styled(
                entry.created_at.format("%Y-%m-%d %H:%M ").to_string(),
                palette.muted.clone(),
            ),
            Segment::plain(format!("{:<11}", entry.provider)),
            Segment::styled(format!("{delta:>8}"), style),
            Segment::plain(format!(" → {:>8}  ", format_credits(entry.balance_after))),
            Segment::styled(entry.memo.clone(), palette.muted.clone()),
        ]);
    }

    if lines.is_empty() {
        lines.push(vec![Segment::styled(
            "No journal entries".to_string(),
            palette.muted.clone(),
        )]);
    }

    let title = format!("Journal · {account}");
    format!("{}\n", render_panel(lines, &title, &palette))
}

/// Render the result of a grant.
#[must_use]
pub fn render_grant(account: &str, provider: Provider, amount: u64, balance: u64, no_color: bool) -> String {
    let palette = Palette::new(no_color);
    let segments = [
        Segment::styled(
            format!("+{}", format_credits(amount)),
            palette.success.clone(),
        ),
        Segment::plain(format!(
            " credited to {account}/{provider}. Balance: {}",
            format_credits(balance)
        )),
    ];
    format!("{}\n", segments_to_string(&segments, no_color))
}

// =============================================================================
// Costs
// =============================================================================

/// Render the cost schedule, one line per provider.
#[must_use]
pub fn render_costs(rows: &[CostRow], no_color: bool) -> String {
    let palette = Palette::new(no_color);
    let mut lines: Vec<Vec<Segment>> = Vec::new();

    let mut kinds: Vec<_> = rows.iter().map(|r| r.kind).collect();
    kinds.sort();
    kinds.dedup();

    let mut header = vec![Segment::styled(format!("{:<12}", ""), Style::new())];
    for kind in &kinds {
        header.push(Segment::styled(
            format!("{:>15}", kind.display_name()),
            palette.label.clone(),
        ));
    }
    lines.push(header);

    let mut providers: Vec<_> = rows.iter().map(|r| r.provider).collect();
    providers.sort();
    providers.dedup();

    for provider in providers {
        let mut line = vec![Segment::styled(
            format!("{:<12}", provider.display_name()),
            palette.label.clone(),
        )];
        for kind in &kinds {
            let Some(row) = rows.iter().find(|r| r.provider == provider && r.kind == *kind) else {
                line.push(Segment::plain(format!("{:>15}", "-")));
                continue;
            };
            let text = if row.overridden {
                format!("{:>14}*", format_credits(row.cost))
            } else {
                format!("{:>15}", format_credits(row.cost))
            };
            let style = if row.overridden {
                palette.warning.clone()
            } else {
                Style::new()
            };
            line.push(Segment::styled(text, style));
        }
        lines.push(line);
    }

    if rows.iter().any(|r| r.overridden) {
        lines.push(vec![Segment::plain(String::new())]);
        lines.push(vec![Segment::styled(
            "* provider-specific price".to_string(),
            palette.muted.clone(),
        )]);
    }

    format!("{}\n", render_panel(lines, "Credit costs", &palette))
}

// =============================================================================
// Helpers
// =============================================================================

fn render_panel(lines: Vec<Vec<Segment>>, title_text: &str, palette: &Palette) -> String {
    let title = if palette.no_color {
        Text::new(title_text)
    } else {
        Text::styled(title_text, palette.title.clone())
    };

    let mut panel = Panel::new(lines).title(title).padding((0, 1));
    if !palette.no_color {
        panel = panel.border_style(palette.border.clone());
    }

    let segments = panel.render(PANEL_WIDTH);
    segments_to_string(&segments, palette.no_color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{AnalysisKind, FailureKind, ProfileSection};
    use crate::render::BalanceRow;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use uuid::Uuid;

    fn result(outcomes: Vec<(Provider, ProviderOutcome)>) -> AggregateResult {
        AggregateResult {
            request_id: Uuid::new_v4(),
            kind: AnalysisKind::Cognitive,
            text: "sample".to_string(),
            outcomes: outcomes.into_iter().collect::<BTreeMap<_, _>>(),
            completed_at: Utc::now(),
        }
    }

    fn payload(summary: &str) -> AnalysisPayload {
        AnalysisPayload {
            kind: AnalysisKind::Cognitive,
            summary: summary.to_string(),
            sections: vec![ProfileSection {
                title: "Reasoning".to_string(),
                body: "Prefers first principles.".to_string(),
            }],
            is_preview: false,
        }
    }

    #[test]
    fn analysis_shows_every_provider() {
        let result = result(vec![
            (
                Provider::OpenAi,
                ProviderOutcome::success(payload("Systematic thinker"), Duration::from_millis(1200)),
            ),
            (
                Provider::Anthropic,
                ProviderOutcome::failure(FailureKind::Timeout, "no response within 90s"),
            ),
            (
                Provider::DeepSeek,
                ProviderOutcome::skipped(SkipReason::NotConfigured),
            ),
        ]);

        let output = render_analysis(&result, true);
        assert!(output.contains("OpenAI"));
        assert!(output.contains("Systematic thinker"));
        assert!(output.contains("Reasoning"));
        assert!(output.contains("failed: timeout"));
        assert!(output.contains("not configured"));
        assert!(output.contains("1 succeeded, 1 failed, 1 skipped"));
    }

    #[test]
    fn denied_provider_shows_preview_and_shortfall() {
        let mut preview = payload("Preview summary");
        preview.is_preview = true;
        let result = result(vec![(
            Provider::Perplexity,
            ProviderOutcome::Skipped {
                reason: SkipReason::CreditDenied {
                    required: 1000,
                    available: 40,
                },
                preview: Some(preview),
            },
        )]);

        let output = render_analysis(&result, true);
        assert!(output.contains("Needs 1,000 credits, 40 available."));
        assert!(output.contains("Preview summary"));
    }

    #[test]
    fn no_color_has_no_ansi() {
        let report = BalanceReport {
            account: "acct".to_string(),
            balances: vec![BalanceRow {
                provider: Provider::OpenAi,
                balance: 2500,
            }],
        };
        let output = render_balances(&report, true);
        assert!(!output.contains("\x1b["));
        assert!(output.contains("2,500"));
    }

    #[test]
    fn costs_mark_overrides() {
        let rows = vec![
            CostRow {
                provider: Provider::OpenAi,
                kind: AnalysisKind::Cognitive,
                cost: 100,
                overridden: false,
            },
            CostRow {
                provider: Provider::Perplexity,
                kind: AnalysisKind::Cognitive,
                cost: 150,
                overridden: true,
            },
        ];
        let output = render_costs(&rows, true);
        assert!(output.contains("150*"));
        assert!(output.contains("provider-specific price"));
    }
}
