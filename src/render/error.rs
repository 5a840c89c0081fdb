//! Error rendering.
//!
//! Human mode prints the error, its code and fix suggestions on stderr. JSON
//! mode prints a structured error object for machine consumers.

use colored::Colorize;
use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::error::{CogError, FixSuggestion};
use crate::util::format::wrap_text;

/// Render an error for the given output mode.
#[must_use]
pub fn render_error(error: &CogError, format: OutputFormat, no_color: bool, pretty: bool) -> String {
    match format {
        OutputFormat::Json => render_error_json(error, pretty),
        OutputFormat::Human => {
            if !no_color && crate::util::env::stderr_is_tty() {
                render_colored(error)
            } else {
                render_simple(error)
            }
        }
    }
}

/// Render error as structured JSON.
#[must_use]
pub fn render_error_json(error: &CogError, pretty: bool) -> String {
    let error_json = ErrorJson::from_error(error);
    let rendered = if pretty {
        serde_json::to_string_pretty(&error_json)
    } else {
        serde_json::to_string(&error_json)
    };
    rendered.unwrap_or_else(|_| render_simple(error))
}

fn render_colored(error: &CogError) -> String {
    let suggestions = error.fix_suggestions();
    let mut lines = vec![format!(
        "{} {}",
        error.to_string().red().bold(),
        format!("[{}]", error.error_code()).dimmed()
    )];

    if !suggestions.is_empty() {
        lines.push(String::new());
        lines.push("How to fix:".cyan().bold().to_string());
        push_commands(&mut lines, &suggestions, |cmd| cmd.cyan().to_string());
    }

    if let Some(first) = suggestions.first() {
        if !first.context.is_empty() {
            lines.push(String::new());
            lines.push("Why this happened:".bold().to_string());
            lines.extend(wrap_text(&first.context, 66).into_iter().map(|l| format!("  {l}")));
        }
        if let Some(prevention) = &first.prevention {
            lines.push(String::new());
            lines.push("Prevention:".green().bold().to_string());
            lines.extend(wrap_text(prevention, 66).into_iter().map(|l| format!("  {l}")));
        }
    }

    lines.join("\n")
}

fn push_commands(lines: &mut Vec<String>, suggestions: &[FixSuggestion], style: impl Fn(&str) -> String) {
    for (i, suggestion) in suggestions.iter().enumerate() {
        for (j, cmd) in suggestion.commands.iter().enumerate() {
            let prefix = if j == 0 {
                format!("  {}. ", i + 1)
            } else {
                "     Or: ".to_string()
            };
            lines.push(format!("{prefix}{}", style(cmd)));
        }
    }
}

/// Render error as plain text with the first fix command.
fn render_simple(error: &CogError) -> String {
    let mut lines = vec![format!("Error [{}]: {}", error.error_code(), error)];

    if let Some(cmd) = error
        .fix_suggestions()
        .iter()
        .flat_map(|s| s.commands.iter())
        .find(|c| !c.starts_with('#'))
    {
        lines.push(format!("Fix: {cmd}"));
    }

    lines.join("\n")
}

#[derive(Serialize)]
struct ErrorJson {
    error_code: String,
    category: String,
    message: String,
    exit_code: i32,
    suggestions: Vec<SuggestionJson>,
}

#[derive(Serialize)]
struct SuggestionJson {
    commands: Vec<String>,
    context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    prevention: Option<String>,
}

impl ErrorJson {
    fn from_error(error: &CogError) -> Self {
        Self {
            error_code: error.error_code().to_string(),
            category: error.category().to_string(),
            message: error.to_string(),
            exit_code: error.exit_code().into(),
            suggestions: error
                .fix_suggestions()
                .into_iter()
                .map(|s| SuggestionJson {
                    commands: s.commands,
                    context: s.context,
                    prevention: s.prevention,
                })
                .collect(),
        }
    }
}
