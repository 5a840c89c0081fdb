//! Styles shared by the human renderers.

use rich_rust::{Color, ColorSystem, Segment, Style};

/// Named styles for one render pass.
#[derive(Debug, Clone)]
pub struct Palette {
    pub title: Style,
    pub border: Style,
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    pub muted: Style,
    pub label: Style,
    pub no_color: bool,
}

impl Palette {
    #[must_use]
    pub fn new(no_color: bool) -> Self {
        if no_color {
            return Self {
                title: Style::new(),
                border: Style::new(),
                success: Style::new(),
                warning: Style::new(),
                error: Style::new(),
                muted: Style::new(),
                label: Style::new(),
                no_color,
            };
        }

        Self {
            title: colored("cyan").bold(),
            border: colored("blue"),
            success: colored("green"),
            warning: colored("yellow"),
            error: colored("red").bold(),
            muted: Style::new().dim(),
            label: Style::new().bold(),
            no_color,
        }
    }
}

/// A style with a named foreground color, or unstyled if the name is unknown.
#[must_use]
pub fn colored(name: &str) -> Style {
    Color::parse(name).map_or_else(|_| Style::new(), |color| Style::new().color(color))
}

/// Convert segments to a string, with ANSI codes unless `no_color`.
#[must_use]
pub fn segments_to_string(segments: &[Segment], no_color: bool) -> String {
    segments
        .iter()
        .map(|seg| match &seg.style {
            Some(style) if !no_color => style.render(&seg.text, ColorSystem::TrueColor),
            _ => seg.text.to_string(),
        })
        .collect()
}
