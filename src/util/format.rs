//! Number and text formatting utilities.

/// Format a credit amount with thousands separators.
#[must_use]
pub fn format_credits(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Format an elapsed time in milliseconds as `850ms` or `12.4s`.
#[must_use]
pub fn format_elapsed_ms(ms: u64) -> String {
    if ms < 1_000 {
        format!("{ms}ms")
    } else {
        format!("{}.{}s", ms / 1_000, (ms % 1_000) / 100)
    }
}

/// Number of whitespace-separated words.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// The first `limit` words of `text`, joined by single spaces.
///
/// Returns the excerpt and whether anything was cut.
#[must_use]
pub fn first_words(text: &str, limit: usize) -> (String, bool) {
    let mut words = text.split_whitespace();
    let excerpt = words.by_ref().take(limit).collect::<Vec<_>>().join(" ");
    (excerpt, words.next().is_some())
}

/// Greedy word wrap. Words longer than `width` get a line of their own.
#[must_use]
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
