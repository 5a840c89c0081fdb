//! Utility functions.

pub mod env;
pub mod format;

pub use format::{first_words, format_credits, format_elapsed_ms, word_count, wrap_text};
