//! Preview generation for credit-denied providers.
//!
//! A preview is a deterministic, locally computed stand-in for a provider's
//! output. It never calls out and costs nothing.

use super::models::{AnalysisKind, AnalysisPayload, ProfileSection};
use crate::util::{first_words, word_count};

/// Default number of input words quoted in a preview.
pub const DEFAULT_EXCERPT_WORDS: usize = 60;

/// Produces a preview payload from the request text.
///
/// Implementations must be pure: the same `(text, kind)` always yields the
/// same payload, with `is_preview` set.
pub trait PreviewGenerator: Send + Sync {
    fn generate(&self, text: &str, kind: AnalysisKind) -> AnalysisPayload;
}

/// Excerpt-based preview: a headline, the opening words of the text, and
/// one locked placeholder per report section.
#[derive(Debug, Clone, Copy)]
pub struct ExcerptPreview {
    excerpt_words: usize,
}

impl Default for ExcerptPreview {
    fn default() -> Self {
        Self::new(DEFAULT_EXCERPT_WORDS)
    }
}

impl ExcerptPreview {
    #[must_use]
    pub const fn new(excerpt_words: usize) -> Self {
        Self { excerpt_words }
    }

    #[must_use]
    pub const fn excerpt_words(&self) -> usize {
        self.excerpt_words
    }

    const fn headline(kind: AnalysisKind) -> &'static str {
        match kind {
            AnalysisKind::Cognitive => "Cognitive profile preview",
            AnalysisKind::Psychological => "Psychological profile preview",
            AnalysisKind::Comprehensive => "Comprehensive report preview",
        }
    }
}

impl PreviewGenerator for ExcerptPreview {
    fn generate(&self, text: &str, kind: AnalysisKind) -> AnalysisPayload {
        let total = word_count(text);
        let (excerpt, truncated) = first_words(text, self.excerpt_words);
        let quoted = if truncated {
            format!("{excerpt} …")
        } else {
            excerpt
        };

        let summary = format!(
            "{} based on {total} word(s). Add credit to unlock the full analysis.",
            Self::headline(kind)
        );

        let mut sections = Vec::with_capacity(kind.report_sections().len() + 1);
        sections.push(ProfileSection {
            title: "Excerpt".to_string(),
            body: quoted,
        });
        sections.extend(kind.report_sections().iter().map(|title| ProfileSection {
            title: (*title).to_string(),
            body: "Locked".to_string(),
        }));

        AnalysisPayload {
            kind,
            summary,
            sections,
            is_preview: true,
        }
    }
}
