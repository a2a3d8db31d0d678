//! Suppression phrase filter.
//!
//! Messages containing any configured phrase (case-insensitive) are
//! dropped without notice, whoever posts them.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};

/// Compiled phrase matcher.
#[derive(Debug, Default)]
pub struct PhraseFilter {
    phrases: Vec<String>,
    automaton: Option<AhoCorasick>,
}

impl PhraseFilter {
    /// Build a filter. Blank phrases are ignored; if the automaton cannot be
    /// built the filter is disabled and a warning is logged.
    pub fn new(phrases: &[String]) -> Self {
        let phrases: Vec<String> = phrases
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        if phrases.is_empty() {
            return Self::default();
        }

        let automaton = match AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostFirst)
            .build(&phrases)
        {
            Ok(ac) => Some(ac),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build suppression phrase matcher");
                None
            }
        };

        Self { phrases, automaton }
    }

    pub fn is_empty(&self) -> bool {
        self.automaton.is_none()
    }

    /// The first configured phrase found in `message`, if any.
    pub fn matched_phrase(&self, message: &str) -> Option<&str> {
        let automaton = self.automaton.as_ref()?;
        let haystack = message.to_lowercase();
        automaton
            .find(&haystack)
            .map(|m| self.phrases[m.pattern().as_usize()].as_str())
    }
}
