use regex::{Regex, RegexBuilder};
use std::ops::Range;
use tracing::debug;

use crate::errors::{SearchError, SearchResult};

/// Strategy for pattern matching
#[derive(Debug, Clone)]
pub enum MatchStrategy {
    /// Case-sensitive substring search
    Literal(String),
    /// Compiled regex, also used for case-insensitive literals
    Regex(Regex),
}

/// Finds the first occurrence of one pattern in a line.
///
/// Both the disk scanner and the content index share one matcher per search
/// call, so the two paths report identical hits and spans.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pattern: String,
    strategy: MatchStrategy,
}

impl PatternMatcher {
    /// Compiles `pattern` once for the whole search.
    ///
    /// Case-insensitive literals are escaped and compiled as a regex with
    /// case folding so the reported span covers the original text even when
    /// folding changes its byte length.
    pub fn new(pattern: &str, is_regex: bool, case_sensitive: bool) -> SearchResult<Self> {
        let strategy = match (is_regex, case_sensitive) {
            (false, true) => MatchStrategy::Literal(pattern.to_string()),
            (false, false) => MatchStrategy::Regex(Self::compile(&regex::escape(pattern), false)?),
            (true, case_sensitive) => MatchStrategy::Regex(Self::compile(pattern, case_sensitive)?),
        };
        debug!(
            "Pattern '{}' uses {} matching",
            pattern,
            match strategy {
                MatchStrategy::Literal(_) => "literal",
                MatchStrategy::Regex(_) => "regex",
            }
        );

        Ok(Self {
            pattern: pattern.to_string(),
            strategy,
        })
    }

    fn compile(pattern: &str, case_sensitive: bool) -> SearchResult<Regex> {
        RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|e| SearchError::invalid_pattern(e.to_string()))
    }

    /// The pattern as supplied by the caller
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn strategy(&self) -> &MatchStrategy {
        &self.strategy
    }

    /// Byte range of the first occurrence in `line`, or `None`
    pub fn find(&self, line: &str) -> Option<Range<usize>> {
        match &self.strategy {
            MatchStrategy::Literal(pattern) => line
                .find(pattern.as_str())
                .map(|start| start..start + pattern.len()),
            MatchStrategy::Regex(regex) => regex.find(line).map(|m| m.range()),
        }
    }

    pub fn is_match(&self, line: &str) -> bool {
        match &self.strategy {
            MatchStrategy::Literal(pattern) => line.contains(pattern.as_str()),
            MatchStrategy::Regex(regex) => regex.is_match(line),
        }
    }
}
