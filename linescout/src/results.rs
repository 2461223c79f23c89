//! Result types returned by a search.
//!
//! A [`Match`] is one hit on one line. The engine returns them in a flat,
//! append-ordered [`SearchOutput`] together with every per-file problem that
//! was skipped along the way; [`SearchOutput::file_results`] regroups the flat
//! list by file for display.
use serde::Serialize;
use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::errors::SearchError;

/// A neighbouring line shown around a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextLine {
    /// 1-based line number
    pub line_number: usize,
    pub text: String,
}

/// Represents a single match in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    /// The file containing the match
    pub path: PathBuf,
    /// The 1-based line number where the match was found
    pub line_number: usize,
    /// The exact text of the matching line, without its terminator
    pub line_content: String,
    /// Lines around the match in file order, excluding the matching line
    pub context: Vec<ContextLine>,
    /// Byte range of the first occurrence within `line_content`, when known
    pub span: Option<Range<usize>>,
}

impl Match {
    /// The matched slice of the line
    pub fn matched_text(&self) -> Option<&str> {
        self.span
            .as_ref()
            .and_then(|span| self.line_content.get(span.clone()))
    }

    /// Context lines preceding the match
    pub fn context_before(&self) -> impl Iterator<Item = &ContextLine> {
        self.context
            .iter()
            .filter(move |c| c.line_number < self.line_number)
    }

    /// Context lines following the match
    pub fn context_after(&self) -> impl Iterator<Item = &ContextLine> {
        self.context
            .iter()
            .filter(move |c| c.line_number > self.line_number)
    }

    /// Context texts in file order
    pub fn context_texts(&self) -> Vec<&str> {
        self.context.iter().map(|c| c.text.as_str()).collect()
    }
}

/// Represents all matches found in a single file
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    /// The path to the file
    pub path: PathBuf,
    /// All matches found in the file, in line order
    pub matches: Vec<Match>,
}

/// Represents the complete outcome of one search call
#[derive(Debug, Default, Serialize)]
pub struct SearchOutput {
    /// Matches in the order they were aggregated. Ascending by line within a
    /// file; no ordering across files.
    pub matches: Vec<Match>,
    /// Per-file and per-directory problems that were skipped
    #[serde(serialize_with = "serialize_errors")]
    pub errors: Vec<SearchError>,
    /// Number of files that were scanned (or looked up in the index)
    pub files_searched: usize,
    /// Whether the result cap was reached and production stopped early
    pub cap_reached: bool,
    /// Whether the in-memory content index answered the query
    pub used_index: bool,
}

fn serialize_errors<S>(errors: &[SearchError], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(errors.iter().map(|e| e.to_string()))
}

impl SearchOutput {
    /// Creates a new empty search output
    pub fn new() -> Self {
        Default::default()
    }

    /// Total number of matches found
    pub fn total_matches(&self) -> usize {
        self.matches.len()
    }

    /// Number of distinct files with at least one match
    pub fn files_with_matches(&self) -> usize {
        let mut paths: Vec<&Path> = self.matches.iter().map(|m| m.path.as_path()).collect();
        paths.sort_unstable();
        paths.dedup();
        paths.len()
    }

    /// Number of files or directory entries that could not be searched
    pub fn skipped_files(&self) -> usize {
        self.errors.len()
    }

    /// True when results were produced but some items were skipped
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Groups matches by file. Files appear in the order of their first
    /// match and keep their matches in line order.
    pub fn file_results(&self) -> Vec<FileResult> {
        let mut positions: HashMap<&Path, usize> = HashMap::new();
        let mut results: Vec<FileResult> = Vec::new();
        for m in &self.matches {
            let slot = *positions.entry(m.path.as_path()).or_insert_with(|| {
                results.push(FileResult {
                    path: m.path.clone(),
                    matches: Vec::new(),
                });
                results.len() - 1
            });
            results[slot].matches.push(m.clone());
        }
        for result in &mut results {
            result.matches.sort_by_key(|m| m.line_number);
        }
        results
    }
}
