//! Candidate filtering shared by the directory walker and the content index.
//!
//! Both search paths must agree on which files are eligible, so the rules
//! live here rather than in either caller: a file qualifies when its base name
//! matches one of the include globs (or no globs are configured) and it lies
//! no deeper than `max_depth` directories below one of the search roots.
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};

use crate::errors::{SearchError, SearchResult};

const NAME_MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compiled base-name globs
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    patterns: Vec<Pattern>,
}

impl NameFilter {
    /// Compiles the include globs. An invalid glob is a setup error.
    pub fn new(globs: &[String]) -> SearchResult<Self> {
        let patterns = globs
            .iter()
            .map(|g| {
                Pattern::new(g).map_err(|e| {
                    SearchError::config_error(format!("Invalid include pattern '{}': {}", g, e))
                })
            })
            .collect::<SearchResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Checks the file's base name against the globs
    pub fn matches(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        self.patterns
            .iter()
            .any(|p| p.matches_with(&name, NAME_MATCH_OPTIONS))
    }
}

/// Number of directories between `root` and `path`. Files directly inside
/// the root have depth 0. Returns `None` when `path` is not under `root`.
pub fn depth_below(root: &Path, path: &Path) -> Option<usize> {
    let relative = path.strip_prefix(root).ok()?;
    Some(relative.components().count().saturating_sub(1))
}

/// Full eligibility check for a path that did not come from the walker.
///
/// Roots and paths are compared in absolute form, so an index built over
/// "." serves a search rooted at the same directory's absolute path and the
/// other way around.
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    roots: Vec<PathBuf>,
    max_depth: usize,
    names: NameFilter,
    base: Option<PathBuf>,
}

impl CandidateFilter {
    pub fn new(roots: &[PathBuf], max_depth: usize, names: NameFilter) -> Self {
        let base = std::env::current_dir().ok();
        Self {
            roots: roots.iter().map(|r| absolute(base.as_deref(), r)).collect(),
            max_depth,
            names,
            base,
        }
    }

    /// True when `path` sits under some root within the depth limit and its
    /// name passes the include globs
    pub fn accepts(&self, path: &Path) -> bool {
        if !self.names.matches(path) {
            return false;
        }
        let path = absolute(self.base.as_deref(), path);
        self.roots.iter().any(|root| {
            matches!(depth_below(root, &path), Some(d) if d <= self.max_depth) || *root == path
        })
    }
}

/// Joins relative paths onto `base` and drops "." components, so
/// "./src/a.rs", "src/a.rs" and "$PWD/src/a.rs" compare equal
fn absolute(base: Option<&Path>, path: &Path) -> PathBuf {
    let joined = match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    };
    joined
        .components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}
