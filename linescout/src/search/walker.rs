use ignore::{DirEntry, WalkBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use super::aggregator::ErrorCollector;
use crate::errors::{SearchError, SearchResult};
use crate::filters::NameFilter;

/// Yields candidate files below a set of roots.
///
/// Depth counts the directories between a root and a file, so files directly
/// in a root are at depth 0 and directories below `max_depth` are never
/// entered. Symlinks are not traversed as directories; a link to a file is
/// yielded under the link's own path and a dangling link is reported.
#[derive(Debug, Clone)]
pub struct DirectoryWalker {
    roots: Vec<PathBuf>,
    max_depth: usize,
    names: NameFilter,
    respect_ignore_files: bool,
}

impl DirectoryWalker {
    pub fn new(roots: &[PathBuf], max_depth: usize, names: NameFilter) -> Self {
        Self {
            roots: roots.to_vec(),
            max_depth,
            names,
            respect_ignore_files: false,
        }
    }

    /// Honor .gitignore, .ignore and hidden-file rules
    pub fn respect_ignore_files(mut self, yes: bool) -> Self {
        self.respect_ignore_files = yes;
        self
    }

    /// Lazily walks every root in order. Entries that cannot be read are
    /// recorded in `errors` and skipped; traversal of their siblings goes on.
    pub fn candidates<'a>(
        &'a self,
        errors: &'a ErrorCollector,
    ) -> impl Iterator<Item = PathBuf> + 'a {
        self.roots.iter().flat_map(move |root| {
            debug!("Walking {} (max depth {})", root.display(), self.max_depth);
            self.builder(root)
                .build()
                .filter_map(move |entry| match entry {
                    Ok(entry) => self.candidate(entry, errors),
                    Err(err) => {
                        errors.record(SearchError::from_walk(err));
                        None
                    }
                })
        })
    }

    fn builder(&self, root: &Path) -> WalkBuilder {
        let mut builder = WalkBuilder::new(root);
        builder
            .standard_filters(self.respect_ignore_files)
            .require_git(false)
            .follow_links(false)
            // The walker counts the root itself as depth 0
            .max_depth(Some(self.max_depth.saturating_add(1)));
        builder
    }

    fn candidate(&self, entry: DirEntry, errors: &ErrorCollector) -> Option<PathBuf> {
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            return None;
        }
        if !self.names.matches(entry.path()) {
            return None;
        }
        if file_type.is_symlink() {
            match fs::metadata(entry.path()) {
                Ok(target) if target.is_file() => {}
                Ok(_) => return None,
                Err(e) => {
                    errors.record(SearchError::WalkError {
                        path: Some(entry.into_path()),
                        message: format!("broken symbolic link: {}", e),
                    });
                    return None;
                }
            }
        } else if !file_type.is_file() {
            return None;
        }
        trace!("Candidate: {}", entry.path().display());
        Some(entry.into_path())
    }
}

/// Fails when a root cannot be inspected at all; such a search never starts
pub fn validate_roots(roots: &[PathBuf]) -> SearchResult<()> {
    for root in roots {
        let metadata =
            fs::metadata(root).map_err(|e| SearchError::root_inaccessible(root.clone(), e))?;
        if metadata.is_dir() {
            fs::read_dir(root).map_err(|e| SearchError::root_inaccessible(root.clone(), e))?;
        }
    }
    Ok(())
}
