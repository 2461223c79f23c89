//! In-memory content index.
//!
//! The index maps each file path to its decoded lines so repeated queries can
//! run without touching the disk. Population happens in bulk
//! ([`ContentIndex::rebuild`], optionally on a background thread) or per file;
//! either way readers work on an immutable [`IndexSnapshot`], so a query
//! never observes a half-built map. Searches that must see a complete index
//! call [`ContentIndex::wait_until_ready`] first.
mod gate;

pub use gate::{BuildGuard, ReadyGate};

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::{EncodingMode, SearchOptions, DEFAULT_MAX_DEPTH};
use crate::errors::{SearchError, SearchResult};
use crate::filters::NameFilter;
use crate::search::aggregator::ErrorCollector;
use crate::search::matcher::PatternMatcher;
use crate::search::processor::read_file;
use crate::search::walker::{validate_roots, DirectoryWalker};

/// Files above this size are left out of the index
pub const DEFAULT_MAX_INDEXED_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// One file held in memory
#[derive(Debug, Clone, Serialize)]
pub struct IndexedFile {
    pub path: PathBuf,
    pub lines: Vec<String>,
    /// Size of the decoded text in bytes
    pub size: u64,
    /// Extension without the leading dot
    pub extension: Option<String>,
}

impl IndexedFile {
    pub fn new(path: impl Into<PathBuf>, contents: &str) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned());
        Self {
            lines: contents.lines().map(str::to_string).collect(),
            size: contents.len() as u64,
            extension,
            path,
        }
    }

    /// Reads and decodes a file from disk
    pub fn load(path: &Path, encoding_mode: EncodingMode) -> SearchResult<Self> {
        let (contents, _) = read_file(path, encoding_mode)?;
        Ok(Self::new(path, &contents))
    }
}

/// Matching lines of one indexed file, as 0-based indices in ascending order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexHit {
    pub path: PathBuf,
    pub line_indices: Vec<usize>,
}

/// What a bulk rebuild walks and loads
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub roots: Vec<PathBuf>,
    pub max_depth: usize,
    pub include_patterns: Vec<String>,
    pub max_file_size: u64,
    pub encoding_mode: EncodingMode,
    pub respect_ignore_files: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            roots: vec![PathBuf::from(".")],
            max_depth: DEFAULT_MAX_DEPTH,
            include_patterns: Vec::new(),
            max_file_size: DEFAULT_MAX_INDEXED_FILE_SIZE,
            encoding_mode: EncodingMode::default(),
            respect_ignore_files: false,
        }
    }
}

impl From<&SearchOptions> for IndexOptions {
    fn from(options: &SearchOptions) -> Self {
        Self {
            roots: options.roots.clone(),
            max_depth: options.max_depth,
            include_patterns: options.include_patterns.clone(),
            encoding_mode: options.encoding_mode,
            respect_ignore_files: options.respect_ignore_files,
            ..Default::default()
        }
    }
}

/// Summary of one bulk rebuild
#[derive(Debug)]
pub struct IndexStats {
    pub files_indexed: usize,
    pub bytes_indexed: u64,
    /// Files and directory entries that could not be loaded
    pub errors: Vec<SearchError>,
    pub elapsed: Duration,
}

type FileMap = HashMap<PathBuf, IndexedFile>;

/// Immutable point-in-time view of the index
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    files: Arc<FileMap>,
}

impl IndexSnapshot {
    pub fn get(&self, path: &Path) -> Option<&IndexedFile> {
        self.files.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Finds every matching line of every file, ordered by path
    pub fn search_content(&self, matcher: &PatternMatcher) -> Vec<IndexHit> {
        let mut hits: Vec<IndexHit> = self
            .files
            .par_iter()
            .filter_map(|(path, file)| {
                let line_indices: Vec<usize> = file
                    .lines
                    .iter()
                    .enumerate()
                    .filter(|(_, line)| matcher.is_match(line))
                    .map(|(i, _)| i)
                    .collect();
                (!line_indices.is_empty()).then(|| IndexHit {
                    path: path.clone(),
                    line_indices,
                })
            })
            .collect();
        hits.sort_unstable_by(|a, b| a.path.cmp(&b.path));
        hits
    }
}

#[derive(Debug, Default)]
pub struct ContentIndex {
    files: RwLock<Arc<FileMap>>,
    gate: ReadyGate,
}

impl ContentIndex {
    /// Creates an empty index that is immediately ready
    pub fn new() -> Self {
        Self::default()
    }

    /// Walks `options.roots` and replaces the whole index with what it finds.
    /// Readers keep their previous snapshot until the swap.
    pub fn rebuild(&self, options: &IndexOptions) -> SearchResult<IndexStats> {
        let _guard = self.gate.begin();
        self.populate(options)
    }

    /// Starts [`rebuild`](Self::rebuild) on a background thread. The index
    /// counts as busy from the moment this returns.
    pub fn spawn_rebuild(
        self: &Arc<Self>,
        options: IndexOptions,
    ) -> io::Result<JoinHandle<SearchResult<IndexStats>>> {
        self.gate.reserve();
        let index = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("linescout-indexer".to_string())
            .spawn(move || {
                let _guard = index.gate.adopt();
                index.populate(&options)
            });
        if spawned.is_err() {
            drop(self.gate.adopt());
        }
        spawned
    }

    fn populate(&self, options: &IndexOptions) -> SearchResult<IndexStats> {
        let start = Instant::now();
        let names = NameFilter::new(&options.include_patterns)?;
        validate_roots(&options.roots)?;

        let errors = ErrorCollector::new();
        let walker = DirectoryWalker::new(&options.roots, options.max_depth, names)
            .respect_ignore_files(options.respect_ignore_files);
        let paths: Vec<PathBuf> = walker.candidates(&errors).collect();
        debug!("Indexing {} candidate files", paths.len());

        let loaded: Vec<IndexedFile> = paths
            .par_iter()
            .filter_map(|path| {
                match path.metadata() {
                    Ok(metadata) if metadata.len() > options.max_file_size => {
                        debug!("Not indexing large file: {}", path.display());
                        return None;
                    }
                    _ => {}
                }
                match IndexedFile::load(path, options.encoding_mode) {
                    Ok(file) => Some(file),
                    Err(e) => {
                        errors.record(e);
                        None
                    }
                }
            })
            .collect();

        let bytes_indexed = loaded.iter().map(|f| f.size).sum();
        let files: FileMap = loaded.into_iter().map(|f| (f.path.clone(), f)).collect();
        let files_indexed = files.len();
        *self.files.write() = Arc::new(files);

        let stats = IndexStats {
            files_indexed,
            bytes_indexed,
            errors: errors.into_errors(),
            elapsed: start.elapsed(),
        };
        info!(
            "Indexed {} files ({} bytes) in {:?}, {} skipped",
            stats.files_indexed,
            stats.bytes_indexed,
            stats.elapsed,
            stats.errors.len()
        );
        Ok(stats)
    }

    /// Blocks until no rebuild is in flight
    pub fn wait_until_ready(&self) {
        self.gate.wait();
    }

    /// Blocks for at most `timeout`; true when the index is ready
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.gate.wait_timeout(timeout)
    }

    pub fn is_indexing(&self) -> bool {
        self.gate.is_busy()
    }

    /// Current contents; unaffected by later updates
    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            files: Arc::clone(&self.files.read()),
        }
    }

    /// Adds or replaces one file
    pub fn insert(&self, file: IndexedFile) {
        let mut files = self.files.write();
        Arc::make_mut(&mut files).insert(file.path.clone(), file);
    }

    /// Loads `path` from disk and adds or replaces it
    pub fn index_file(&self, path: &Path, encoding_mode: EncodingMode) -> SearchResult<()> {
        let file = IndexedFile::load(path, encoding_mode)?;
        self.insert(file);
        Ok(())
    }

    /// Drops one file; returns whether it was present
    pub fn remove_file(&self, path: &Path) -> bool {
        let mut files = self.files.write();
        if !files.contains_key(path) {
            return false;
        }
        Arc::make_mut(&mut files).remove(path).is_some()
    }

    /// Copy of one entry
    pub fn get(&self, path: &Path) -> Option<IndexedFile> {
        self.files.read().get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Searches the current snapshot
    pub fn search_content(&self, matcher: &PatternMatcher) -> Vec<IndexHit> {
        self.snapshot().search_content(matcher)
    }

    /// Compiles `pattern` and searches the current snapshot
    pub fn search_pattern(
        &self,
        pattern: &str,
        is_regex: bool,
        case_sensitive: bool,
    ) -> SearchResult<Vec<IndexHit>> {
        let matcher = PatternMatcher::new(pattern, is_regex, case_sensitive)?;
        Ok(self.search_content(&matcher))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_indexed_file_metadata() {
        let file = IndexedFile::new("src/lib.rs", "fn a() {}\nfn b() {}\n");
        assert_eq!(file.lines, vec!["fn a() {}", "fn b() {}"]);
        assert_eq!(file.size, 20);
        assert_eq!(file.extension.as_deref(), Some("rs"));
    }

    #[test]
    fn test_search_content_orders_by_path() {
        let index = ContentIndex::new();
        index.insert(IndexedFile::new("b.txt", "foo\nbar\nfoo"));
        index.insert(IndexedFile::new("a.txt", "xfoo"));
        index.insert(IndexedFile::new("c.txt", "nothing"));

        let hits = index.search_pattern("foo", false, true).unwrap();
        assert_eq!(
            hits,
            vec![
                IndexHit {
                    path: PathBuf::from("a.txt"),
                    line_indices: vec![0],
                },
                IndexHit {
                    path: PathBuf::from("b.txt"),
                    line_indices: vec![0, 2],
                },
            ]
        );
    }

    #[test]
    fn test_search_pattern_case_and_regex() {
        let index = ContentIndex::new();
        index.insert(IndexedFile::new("a.txt", "Foo\nfoo\nbar"));

        assert_eq!(index.search_pattern("FOO", false, false).unwrap()[0].line_indices, vec![0, 1]);
        assert_eq!(index.search_pattern("^b", true, true).unwrap()[0].line_indices, vec![2]);
        assert!(index.search_pattern("(", true, true).is_err());
    }

    #[test]
    fn test_snapshot_is_point_in_time() {
        let index = ContentIndex::new();
        index.insert(IndexedFile::new("a.txt", "foo"));
        let snapshot = index.snapshot();

        index.insert(IndexedFile::new("b.txt", "foo"));
        assert!(index.remove_file(Path::new("a.txt")));
        assert!(!index.remove_file(Path::new("a.txt")));

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get(Path::new("a.txt")).is_some());
        assert_eq!(index.len(), 1);
        assert!(index.snapshot().get(Path::new("b.txt")).is_some());
    }

    #[test]
    fn test_rebuild_from_disk() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), "foo\nbar").unwrap();
        fs::write(dir.path().join("sub/b.rs"), "foo").unwrap();
        fs::write(dir.path().join("bad.bin"), b"\xff\xfe").unwrap();

        let index = ContentIndex::new();
        let stats = index
            .rebuild(&IndexOptions {
                roots: vec![dir.path().to_path_buf()],
                ..Default::default()
            })
            .unwrap();

        assert_eq!(stats.files_indexed, 2);
        assert_eq!(stats.errors.len(), 1);
        assert!(matches!(stats.errors[0], SearchError::EncodingError { .. }));
        assert_eq!(index.len(), 2);
        assert!(!index.is_indexing());

        let file = index.snapshot();
        let file = file.get(&dir.path().join("a.txt")).unwrap();
        assert_eq!(file.lines, vec!["foo", "bar"]);
    }

    #[test]
    fn test_rebuild_respects_filters() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), "foo").unwrap();
        fs::write(dir.path().join("b.rs"), "foo").unwrap();
        fs::write(dir.path().join("sub/c.rs"), "foo").unwrap();

        let index = ContentIndex::new();
        index
            .rebuild(&IndexOptions {
                roots: vec![dir.path().to_path_buf()],
                max_depth: 0,
                include_patterns: vec!["*.rs".to_string()],
                ..Default::default()
            })
            .unwrap();

        let snapshot = index.snapshot();
        let paths: Vec<PathBuf> = snapshot.paths().map(Path::to_path_buf).collect();
        assert_eq!(paths, vec![dir.path().join("b.rs")]);
    }

    #[test]
    fn test_rebuild_missing_root_fails() {
        let dir = tempdir().unwrap();
        let index = ContentIndex::new();
        let err = index
            .rebuild(&IndexOptions {
                roots: vec![dir.path().join("missing")],
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, SearchError::RootInaccessible { .. }));
        assert!(!index.is_indexing());
    }

    #[test]
    fn test_spawn_rebuild_and_wait() {
        let dir = tempdir().unwrap();
        for i in 0..20 {
            fs::write(dir.path().join(format!("f{}.txt", i)), "foo\n").unwrap();
        }

        let index = Arc::new(ContentIndex::new());
        let handle = index
            .spawn_rebuild(IndexOptions {
                roots: vec![dir.path().to_path_buf()],
                ..Default::default()
            })
            .unwrap();

        index.wait_until_ready();
        assert_eq!(index.len(), 20);
        assert_eq!(handle.join().unwrap().unwrap().files_indexed, 20);
        assert!(index.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn test_index_file_updates_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "old").unwrap();

        let index = ContentIndex::new();
        index.index_file(&path, EncodingMode::FailFast).unwrap();
        fs::write(&path, "new\nlines").unwrap();
        index.index_file(&path, EncodingMode::FailFast).unwrap();

        assert_eq!(index.get(&path).unwrap().lines, vec!["new", "lines"]);
        assert!(index
            .index_file(&dir.path().join("missing.txt"), EncodingMode::FailFast)
            .is_err());
    }
}
