/// Concurrent line search over a set of directory roots.
///
/// # Pipeline
///
/// A search call runs three stages connected by a bounded queue:
///
/// 1. **Walker**: a single producer thread traverses the roots with the
///    `ignore` crate's walker, applies the depth limit and include globs, and
///    pushes candidate paths into the queue. The bounded queue gives the walk
///    back-pressure when the workers fall behind.
/// 2. **Workers**: `worker_count` threads from a dedicated Rayon pool pull
///    paths, read each file (whole-file read, buffered read or memory map
///    depending on size) and match every line against one shared
///    [`PatternMatcher`].
/// 3. **Aggregator**: matches land in a single mutex-guarded vector. Each
///    append reports whether the result cap is reached, which stops the
///    pushing worker and, through an atomic flag, the walker and the other
///    workers.
///
/// ```rust,ignore
/// let options = SearchOptions::new("TODO", ["src"]).include("*.rs").context(1);
/// let output = search(&options)?;
/// for file in output.file_results() {
///     println!("{}: {} matches", file.path.display(), file.matches.len());
/// }
/// ```
///
/// # Index Fast Path
///
/// When the options carry a [`ContentIndex`](crate::index::ContentIndex) the
/// filesystem is never touched. The engine waits for any in-flight rebuild,
/// takes a snapshot and emits matches for the indexed files that pass the
/// same depth and name rules the walker applies. Both paths share
/// [`processor::FileProcessor`], so a match found through the index is
/// identical to the one a disk scan of the same contents would produce.
///
/// # Error Handling
///
/// Problems that make the whole call meaningless are returned as `Err`:
/// ```rust,ignore
/// match search(&options) {
///     Err(SearchError::InvalidPattern(p)) => eprintln!("bad pattern: {}", p),
///     Err(e) => eprintln!("search failed: {}", e),
///     Ok(output) if output.is_partial() => eprintln!("{} skipped", output.skipped_files()),
///     Ok(_) => {}
/// }
/// ```
/// A file that cannot be opened or decoded is only recorded in the output.
pub mod aggregator;
pub mod engine;
pub mod matcher;
pub mod processor;
pub mod walker;

pub use aggregator::{ErrorCollector, ResultAggregator};
pub use engine::search;
pub use matcher::{MatchStrategy, PatternMatcher};
pub use processor::FileProcessor;
pub use walker::DirectoryWalker;
