use crossbeam_channel::{bounded, Receiver, Sender};
use rayon::ThreadPoolBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

use super::aggregator::{ErrorCollector, ResultAggregator};
use super::matcher::PatternMatcher;
use super::processor::FileProcessor;
use super::walker::{validate_roots, DirectoryWalker};
use crate::config::SearchOptions;
use crate::errors::{SearchError, SearchResult};
use crate::filters::{CandidateFilter, NameFilter};
use crate::index::ContentIndex;
use crate::metrics::SearchMetrics;
use crate::results::SearchOutput;

/// Paths buffered between the walker and the workers
const QUEUE_CAPACITY: usize = 256;

/// Runs one search call.
///
/// Setup problems (bad pattern, bad include glob, inaccessible root) fail the
/// whole call. Anything that goes wrong with a single file or directory is
/// recorded in [`SearchOutput::errors`] and the search goes on.
pub fn search(options: &SearchOptions) -> SearchResult<SearchOutput> {
    let options = options.clone().normalized();
    info!(
        "Starting search for {:?} in {:?}",
        options.pattern, options.roots
    );

    let index = match (&options.index, options.use_index) {
        (Some(index), true) => Some(index),
        (None, true) => {
            warn!("Index search requested but no index was supplied; reading from disk");
            None
        }
        _ => None,
    };
    if index.is_none() {
        validate_roots(&options.roots)?;
    }

    if options.pattern.is_empty() {
        debug!("No search pattern provided, returning empty result");
        return Ok(SearchOutput::new());
    }

    let matcher = PatternMatcher::new(&options.pattern, options.is_regex, options.case_sensitive)?;
    let names = NameFilter::new(&options.include_patterns)?;
    let processor = FileProcessor::new(matcher, options.context_lines, options.encoding_mode);
    let aggregator = ResultAggregator::new(options.max_results);
    let errors = ErrorCollector::new();

    if let Some(index) = index {
        search_index(index, &options, names, &processor, &aggregator);
    } else {
        search_disk(&options, names, &processor, &aggregator, &errors)?;
    }

    let metrics = processor.metrics();
    metrics.log_stats();

    let output = SearchOutput {
        cap_reached: aggregator.is_cap_reached(),
        matches: aggregator.into_matches(),
        errors: errors.into_errors(),
        files_searched: metrics.get_stats().files_scanned as usize,
        used_index: index.is_some(),
    };
    info!(
        "Search complete. Found {} matches in {} files ({} skipped)",
        output.total_matches(),
        output.files_with_matches(),
        output.skipped_files()
    );
    Ok(output)
}

/// Answers the query from memory. Waits for any in-flight rebuild so the
/// index is complete, then visits hits in path order.
fn search_index(
    index: &Arc<ContentIndex>,
    options: &SearchOptions,
    names: NameFilter,
    processor: &FileProcessor,
    aggregator: &ResultAggregator,
) {
    if index.is_indexing() {
        debug!("Waiting for content index to finish building");
    }
    index.wait_until_ready();

    let snapshot = index.snapshot();
    let filter = CandidateFilter::new(&options.roots, options.max_depth, names);
    for _ in snapshot.paths().filter(|p| filter.accepts(p)) {
        processor.metrics().record_indexed_file();
    }

    for hit in snapshot.search_content(processor.matcher()) {
        if aggregator.is_cap_reached() {
            break;
        }
        if !filter.accepts(&hit.path) {
            continue;
        }
        if let Some(file) = snapshot.get(&hit.path) {
            processor.emit_indexed(&hit.path, &file.lines, &hit.line_indices, aggregator);
        }
    }
}

/// Walks the already validated roots on a producer thread and scans the
/// files on a pool of `worker_count` workers fed through a bounded queue
fn search_disk(
    options: &SearchOptions,
    names: NameFilter,
    processor: &FileProcessor,
    aggregator: &ResultAggregator,
    errors: &ErrorCollector,
) -> SearchResult<()> {
    let workers = options.worker_count.get();
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("linescout-worker-{}", i))
        .build()
        .map_err(|e| SearchError::config_error(format!("Failed to start worker pool: {}", e)))?;

    let walker = DirectoryWalker::new(&options.roots, options.max_depth, names)
        .respect_ignore_files(options.respect_ignore_files);
    let (tx, rx) = bounded::<PathBuf>(QUEUE_CAPACITY);
    debug!("Scanning with {} workers", workers);

    thread::scope(|scope| {
        let walker = &walker;
        scope.spawn(move || produce(walker, tx, processor.metrics(), aggregator, errors));

        pool.scope(|s| {
            for _ in 0..workers {
                let rx = rx.clone();
                s.spawn(move |_| drain(rx, processor, aggregator, errors));
            }
        });
    });

    Ok(())
}

/// Feeds candidates to the queue until the walk ends or the cap is reached.
/// Dropping `tx` on return tells the workers no more paths are coming.
fn produce(
    walker: &DirectoryWalker,
    tx: Sender<PathBuf>,
    metrics: &SearchMetrics,
    aggregator: &ResultAggregator,
    errors: &ErrorCollector,
) {
    for path in walker.candidates(errors) {
        if aggregator.is_cap_reached() {
            debug!("Result cap reached, stopping traversal");
            break;
        }
        metrics.record_candidate();
        if tx.send(path).is_err() {
            break;
        }
    }
}

/// Scans queued files until the queue is closed and empty. Once the cap is
/// reached remaining paths are discarded unread.
fn drain(
    rx: Receiver<PathBuf>,
    processor: &FileProcessor,
    aggregator: &ResultAggregator,
    errors: &ErrorCollector,
) {
    for path in rx.iter() {
        if aggregator.is_cap_reached() {
            continue;
        }
        if let Err(e) = processor.scan_file(&path, aggregator) {
            processor.metrics().record_skipped();
            errors.record(e);
        }
    }
}
