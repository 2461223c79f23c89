use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::ops::{ControlFlow, Range};
use std::path::Path;
use tracing::{debug, trace, warn};

use super::aggregator::ResultAggregator;
use super::matcher::PatternMatcher;
use crate::config::EncodingMode;
use crate::errors::{SearchError, SearchResult};
use crate::metrics::SearchMetrics;
use crate::results::{ContextLine, Match};

// Constants for file processing
const BUFFER_CAPACITY: usize = 65536;
pub(crate) const SMALL_FILE_THRESHOLD: u64 = 32 * 1024; // 32KB
pub(crate) const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024; // 10MB

/// Decodes file bytes according to the encoding mode
pub(crate) fn decode_bytes(
    bytes: &[u8],
    path: &Path,
    encoding_mode: EncodingMode,
) -> SearchResult<String> {
    match encoding_mode {
        EncodingMode::FailFast => match std::str::from_utf8(bytes) {
            Ok(valid) => Ok(valid.to_owned()),
            // Only the error path pays for the second copy
            Err(_) => match String::from_utf8(bytes.to_vec()) {
                Ok(s) => Ok(s),
                Err(e) => Err(SearchError::encoding_error(path, e)),
            },
        },
        EncodingMode::Lossy => {
            let cow = String::from_utf8_lossy(bytes);
            if let std::borrow::Cow::Owned(_) = cow {
                warn!("Invalid UTF-8 replaced in file: {}", path.display());
            }
            Ok(cow.into_owned())
        }
    }
}

/// Reads a whole file, choosing the strategy by size, and returns the
/// decoded text with the number of bytes read
pub(crate) fn read_file(path: &Path, encoding_mode: EncodingMode) -> SearchResult<(String, u64)> {
    let size = match path.metadata() {
        Ok(metadata) => Some(metadata.len()),
        Err(e) => {
            debug!("Failed to get metadata for {}: {}", path.display(), e);
            None
        }
    };

    let bytes = match size {
        Some(size) if size < SMALL_FILE_THRESHOLD => {
            trace!("Reading small file in one call: {}", path.display());
            std::fs::read(path).map_err(|e| SearchError::from_io(path, e))?
        }
        Some(size) if size >= LARGE_FILE_THRESHOLD => {
            trace!("Memory mapping large file: {}", path.display());
            let file = File::open(path).map_err(|e| SearchError::from_io(path, e))?;
            // The map lives only for the copy below; a concurrent truncation
            // surfaces as an I/O error rather than a stale read.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| SearchError::from_io(path, e))?;
            let contents = decode_bytes(&mmap, path, encoding_mode)?;
            return Ok((contents, mmap.len() as u64));
        }
        _ => {
            let file = File::open(path).map_err(|e| SearchError::from_io(path, e))?;
            let mut reader = BufReader::with_capacity(BUFFER_CAPACITY, file);
            let mut bytes = Vec::new();
            reader
                .read_to_end(&mut bytes)
                .map_err(|e| SearchError::from_io(path, e))?;
            bytes
        }
    };

    let contents = decode_bytes(&bytes, path, encoding_mode)?;
    Ok((contents, bytes.len() as u64))
}

/// Builds the match for `lines[index]` with its clipped context window
pub(crate) fn build_match<L: AsRef<str>>(
    path: &Path,
    lines: &[L],
    index: usize,
    span: Range<usize>,
    context_lines: usize,
) -> Match {
    let first = index.saturating_sub(context_lines);
    let last = index.saturating_add(context_lines).min(lines.len() - 1);
    let context = (first..=last)
        .filter(|&i| i != index)
        .map(|i| ContextLine {
            line_number: i + 1,
            text: lines[i].as_ref().to_string(),
        })
        .collect();

    Match {
        path: path.to_path_buf(),
        line_number: index + 1,
        line_content: lines[index].as_ref().to_string(),
        context,
        span: Some(span),
    }
}

/// Scans files line by line and emits one match per matching line
#[derive(Debug)]
pub struct FileProcessor {
    matcher: PatternMatcher,
    metrics: SearchMetrics,
    context_lines: usize,
    encoding_mode: EncodingMode,
}

impl FileProcessor {
    pub fn new(matcher: PatternMatcher, context_lines: usize, encoding_mode: EncodingMode) -> Self {
        Self {
            matcher,
            metrics: SearchMetrics::new(),
            context_lines,
            encoding_mode,
        }
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    pub fn metrics(&self) -> &SearchMetrics {
        &self.metrics
    }

    /// Scans one file and pushes its matches into the aggregator, stopping
    /// after the first match that brings the aggregator to its cap.
    /// Returns the number of matches pushed.
    pub fn scan_file(&self, path: &Path, aggregator: &ResultAggregator) -> SearchResult<usize> {
        trace!("Processing file: {}", path.display());
        let (contents, size) = read_file(path, self.encoding_mode)?;
        self.metrics.record_file_read(size);

        let lines: Vec<&str> = contents.lines().collect();
        Ok(self.scan_lines(path, &lines, |m| {
            if aggregator.push(m) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }))
    }

    /// Applies the matcher to every line and hands each match to `sink`
    /// until it breaks. Returns the number of matches handed over.
    pub fn scan_lines<L, F>(&self, path: &Path, lines: &[L], mut sink: F) -> usize
    where
        L: AsRef<str>,
        F: FnMut(Match) -> ControlFlow<()>,
    {
        let mut emitted = 0;
        for (index, line) in lines.iter().enumerate() {
            let Some(span) = self.matcher.find(line.as_ref()) else {
                continue;
            };
            trace!("Found match at {}:{}", path.display(), index + 1);
            emitted += 1;
            if sink(build_match(path, lines, index, span, self.context_lines)).is_break() {
                break;
            }
        }
        emitted
    }

    /// Emits matches for lines already known to match, as reported by the
    /// content index. Lines the matcher rejects are skipped.
    pub fn emit_indexed<L: AsRef<str>>(
        &self,
        path: &Path,
        lines: &[L],
        line_indices: &[usize],
        aggregator: &ResultAggregator,
    ) -> usize {
        let mut emitted = 0;
        for &index in line_indices {
            let Some(span) = lines
                .get(index)
                .and_then(|line| self.matcher.find(line.as_ref()))
            else {
                continue;
            };
            emitted += 1;
            if aggregator.push(build_match(path, lines, index, span, self.context_lines)) {
                break;
            }
        }
        emitted
    }
}
