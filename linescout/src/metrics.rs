use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::search::processor::{LARGE_FILE_THRESHOLD, SMALL_FILE_THRESHOLD};

/// Counters collected while one search runs. Workers update them without
/// locking; the engine reads a snapshot once every worker has finished.
#[derive(Debug, Default)]
pub struct SearchMetrics {
    candidates_queued: AtomicU64,
    files_scanned: AtomicU64,
    files_skipped: AtomicU64,
    bytes_read: AtomicU64,

    // Read strategy per file size
    small_files: AtomicU64,
    buffered_files: AtomicU64,
    mmap_files: AtomicU64,
}

impl SearchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a path handed to the worker queue
    pub fn record_candidate(&self) {
        self.candidates_queued.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a file read to completion and which strategy read it
    pub fn record_file_read(&self, size: u64) {
        self.files_scanned.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(size, Ordering::Relaxed);
        if size < SMALL_FILE_THRESHOLD {
            self.small_files.fetch_add(1, Ordering::Relaxed);
        } else if size >= LARGE_FILE_THRESHOLD {
            self.mmap_files.fetch_add(1, Ordering::Relaxed);
        } else {
            self.buffered_files.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a file that was looked up in memory instead of read
    pub fn record_indexed_file(&self) {
        self.files_scanned.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a candidate dropped because of a per-file error
    pub fn record_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            candidates_queued: self.candidates_queued.load(Ordering::Relaxed),
            files_scanned: self.files_scanned.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            small_files: self.small_files.load(Ordering::Relaxed),
            buffered_files: self.buffered_files.load(Ordering::Relaxed),
            mmap_files: self.mmap_files.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        debug!(
            "Search stats:\n\
             Candidates queued: {}\n\
             Files scanned/skipped: {}/{}\n\
             Bytes read: {}\n\
             Files read (small/buffered/mmap): {}/{}/{}",
            stats.candidates_queued,
            stats.files_scanned,
            stats.files_skipped,
            stats.bytes_read,
            stats.small_files,
            stats.buffered_files,
            stats.mmap_files
        );
    }
}

/// Point-in-time copy of [`SearchMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub candidates_queued: u64,
    pub files_scanned: u64,
    pub files_skipped: u64,
    pub bytes_read: u64,
    pub small_files: u64,
    pub buffered_files: u64,
    pub mmap_files: u64,
}
