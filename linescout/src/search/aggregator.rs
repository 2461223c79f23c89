//! Shared sinks written by the scanning workers.
//!
//! [`ResultAggregator`] keeps the one ordered result vector of a search call.
//! The append and the comparison against the cap happen under the same lock,
//! and the lock is never held while a file is read or a line is matched.
//! The `cap_reached` flag mirrors the outcome of the last comparison so the
//! walker and idle workers can poll it without taking the lock; that read is
//! advisory only.
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use crate::errors::SearchError;
use crate::results::Match;

#[derive(Debug)]
pub struct ResultAggregator {
    matches: Mutex<Vec<Match>>,
    max_results: usize,
    cap_reached: AtomicBool,
}

impl ResultAggregator {
    pub fn new(max_results: usize) -> Self {
        Self {
            matches: Mutex::new(Vec::new()),
            max_results,
            cap_reached: AtomicBool::new(false),
        }
    }

    /// Appends one match and reports whether the cap is now reached.
    ///
    /// Appends are never refused: a worker that was already scanning when the
    /// cap tripped lands its pending match and then stops, so the final count
    /// can exceed the cap by at most one match per other worker.
    pub fn push(&self, m: Match) -> bool {
        let mut matches = self.matches.lock();
        matches.push(m);
        let reached = matches.len() >= self.max_results;
        if reached && !self.cap_reached.swap(true, Ordering::AcqRel) {
            debug!("Result cap of {} reached", self.max_results);
        }
        reached
    }

    /// Lock-free view of the cap state
    pub fn is_cap_reached(&self) -> bool {
        self.cap_reached.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.matches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_matches(self) -> Vec<Match> {
        self.matches.into_inner()
    }
}

/// Collects per-file and per-directory errors without interrupting a search
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Mutex<Vec<SearchError>>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, error: SearchError) {
        debug!("Skipping: {}", error);
        self.errors.lock().push(error);
    }

    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_errors(self) -> Vec<SearchError> {
        self.errors.into_inner()
    }
}
