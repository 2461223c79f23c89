use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// Tracks in-flight index builds and lets readers block until none remain.
#[derive(Debug, Default)]
pub struct ReadyGate {
    in_flight: Mutex<usize>,
    idle: Condvar,
}

impl ReadyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a build as started. The gate reopens when the returned guard
    /// drops, including during unwinding.
    pub fn begin(&self) -> BuildGuard<'_> {
        self.reserve();
        self.adopt()
    }

    /// Closes the gate without a guard. The reservation must later be handed
    /// to [`adopt`](Self::adopt) (or released) by whoever does the work.
    pub(crate) fn reserve(&self) {
        *self.in_flight.lock() += 1;
    }

    /// Takes ownership of an earlier [`reserve`](Self::reserve)
    pub(crate) fn adopt(&self) -> BuildGuard<'_> {
        BuildGuard { gate: self }
    }

    pub fn is_busy(&self) -> bool {
        *self.in_flight.lock() > 0
    }

    /// Blocks until no build is in flight
    pub fn wait(&self) {
        let mut in_flight = self.in_flight.lock();
        while *in_flight > 0 {
            self.idle.wait(&mut in_flight);
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`. Returns true
    /// when the gate is open.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut in_flight = self.in_flight.lock();
        if *in_flight == 0 {
            return true;
        }
        let _ = self
            .idle
            .wait_while_for(&mut in_flight, |n| *n > 0, timeout);
        *in_flight == 0
    }

    fn finish(&self) {
        let mut in_flight = self.in_flight.lock();
        *in_flight = in_flight.saturating_sub(1);
        if *in_flight == 0 {
            self.idle.notify_all();
        }
    }
}

/// Keeps the gate closed while alive
#[derive(Debug)]
pub struct BuildGuard<'a> {
    gate: &'a ReadyGate,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.gate.finish();
    }
}
