//! Progress reporting and cancellation, as seen by a running script.

use std::sync::atomic::{AtomicBool, Ordering};

/// Supplied by whoever drives a simulation. Called between steps only.
pub trait ProgressReporter: Send + Sync {
    /// Fraction of the current run done, in `[0, 1]`.
    fn report_progress(&self, fraction: f64);

    fn report_status(&self, status: &str);

    /// Polled between steps; `true` interrupts the simulation.
    fn stop_requested(&self) -> bool;
}

/// Reports nothing; stops when [`SilentReporter::request_stop`] was called.
#[derive(Debug, Default)]
pub struct SilentReporter {
    stop: AtomicBool,
}

impl SilentReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl ProgressReporter for SilentReporter {
    fn report_progress(&self, _fraction: f64) {}

    fn report_status(&self, _status: &str) {}

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}
