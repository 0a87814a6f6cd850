//! Progress callbacks for long-running mesh operations.
//!
//! Operations that may touch every element of a large mesh several times
//! accept a [`Progress`] and report between their passes.
//!
//! # Example
//!
//! ```
//! use crystmesh::algo::progress::Progress;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let calls = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&calls);
//! let progress = Progress::new(move |_step, _total, _stage| {
//!     counter.fetch_add(1, Ordering::Relaxed);
//! });
//!
//! progress.report(0, 2, "Replicating attributes");
//! progress.finish(2, "Done");
//! assert_eq!(calls.load(Ordering::Relaxed), 2);
//! ```

/// A progress callback.
///
/// The callback receives the index of the stage that is about to run, the
/// total number of stages, and a short description of the stage.
pub struct Progress {
    callback: Box<dyn Fn(usize, usize, &str) + Send + Sync>,
}

impl Progress {
    /// Create a progress reporter from a callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// A reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }

    /// Announce stage `step` of `total`.
    #[inline]
    pub fn report(&self, step: usize, total: usize, stage: &str) {
        (self.callback)(step, total, stage);
    }

    /// Announce that all `total` stages are complete.
    #[inline]
    pub fn finish(&self, total: usize, stage: &str) {
        (self.callback)(total, total, stage);
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}
