//! Progress reporting for load runs.
//!
//! Long fetches report through [`ProgressCallback`] instead of yielding to
//! a host event loop. The host decides how to render it: the CLI drives an
//! `indicatif` bar, tests pass [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from the pagination and geometry stages.
///
/// The total is set again at the start of each stage: records for event
/// paging, spatial units for the geometry batches.
pub trait ProgressCallback: Send + Sync {
    /// Sets the expected units of work for the current stage.
    fn set_total(&self, total: u64);

    /// Sets the absolute position within the current stage.
    fn set_position(&self, pos: u64);

    /// Advances by `delta` units.
    fn inc(&self, delta: u64);

    /// Describes the current stage.
    fn set_message(&self, msg: String);

    /// Ends the run with the final status message.
    fn finish(&self, msg: String);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn set_position(&self, _pos: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
