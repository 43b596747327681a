//! Progress reporting for model training.
//!
//! Cross-validation advances one unit per fold fit; the pipeline advances
//! one unit per step. Whoever drives a run decides how (or whether) the
//! updates are shown.

use std::sync::Arc;

/// Sink for training progress.
///
/// Called from `rayon` worker threads during grid search.
pub trait ProgressCallback: Send + Sync {
    /// Number of units the current phase will report.
    fn set_total(&self, total: u64);

    /// Records `delta` finished units.
    fn inc(&self, delta: u64);

    /// Names what is running now, e.g. the family being tuned.
    fn set_message(&self, msg: String);

    /// Ends the phase with a closing message.
    fn finish(&self, msg: String);
}

/// Ignores all progress.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
