//! Process-wide conversation counters.
//!
//! Incremented at the call site without logging anything above `trace`.
//! [`Metrics::flush`] reports every value in one `info!` event, typically once
//! a conversation has finished.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Atomic counters shared by every conversation in the process.
pub struct Metrics {
    turns_completed: AtomicU64,
    model_selections: AtomicU64,
    checkpoints_written: AtomicU64,
    checkpoint_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            turns_completed: AtomicU64::new(0),
            model_selections: AtomicU64::new(0),
            checkpoints_written: AtomicU64::new(0),
            checkpoint_failures: AtomicU64::new(0),
        }
    }

    /// Increment the turns-completed counter by one.
    pub fn inc_turns(&self) {
        self.turns_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "turns_completed", "counter incremented");
    }

    /// Increment the model-selections counter by one.
    ///
    /// Only selections that consulted the selection model are counted.
    pub fn inc_model_selections(&self) {
        self.model_selections.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "model_selections", "counter incremented");
    }

    /// Increment the checkpoints-written counter by one.
    pub fn inc_checkpoints(&self) {
        self.checkpoints_written.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "checkpoints_written", "counter incremented");
    }

    /// Increment the checkpoint-failures counter by one.
    pub fn inc_checkpoint_failures(&self) {
        self.checkpoint_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "checkpoint_failures", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            turns_completed = self.turns_completed(),
            model_selections = self.model_selections(),
            checkpoints_written = self.checkpoints_written(),
            checkpoint_failures = self.checkpoint_failures(),
        );
    }

    /// Read the current turns-completed count.
    pub fn turns_completed(&self) -> u64 {
        self.turns_completed.load(Ordering::Relaxed)
    }

    /// Read the current model-selections count.
    pub fn model_selections(&self) -> u64 {
        self.model_selections.load(Ordering::Relaxed)
    }

    /// Read the current checkpoints-written count.
    pub fn checkpoints_written(&self) -> u64 {
        self.checkpoints_written.load(Ordering::Relaxed)
    }

    /// Read the current checkpoint-failures count.
    pub fn checkpoint_failures(&self) -> u64 {
        self.checkpoint_failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_independent() {
        let m = Metrics::new();
        m.inc_turns();
        m.inc_turns();
        m.inc_model_selections();
        m.inc_checkpoint_failures();

        assert_eq!(m.turns_completed(), 2);
        assert_eq!(m.model_selections(), 1);
        assert_eq!(m.checkpoints_written(), 0);
        assert_eq!(m.checkpoint_failures(), 1);
    }
}
