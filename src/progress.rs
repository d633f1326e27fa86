// src/progress.rs
/// Lightweight progress reporting used by long-running operations (apply/verify).
/// Front ends implement this to surface status to users.
pub trait Progress {
    /// Called at the start with the total number of items.
    fn begin(&mut self, _total: usize) {}

    /// Free-form status line for human eyes.
    fn log(&mut self, _msg: &str) {}

    /// One page write landed.
    fn item_done(&mut self, _what: &str) {}

    /// One page write failed; siblings carry on.
    fn item_failed(&mut self, _what: &str, _reason: &str) {}

    /// Called at the end, successful or not.
    fn finish(&mut self) {}
}

/// A no-op progress sink.
pub struct NullProgress;
impl Progress for NullProgress {}

/// Counts calls; handy in tests.
#[derive(Debug, Default)]
pub struct CountingProgress {
    pub total: usize,
    pub done: usize,
    pub failed: usize,
    pub finished: bool,
}

impl Progress for CountingProgress {
    fn begin(&mut self, total: usize) {
        self.total = total;
    }

    fn item_done(&mut self, _what: &str) {
        self.done += 1;
    }

    fn item_failed(&mut self, _what: &str, _reason: &str) {
        self.failed += 1;
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}
