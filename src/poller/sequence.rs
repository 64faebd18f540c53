use crate::error::BackendError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic tick counter for one data stream.
///
/// Shared between a poller and any one-off refetch of the same endpoint so
/// that every result for that stream carries a comparable sequence number.
#[derive(Debug, Clone, Default)]
pub struct SequenceSource {
    counter: Arc<AtomicU64>,
}

impl SequenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the next sequence number (starting at 1)
    pub fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Highest number handed out so far
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

/// Consumer-side filter that drops anything older than what was already applied
#[derive(Debug, Default, Clone)]
pub struct SequenceGuard {
    latest: u64,
}

impl SequenceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `seq` if it is newer than everything applied so far
    pub fn admit(&mut self, seq: u64) -> Result<(), BackendError> {
        if seq <= self.latest {
            return Err(BackendError::StaleResult {
                seq,
                latest: self.latest,
            });
        }
        self.latest = seq;
        Ok(())
    }

    pub fn latest(&self) -> u64 {
        self.latest
    }

    /// Forget everything (new screen instance)
    pub fn reset(&mut self) {
        self.latest = 0;
    }
}
