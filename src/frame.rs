use bytes::Bytes;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::broadcast;

/// One JPEG frame pulled from the backend's camera feed
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Monotonic frame identifier
    pub id: u64,
    /// When the frame arrived
    pub timestamp: SystemTime,
    /// Encoded image bytes (cheap to clone)
    pub data: Bytes,
}

impl CameraFrame {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Counters for the camera feed
#[derive(Debug, Default)]
struct FrameStats {
    frames_received: AtomicU64,
    fetch_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FrameStatsSnapshot {
    pub frames_received: u64,
    pub fetch_failures: u64,
}

/// Latest camera frame, shared between the service screen (writer) and
/// the status server (readers).
///
/// A failed fetch leaves the previous frame in place.
pub struct FrameSlot {
    latest: RwLock<Option<CameraFrame>>,
    next_id: AtomicU64,
    stats: FrameStats,
    sender: broadcast::Sender<CameraFrame>,
}

impl FrameSlot {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            latest: RwLock::new(None),
            next_id: AtomicU64::new(1),
            stats: FrameStats::default(),
            sender,
        }
    }

    /// Store a freshly fetched frame and fan it out to stream subscribers
    pub fn push(&self, data: Bytes) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = CameraFrame {
            id,
            timestamp: SystemTime::now(),
            data,
        };

        *self.latest.write() = Some(frame.clone());
        self.stats.frames_received.fetch_add(1, Ordering::Relaxed);

        // No subscribers is fine
        let _ = self.sender.send(frame);
        id
    }

    pub fn record_failure(&self) {
        self.stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn latest(&self) -> Option<CameraFrame> {
        self.latest.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CameraFrame> {
        self.sender.subscribe()
    }

    pub fn stats(&self) -> FrameStatsSnapshot {
        FrameStatsSnapshot {
            frames_received: self.stats.frames_received.load(Ordering::Relaxed),
            fetch_failures: self.stats.fetch_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new(8)
    }
}

pub type SharedFrameSlot = Arc<FrameSlot>;
