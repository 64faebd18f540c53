use std::collections::HashMap;
use std::time::{Duration, Instant};

/// At most one attendance mark per student per window.
///
/// Recognition polls several times a second, so a student standing in
/// front of the camera would otherwise be marked on every tick.
#[derive(Debug, Clone)]
pub struct MarkThrottle {
    window: Duration,
    last_attempt: HashMap<String, Instant>,
}

impl MarkThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_attempt: HashMap::new(),
        }
    }

    /// Record an attempt for `student_id` if the window allows one
    pub fn try_acquire(&mut self, student_id: &str, now: Instant) -> bool {
        match self.last_attempt.get(student_id) {
            Some(last) if now.saturating_duration_since(*last) < self.window => false,
            _ => {
                self.last_attempt.insert(student_id.to_string(), now);
                true
            }
        }
    }

    pub fn clear(&mut self) {
        self.last_attempt.clear();
    }
}
