use std::time::{Duration, Instant};

/// Banner logic for faces nobody matched.
///
/// A face has to stay unmatched for `hold` before the banner is declared.
/// The banner then clears after `decay` even if the face is still there,
/// and a new full hold is needed before it shows again.
#[derive(Debug, Clone)]
pub struct UnrecognizedDetector {
    hold: Duration,
    decay: Duration,
    hold_started: Option<Instant>,
    declared_at: Option<Instant>,
    backend_reported: bool,
}

impl UnrecognizedDetector {
    pub fn new(hold: Duration, decay: Duration) -> Self {
        Self {
            hold,
            decay,
            hold_started: None,
            declared_at: None,
            backend_reported: false,
        }
    }

    /// One local observation. `unmatched_face` means at least one face is in
    /// frame, no session is running and nothing matched it.
    pub fn observe(&mut self, unmatched_face: bool, now: Instant) {
        self.expire(now);

        if self.declared_at.is_some() {
            return;
        }

        if !unmatched_face {
            self.hold_started = None;
            return;
        }

        let started = *self.hold_started.get_or_insert(now);
        if now.saturating_duration_since(started) >= self.hold {
            self.declared_at = Some(now);
            self.hold_started = None;
        }
    }

    /// The backend's own recent-unrecognized report
    pub fn set_backend_report(&mut self, recent: bool) {
        self.backend_reported = recent;
    }

    /// Advance the clock without a new observation
    pub fn expire(&mut self, now: Instant) {
        if let Some(declared) = self.declared_at {
            if now.saturating_duration_since(declared) >= self.decay {
                self.declared_at = None;
                self.hold_started = None;
            }
        }
    }

    pub fn is_declared(&self, now: Instant) -> bool {
        self.declared_at
            .map(|declared| now.saturating_duration_since(declared) < self.decay)
            .unwrap_or(false)
    }

    /// Whether the banner should be up right now
    pub fn banner_visible(&self, now: Instant) -> bool {
        self.backend_reported || self.is_declared(now)
    }

    pub fn reset(&mut self) {
        self.hold_started = None;
        self.declared_at = None;
        self.backend_reported = false;
    }
}
