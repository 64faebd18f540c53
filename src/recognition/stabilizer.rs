use std::time::{Duration, Instant};

/// Debounced view of a noisy signal
#[derive(Debug, Clone, PartialEq)]
pub struct StabilizedSignal<K> {
    pub state: Option<K>,
    pub since: Instant,
}

/// Hold-time reducer.
///
/// The reported state only moves to a value after that same non-empty value
/// has been observed on every tick for `hold`. An empty or different
/// observation restarts the hold from zero. The reducer never drops its
/// reported state by itself; callers decide when to [`clear`](Self::clear).
#[derive(Debug, Clone)]
pub struct Stabilizer<K> {
    hold: Duration,
    candidate: Option<(K, Instant)>,
    stable: StabilizedSignal<K>,
}

impl<K: Clone + PartialEq> Stabilizer<K> {
    pub fn new(hold: Duration, now: Instant) -> Self {
        Self {
            hold,
            candidate: None,
            stable: StabilizedSignal {
                state: None,
                since: now,
            },
        }
    }

    /// Feed one raw observation; returns true when the reported state changed
    pub fn observe(&mut self, raw: Option<K>, now: Instant) -> bool {
        let Some(raw) = raw else {
            self.candidate = None;
            return false;
        };

        let started = match &self.candidate {
            Some((value, started)) if *value == raw => *started,
            _ => now,
        };

        // Keep the freshest copy (names can fill in between ticks)
        self.candidate = Some((raw.clone(), started));

        if now.saturating_duration_since(started) < self.hold {
            return false;
        }

        if self.stable.state.as_ref() == Some(&raw) {
            self.stable.state = Some(raw);
            return false;
        }

        self.stable = StabilizedSignal {
            state: Some(raw),
            since: now,
        };
        true
    }

    pub fn signal(&self) -> &StabilizedSignal<K> {
        &self.stable
    }

    pub fn state(&self) -> Option<&K> {
        self.stable.state.as_ref()
    }

    /// Value currently accumulating hold time, if it differs from the reported one
    pub fn pending(&self) -> Option<&K> {
        match &self.candidate {
            Some((value, _)) if self.stable.state.as_ref() != Some(value) => Some(value),
            _ => None,
        }
    }

    /// Drop the reported state immediately (no debounce on the way down)
    pub fn clear(&mut self, now: Instant) {
        self.candidate = None;
        if self.stable.state.is_some() {
            self.stable = StabilizedSignal { state: None, since: now };
        }
    }

    /// Forget hold progress but keep the reported state
    pub fn restart_hold(&mut self) {
        self.candidate = None;
    }

    pub fn hold(&self) -> Duration {
        self.hold
    }
}
