use crate::events::{EventBus, KioskEvent};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Who asked for the overlay. While several are active the lowest variant is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayReason {
    /// Backend unreachable; locks the interactive surface until it answers again
    BackendStarting,
    /// A backend sync is in flight
    Sync,
}

/// Something that can raise or drop the kiosk-wide blocking overlay.
///
/// Passed explicitly to whatever needs it (backend client, reachability monitor)
/// instead of being reachable through a global. `hide` only withdraws the
/// caller's own reason; another owner's overlay stays up.
pub trait OverlayNotifier: Send + Sync {
    fn show(&self, reason: OverlayReason, message: &str);
    fn hide(&self, reason: OverlayReason);
}

/// Current overlay as seen by renderers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverlaySnapshot {
    pub visible: bool,
    pub message: Option<String>,
}

#[derive(Default)]
struct Requests {
    active: BTreeMap<OverlayReason, String>,
    shown: OverlaySnapshot,
}

impl Requests {
    /// Recompute the visible overlay; `true` when it changed
    fn settle(&mut self) -> bool {
        let next = match self.active.values().next() {
            Some(message) => OverlaySnapshot {
                visible: true,
                message: Some(message.clone()),
            },
            None => OverlaySnapshot::default(),
        };
        if next == self.shown {
            return false;
        }
        self.shown = next;
        true
    }
}

/// Shared overlay store. Every visible change is mirrored onto the event bus when one is attached.
#[derive(Clone, Default)]
pub struct OverlayState {
    inner: Arc<RwLock<Requests>>,
    event_bus: Option<Arc<EventBus>>,
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_bus(event_bus: Arc<EventBus>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Requests::default())),
            event_bus: Some(event_bus),
        }
    }

    pub fn snapshot(&self) -> OverlaySnapshot {
        self.inner.read().shown.clone()
    }

    pub fn is_visible(&self) -> bool {
        self.inner.read().shown.visible
    }

    pub fn is_active(&self, reason: OverlayReason) -> bool {
        self.inner.read().active.contains_key(&reason)
    }

    fn update(&self, change: impl FnOnce(&mut BTreeMap<OverlayReason, String>)) {
        let shown = {
            let mut requests = self.inner.write();
            change(&mut requests.active);
            if !requests.settle() {
                return;
            }
            requests.shown.clone()
        };

        let event = match shown.message {
            Some(message) => {
                debug!("Overlay shown: {}", message);
                KioskEvent::OverlayShown { message }
            }
            None => {
                debug!("Overlay hidden");
                KioskEvent::OverlayHidden
            }
        };
        if let Some(bus) = &self.event_bus {
            let _ = bus.publish_now(event);
        }
    }
}

impl OverlayNotifier for OverlayState {
    fn show(&self, reason: OverlayReason, message: &str) {
        self.update(|active| {
            active.insert(reason, message.to_string());
        });
    }

    fn hide(&self, reason: OverlayReason) {
        self.update(|active| {
            active.remove(&reason);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_and_hide() {
        let overlay = OverlayState::new();
        assert!(!overlay.is_visible());

        overlay.show(OverlayReason::Sync, "Syncing...");
        assert_eq!(
            overlay.snapshot(),
            OverlaySnapshot {
                visible: true,
                message: Some("Syncing...".to_string()),
            }
        );

        overlay.hide(OverlayReason::Sync);
        assert_eq!(overlay.snapshot(), OverlaySnapshot::default());
    }

    #[test]
    fn test_backend_lock_outlives_sync() {
        let overlay = OverlayState::new();
        overlay.show(OverlayReason::BackendStarting, "Starting backend...");
        overlay.show(OverlayReason::Sync, "Syncing...");
        assert_eq!(overlay.snapshot().message.as_deref(), Some("Starting backend..."));

        overlay.hide(OverlayReason::Sync);
        assert!(overlay.is_active(OverlayReason::BackendStarting));
        assert_eq!(overlay.snapshot().message.as_deref(), Some("Starting backend..."));

        overlay.show(OverlayReason::Sync, "Syncing...");
        overlay.hide(OverlayReason::BackendStarting);
        assert_eq!(overlay.snapshot().message.as_deref(), Some("Syncing..."));

        overlay.hide(OverlayReason::Sync);
        assert!(!overlay.is_visible());
    }

    #[tokio::test]
    async fn test_changes_are_published_once() {
        let bus = Arc::new(EventBus::new(10));
        let mut receiver = bus.subscribe();
        let overlay = OverlayState::with_event_bus(Arc::clone(&bus));

        overlay.show(OverlayReason::BackendStarting, "Starting backend...");
        overlay.show(OverlayReason::BackendStarting, "Starting backend...");
        // Hidden behind the backend lock, nothing to publish
        overlay.show(OverlayReason::Sync, "Syncing...");
        overlay.hide(OverlayReason::Sync);
        overlay.hide(OverlayReason::BackendStarting);
        overlay.hide(OverlayReason::BackendStarting);

        assert!(matches!(
            receiver.try_recv().unwrap(),
            KioskEvent::OverlayShown { .. }
        ));
        assert!(matches!(receiver.try_recv().unwrap(), KioskEvent::OverlayHidden));
        assert!(receiver.try_recv().is_err());
    }
}
