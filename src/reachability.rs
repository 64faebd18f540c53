use crate::backend::KioskBackend;
use crate::error::BackendError;
use crate::events::{EventBus, KioskEvent};
use crate::overlay::{OverlayNotifier, OverlayReason};
use crate::poller::{spawn_poller, PollHandle, PollResult, PollerSpec, SequenceSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Overlay shown while the local backend does not answer
pub const STARTING_BACKEND_MESSAGE: &str = "Starting backend...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachabilityAction {
    ShowOverlay,
    HideOverlay,
    Publish { reachable: bool },
}

/// Consecutive-failure bookkeeping behind [`ReachabilityMonitor`].
///
/// Only transport failures count. A backend that answers with an error
/// status is up.
#[derive(Debug)]
pub struct ReachabilityTracker {
    threshold: u32,
    failures: u32,
    reachable: bool,
    overlay: bool,
}

impl ReachabilityTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            failures: 0,
            reachable: true,
            overlay: false,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn observe(&mut self, error: Option<&BackendError>) -> Vec<ReachabilityAction> {
        let mut actions = Vec::new();

        if error.is_some_and(BackendError::is_network) {
            self.failures = self.failures.saturating_add(1);
            if !self.overlay {
                self.overlay = true;
                actions.push(ReachabilityAction::ShowOverlay);
            }
            if self.reachable && self.failures >= self.threshold {
                self.reachable = false;
                actions.push(ReachabilityAction::Publish { reachable: false });
            }
            return actions;
        }

        self.failures = 0;
        if self.overlay {
            self.overlay = false;
            actions.push(ReachabilityAction::HideOverlay);
        }
        if !self.reachable {
            self.reachable = true;
            actions.push(ReachabilityAction::Publish { reachable: true });
        }
        actions
    }
}

/// Probes `GET /device/info` and drives the "Starting backend..." overlay
pub struct ReachabilityMonitor {
    backend: Arc<dyn KioskBackend>,
    overlay: Arc<dyn OverlayNotifier>,
    event_bus: Arc<EventBus>,
    interval: Duration,
    timeout: Duration,
    threshold: u32,
    reachable: Arc<AtomicBool>,
}

impl ReachabilityMonitor {
    pub fn new(
        backend: Arc<dyn KioskBackend>,
        overlay: Arc<dyn OverlayNotifier>,
        event_bus: Arc<EventBus>,
        interval: Duration,
        timeout: Duration,
        threshold: u32,
    ) -> Self {
        Self {
            backend,
            overlay,
            event_bus,
            interval,
            timeout,
            threshold,
            reachable: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Last known reachability, shared with whoever reports health
    pub fn reachable_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.reachable)
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Relaxed)
    }

    /// Start probing; the returned handle stops the probe
    pub fn start(&self, parent: &CancellationToken) -> PollHandle {
        let backend = Arc::clone(&self.backend);
        let overlay = Arc::clone(&self.overlay);
        let event_bus = Arc::clone(&self.event_bus);
        let reachable = Arc::clone(&self.reachable);
        let mut tracker = ReachabilityTracker::new(self.threshold);

        info!("Backend reachability probe every {:?}", self.interval);

        spawn_poller(
            PollerSpec::new("reachability", self.interval).with_timeout(self.timeout),
            SequenceSource::new(),
            parent,
            move || {
                let backend = Arc::clone(&backend);
                async move { backend.device_info().await }
            },
            move |result: PollResult<_>| {
                for action in tracker.observe(result.error.as_ref()) {
                    match action {
                        ReachabilityAction::ShowOverlay => {
                            overlay.show(OverlayReason::BackendStarting, STARTING_BACKEND_MESSAGE)
                        }
                        ReachabilityAction::HideOverlay => overlay.hide(OverlayReason::BackendStarting),
                        ReachabilityAction::Publish { reachable: now_reachable } => {
                            if now_reachable {
                                info!("Backend is reachable again");
                            } else {
                                warn!(
                                    "Backend unreachable after {} consecutive failures",
                                    tracker.failures()
                                );
                            }
                            reachable.store(now_reachable, Ordering::Relaxed);
                            let _ = event_bus.publish_now(KioskEvent::BackendReachability {
                                reachable: now_reachable,
                                timestamp: SystemTime::now(),
                            });
                        }
                    }
                }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::overlay::OverlayState;

    fn down() -> BackendError {
        BackendError::network("connection refused")
    }

    #[test]
    fn test_overlay_on_first_failure_then_unreachable_at_threshold() {
        let mut tracker = ReachabilityTracker::new(3);

        assert_eq!(
            tracker.observe(Some(&down())),
            vec![ReachabilityAction::ShowOverlay]
        );
        assert!(tracker.observe(Some(&down())).is_empty());
        assert_eq!(
            tracker.observe(Some(&down())),
            vec![ReachabilityAction::Publish { reachable: false }]
        );
        assert!(!tracker.is_reachable());
        assert!(tracker.observe(Some(&down())).is_empty());

        assert_eq!(
            tracker.observe(None),
            vec![
                ReachabilityAction::HideOverlay,
                ReachabilityAction::Publish { reachable: true }
            ]
        );
        assert_eq!(tracker.failures(), 0);
    }

    #[test]
    fn test_error_status_counts_as_reachable() {
        let mut tracker = ReachabilityTracker::new(1);
        let answered = BackendError::Backend {
            status: 500,
            code: None,
        };
        assert!(tracker.observe(Some(&answered)).is_empty());
        assert!(tracker.is_reachable());
    }

    #[test]
    fn test_blip_below_threshold_only_toggles_overlay() {
        let mut tracker = ReachabilityTracker::new(3);
        tracker.observe(Some(&down()));
        assert_eq!(tracker.observe(None), vec![ReachabilityAction::HideOverlay]);
        assert!(tracker.is_reachable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_drives_overlay_and_events() {
        let backend = Arc::new(MockBackend::new());
        backend.set_device(Err(down()));
        let overlay = Arc::new(OverlayState::new());
        let bus = Arc::new(EventBus::new(16));
        let mut events = bus.subscribe();

        let monitor = ReachabilityMonitor::new(
            backend.clone(),
            overlay.clone(),
            Arc::clone(&bus),
            Duration::from_secs(3),
            Duration::from_secs(1),
            2,
        );
        let token = CancellationToken::new();
        let handle = monitor.start(&token);

        let event = tokio::time::timeout(Duration::from_secs(30), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            event,
            KioskEvent::BackendReachability { reachable: false, .. }
        ));
        assert!(!monitor.is_reachable());
        assert_eq!(
            overlay.snapshot().message.as_deref(),
            Some(STARTING_BACKEND_MESSAGE)
        );

        backend.set_device(Ok(None));
        let event = tokio::time::timeout(Duration::from_secs(30), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            event,
            KioskEvent::BackendReachability { reachable: true, .. }
        ));
        assert!(!overlay.is_visible());

        handle.stop().await;
    }
    #[tokio::test]
    async fn test_sync_keeps_backend_lock_while_unreachable() {
        use crate::backend::HttpBackend;
        use crate::config::RollcallConfig;

        let overlay = Arc::new(OverlayState::new());
        let probe_backend = Arc::new(MockBackend::new());
        probe_backend.set_device(Err(down()));
        let monitor = ReachabilityMonitor::new(
            probe_backend,
            overlay.clone(),
            Arc::new(EventBus::new(16)),
            Duration::from_millis(100),
            Duration::from_millis(500),
            2,
        );
        let token = CancellationToken::new();
        let handle = monitor.start(&token);

        tokio::time::timeout(Duration::from_secs(5), async {
            while !overlay.is_visible() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();

        let mut config = RollcallConfig::default().backend;
        config.base_url = "http://127.0.0.1:1/".to_string();
        config.request_timeout_ms = 500;
        let dead = HttpBackend::new(&config)
            .unwrap()
            .with_overlay(overlay.clone());
        assert!(dead.sync().await.is_err());

        // Several more failed probes; the lock must still be up
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(
            overlay.snapshot().message.as_deref(),
            Some(STARTING_BACKEND_MESSAGE)
        );
        assert!(overlay.is_active(OverlayReason::BackendStarting));
        assert!(!overlay.is_active(OverlayReason::Sync));

        handle.stop().await;
    }
}
