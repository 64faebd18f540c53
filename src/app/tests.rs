use super::*;
use crate::backend::{BackendCall, MockBackend};
use crate::config::RollcallConfig;
use crate::events::{KioskEvent, OperatorCommand};
use crate::screens::{Screen, ScreenContext, ScreenView, ViewPublisher};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

fn test_config() -> RollcallConfig {
    let mut config = RollcallConfig::default();
    config.status.enabled = false;
    config.system.operator_console = false;
    config
}

fn orchestrator() -> (KioskOrchestrator, Arc<MockBackend>) {
    let backend = Arc::new(MockBackend::new());
    let orchestrator = KioskOrchestrator::with_backend(test_config(), backend.clone());
    (orchestrator, backend)
}

async fn wait_for_screen(views: &ViewPublisher, want: fn(&ScreenView) -> bool) {
    let mut rx = views.subscribe();
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            if want(&rx.borrow_and_update()) {
                return;
            }
            rx.changed().await.expect("view channel closed");
        }
    })
    .await
    .expect("screen never shown");
}

#[tokio::test]
async fn test_initialize_registers_components() {
    let (mut orchestrator, _) = orchestrator();
    assert!(orchestrator.get_all_component_states().await.is_empty());

    orchestrator.initialize().await.unwrap();
    let states = orchestrator.get_all_component_states().await;
    assert_eq!(states.get("navigator"), Some(&ComponentState::Stopped));
    assert_eq!(states.get("reachability"), Some(&ComponentState::Stopped));
    assert!(!states.contains_key("keyboard"));
    assert!(!states.contains_key("status_server"));
}

#[tokio::test]
async fn test_component_state_management() {
    let (orchestrator, _) = orchestrator();

    orchestrator
        .set_component_state("navigator", ComponentState::Starting)
        .await;
    assert_eq!(
        orchestrator.get_component_state("navigator").await,
        Some(ComponentState::Starting)
    );

    orchestrator
        .set_component_state("navigator", ComponentState::Running)
        .await;
    orchestrator
        .set_component_state("reachability", ComponentState::Failed)
        .await;

    let all_states = orchestrator.get_all_component_states().await;
    assert_eq!(all_states.len(), 2);
    assert_eq!(all_states.get("navigator"), Some(&ComponentState::Running));
}

#[tokio::test(start_paused = true)]
async fn test_start_navigate_and_shutdown() {
    let (mut orchestrator, _) = orchestrator();
    let views = orchestrator.views();

    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();
    wait_for_screen(&views, |view| matches!(view, ScreenView::Screensaver(_))).await;

    orchestrator
        .event_bus()
        .publish_now(KioskEvent::Navigate(Screen::History))
        .unwrap();
    wait_for_screen(&views, |view| matches!(view, ScreenView::History(h) if !h.loading)).await;

    let exit_code = orchestrator.shutdown().await.unwrap();
    assert_eq!(exit_code, 0);

    let states = orchestrator.get_all_component_states().await;
    assert!(states.values().all(|state| *state == ComponentState::Stopped));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_requested_event_ends_run() {
    let (mut orchestrator, _) = orchestrator();
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();

    let bus = orchestrator.event_bus();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        bus.publish_now(KioskEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: "test".to_string(),
        })
        .unwrap();
    });

    let exit_code = orchestrator.run().await.unwrap();
    assert_eq!(exit_code, 0);
}

#[tokio::test(start_paused = true)]
async fn test_navigation_tears_down_previous_screen() {
    let (orchestrator, backend) = orchestrator();
    let ctx = ScreenContext {
        backend: orchestrator.backend(),
        event_bus: orchestrator.event_bus(),
        config: Arc::new(test_config()),
        overlay: Arc::new(orchestrator.overlay().clone()),
        frames: orchestrator.frames(),
        views: orchestrator.views(),
    };
    let mut navigator = Navigator::new(ctx);
    assert!(!navigator.forward(OperatorCommand::Refresh));

    navigator.navigate(Screen::Service).await;
    assert_eq!(navigator.current(), Some(Screen::Service));
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(backend.count(|call| *call == BackendCall::Session) > 0);

    let service_id = navigator.mounted().map(|m| m.id());
    navigator.navigate(Screen::Service).await;
    assert_eq!(navigator.mounted().map(|m| m.id()), service_id);

    navigator.navigate(Screen::Notifications).await;
    backend.clear_calls();
    tokio::time::sleep(Duration::from_secs(5)).await;

    // Only the notifications poller is left
    assert_eq!(backend.count(|call| *call == BackendCall::Session), 0);
    assert!(backend.count(|call| *call == BackendCall::Notifications) > 0);
    assert!(navigator.forward(OperatorCommand::MarkAllRead));

    navigator.unmount().await;
    assert_eq!(navigator.current(), None);
}
