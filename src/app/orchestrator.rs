use super::navigator::Navigator;
use super::types::{ComponentState, ShutdownReason};
use crate::backend::{HttpBackend, KioskBackend};
use crate::config::{PollingConfig, RollcallConfig};
use crate::error::Result;
use crate::events::EventBus;
use crate::frame::FrameSlot;
use crate::keyboard_input::KeyboardInputHandler;
use crate::overlay::OverlayState;
use crate::reachability::ReachabilityMonitor;
use crate::screens::{ScreenContext, ViewPublisher};
#[cfg(feature = "status_server")]
use crate::status::{StatusServer, StatusServerBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Main application coordinator that manages all kiosk components
pub struct KioskOrchestrator {
    pub(super) config: Arc<RollcallConfig>,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) overlay: OverlayState,
    pub(super) views: ViewPublisher,
    pub(super) frames: Arc<FrameSlot>,
    pub(super) backend: Arc<dyn KioskBackend>,

    // Components
    pub(super) reachability: ReachabilityMonitor,
    pub(super) navigator: Option<Navigator>,
    pub(super) keyboard_handler: Option<KeyboardInputHandler>,
    #[cfg(feature = "status_server")]
    pub(super) status_server: Option<Arc<StatusServer>>,

    // Running tasks
    pub(super) tasks: HashMap<&'static str, JoinHandle<()>>,
    pub(super) reachability_probe: Option<crate::poller::PollHandle>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl KioskOrchestrator {
    /// Create an orchestrator talking to the configured HTTP backend
    pub async fn new(config: RollcallConfig) -> Result<Self> {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let overlay = OverlayState::with_event_bus(Arc::clone(&event_bus));
        let backend = HttpBackend::new(&config.backend)?.with_overlay(Arc::new(overlay.clone()));
        Ok(Self::assemble(config, event_bus, overlay, Arc::new(backend)))
    }

    /// Create an orchestrator around an already-built backend
    pub fn with_backend(config: RollcallConfig, backend: Arc<dyn KioskBackend>) -> Self {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let overlay = OverlayState::with_event_bus(Arc::clone(&event_bus));
        Self::assemble(config, event_bus, overlay, backend)
    }

    fn assemble(
        config: RollcallConfig,
        event_bus: Arc<EventBus>,
        overlay: OverlayState,
        backend: Arc<dyn KioskBackend>,
    ) -> Self {
        let config = Arc::new(config);
        let views = ViewPublisher::new();
        let frames = Arc::new(FrameSlot::default());
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        let reachability = ReachabilityMonitor::new(
            Arc::clone(&backend),
            Arc::new(overlay.clone()),
            Arc::clone(&event_bus),
            PollingConfig::interval(config.polling.health),
            config.backend.request_timeout(),
            config.session.unreachable_after_failures,
        );

        let navigator = Navigator::new(ScreenContext {
            backend: Arc::clone(&backend),
            event_bus: Arc::clone(&event_bus),
            config: Arc::clone(&config),
            overlay: Arc::new(overlay.clone()),
            frames: Arc::clone(&frames),
            views: views.clone(),
        });

        let keyboard_handler = config
            .system
            .operator_console
            .then(|| KeyboardInputHandler::new(Arc::clone(&event_bus), views.clone()));

        #[cfg(feature = "status_server")]
        let status_server = if config.status.enabled {
            StatusServerBuilder::new()
                .config(config.status.clone())
                .views(views.clone())
                .frames(Arc::clone(&frames))
                .event_bus(Arc::clone(&event_bus))
                .overlay(overlay.clone())
                .backend(Arc::clone(&backend))
                .reachable(reachability.reachable_flag())
                .request_timeout(config.backend.request_timeout())
                .build()
                .map_err(|e| warn!("Status server disabled: {}", e))
                .ok()
                .map(Arc::new)
        } else {
            None
        };

        Self {
            config,
            event_bus,
            overlay,
            views,
            frames,
            backend,
            reachability,
            navigator: Some(navigator),
            keyboard_handler,
            #[cfg(feature = "status_server")]
            status_server,
            tasks: HashMap::new(),
            reachability_probe: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn views(&self) -> ViewPublisher {
        self.views.clone()
    }

    pub fn overlay(&self) -> &OverlayState {
        &self.overlay
    }

    pub fn frames(&self) -> Arc<FrameSlot> {
        Arc::clone(&self.frames)
    }

    pub fn backend(&self) -> Arc<dyn KioskBackend> {
        Arc::clone(&self.backend)
    }

    pub fn config(&self) -> &RollcallConfig {
        &self.config
    }
}
