use crate::{
    backend::KioskBackend,
    config::StatusConfig,
    error::{Result, RollcallError, StatusServerError},
    events::EventBus,
    frame::FrameSlot,
    overlay::OverlayState,
    screens::ViewPublisher,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use super::handlers::{
    camera_frame_handler, health_handler, mjpeg_stream_handler, navigate_handler,
    operator_handler, overlay_handler, register_handler, view_handler, view_stream_handler,
};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ServerState {
    pub(crate) views: ViewPublisher,
    pub(crate) frames: Arc<FrameSlot>,
    pub(crate) event_bus: Arc<EventBus>,
    pub(crate) overlay: OverlayState,
    pub(crate) backend: Arc<dyn KioskBackend>,
    pub(crate) reachable: Arc<AtomicBool>,
    /// Upper bound for backend calls made on behalf of a request
    pub(crate) request_timeout: Duration,
}

/// All routes the renderer uses
pub fn router(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/view", get(view_handler))
        .route("/view/stream", get(view_stream_handler))
        .route("/overlay", get(overlay_handler))
        .route("/camera.jpg", get(camera_frame_handler))
        .route("/camera.mjpg", get(mjpeg_stream_handler))
        .route("/operator/:command", post(operator_handler))
        .route("/navigate/:screen", post(navigate_handler))
        .route("/register", post(register_handler))
        .layer(cors)
        .with_state(state)
}

/// Serves the mounted screen's view and the camera feed over HTTP
pub struct StatusServer {
    pub(crate) config: StatusConfig,
    pub(crate) state: ServerState,
}

impl StatusServer {
    pub fn new(config: StatusConfig, state: ServerState) -> Self {
        Self { config, state }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.ip, self.config.port)
    }

    /// Serve until `shutdown` is cancelled
    pub async fn start(&self, shutdown: CancellationToken) -> Result<()> {
        let app = router(self.state.clone());
        let addr = self.address();

        info!("Starting status server on {}", addr);

        let listener =
            tokio::net::TcpListener::bind(&addr)
                .await
                .map_err(|e| StatusServerError::BindFailed {
                    address: addr.clone(),
                    source: e,
                })?;

        info!("Status server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .map_err(|e| StatusServerError::StartupFailed {
                details: format!("Server error: {}", e),
            })?;

        info!("Status server stopped");
        Ok(())
    }
}

/// Status server builder
pub struct StatusServerBuilder {
    config: Option<StatusConfig>,
    views: Option<ViewPublisher>,
    frames: Option<Arc<FrameSlot>>,
    event_bus: Option<Arc<EventBus>>,
    overlay: Option<OverlayState>,
    backend: Option<Arc<dyn KioskBackend>>,
    reachable: Option<Arc<AtomicBool>>,
    request_timeout: Option<Duration>,
}

impl StatusServerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            views: None,
            frames: None,
            event_bus: None,
            overlay: None,
            backend: None,
            reachable: None,
            request_timeout: None,
        }
    }

    pub fn config(mut self, config: StatusConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn views(mut self, views: ViewPublisher) -> Self {
        self.views = Some(views);
        self
    }

    pub fn frames(mut self, frames: Arc<FrameSlot>) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn overlay(mut self, overlay: OverlayState) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn KioskBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Reachability flag reported on `/health`; assumed reachable when unset
    pub fn reachable(mut self, reachable: Arc<AtomicBool>) -> Self {
        self.reachable = Some(reachable);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<StatusServer> {
        fn missing(what: &str) -> RollcallError {
            RollcallError::StatusServer(StatusServerError::StartupFailed {
                details: format!("{} is required", what),
            })
        }

        let config = self.config.ok_or_else(|| missing("Status configuration"))?;
        let views = self.views.ok_or_else(|| missing("View publisher"))?;
        let frames = self.frames.ok_or_else(|| missing("Frame slot"))?;
        let event_bus = self.event_bus.ok_or_else(|| missing("Event bus"))?;
        let backend = self.backend.ok_or_else(|| missing("Backend"))?;

        Ok(StatusServer::new(
            config,
            ServerState {
                views,
                frames,
                event_bus,
                overlay: self.overlay.unwrap_or_default(),
                backend,
                reachable: self
                    .reachable
                    .unwrap_or_else(|| Arc::new(AtomicBool::new(true))),
                request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            },
        ))
    }
}

impl Default for StatusServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
