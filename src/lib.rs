pub mod config;
pub mod error;
pub mod events;
pub mod overlay;
pub mod frame;
pub mod backend;
pub mod poller;
pub mod recognition;
pub mod session;
pub mod screens;
pub mod reachability;
pub mod keyboard_input;
pub mod app;

#[cfg(feature = "status_server")]
pub mod status;

pub use config::RollcallConfig;
pub use error::{BackendError, BackendResult, Result, RollcallError};
pub use events::{EventBus, EventFilter, EventReceiver, KioskEvent, OperatorCommand};
pub use overlay::{OverlayNotifier, OverlayReason, OverlayState};
pub use frame::{CameraFrame, FrameSlot};
pub use backend::{HttpBackend, KioskBackend, MockBackend};
pub use poller::{PollResult, ScreenScheduler};
pub use session::{SessionView, SessionViewModel};
pub use screens::{Screen, ScreenView, ViewPublisher};
pub use reachability::ReachabilityMonitor;
pub use app::{ComponentState, KioskOrchestrator, Navigator, ShutdownReason};

#[cfg(feature = "status_server")]
pub use status::{StatusServer, StatusServerBuilder};
