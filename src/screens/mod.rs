//! Per-screen controllers.
//!
//! Exactly one screen is mounted at a time. A mounted screen owns a
//! [`ScreenScheduler`] holding all of its pollers and in-flight calls, and
//! publishes its render model through a watch channel. Unmounting tears the
//! scheduler down before anything else is mounted.

mod history;
mod notifications;
mod registration;
mod screensaver;
mod service;
mod settings;

pub use history::{HistoryCard, HistoryScreen, HistoryView, HISTORY_LOAD_FAILED, UNTITLED_CLASS};
pub use notifications::{
    relative_time, NotificationFilter, NotificationItem, NotificationsScreen, NotificationsView,
};
pub use registration::{redeem_code, registration_message, RegistrationOutcome};
pub use screensaver::{RoomInfoView, ScreensaverScreen, ROOM_AVAILABLE, ROOM_UNAVAILABLE};
pub use service::ServiceScreen;
pub use settings::{KioskInfo, SettingsScreen, SettingsView, NOT_ASSIGNED};

use crate::backend::KioskBackend;
use crate::config::RollcallConfig;
use crate::events::{EventBus, OperatorCommand};
use crate::frame::FrameSlot;
use crate::overlay::OverlayNotifier;
use crate::poller::ScreenScheduler;
use crate::session::SessionView;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};
use uuid::Uuid;

/// Every screen the kiosk can show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Screensaver,
    Service,
    History,
    Notifications,
    Settings,
}

impl Screen {
    pub const ALL: [Screen; 5] = [
        Screen::Screensaver,
        Screen::Service,
        Screen::History,
        Screen::Notifications,
        Screen::Settings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Screen::Screensaver => "screensaver",
            Screen::Service => "service",
            Screen::History => "history",
            Screen::Notifications => "notifications",
            Screen::Settings => "settings",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Screen {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Screen::ALL
            .iter()
            .copied()
            .find(|screen| screen.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown screen '{}'", s))
    }
}

/// Render model of whichever screen is mounted
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "screen", content = "view", rename_all = "snake_case")]
pub enum ScreenView {
    /// Nothing mounted yet
    Blank,
    Screensaver(RoomInfoView),
    Service(Box<SessionView>),
    History(HistoryView),
    Notifications(NotificationsView),
    Settings(SettingsView),
}

/// Shared handle screens publish their views through
#[derive(Clone)]
pub struct ViewPublisher {
    sender: Arc<watch::Sender<ScreenView>>,
}

impl ViewPublisher {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(ScreenView::Blank);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Replace the published view; returns false when nothing changed
    pub fn publish(&self, view: ScreenView) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        })
    }

    pub fn current(&self) -> ScreenView {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScreenView> {
        self.sender.subscribe()
    }
}

impl Default for ViewPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a screen needs from the rest of the kiosk
#[derive(Clone)]
pub struct ScreenContext {
    pub backend: Arc<dyn KioskBackend>,
    pub event_bus: Arc<EventBus>,
    pub config: Arc<RollcallConfig>,
    pub overlay: Arc<dyn OverlayNotifier>,
    pub frames: Arc<FrameSlot>,
    pub views: ViewPublisher,
}

/// Clock used by screen loops; follows tokio's clock so paused tests work
pub(crate) fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// A screen that is currently on display
pub struct MountedScreen {
    id: Uuid,
    screen: Screen,
    scheduler: ScreenScheduler,
    commands: mpsc::UnboundedSender<OperatorCommand>,
}

impl MountedScreen {
    pub(crate) fn new(
        screen: Screen,
        scheduler: ScreenScheduler,
        commands: mpsc::UnboundedSender<OperatorCommand>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            screen,
            scheduler,
            commands,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn scheduler(&self) -> &ScreenScheduler {
        &self.scheduler
    }

    /// Forward an operator command; false once the screen loop is gone
    pub fn send_command(&self, command: OperatorCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Cancel every timer and in-flight call of this screen and wait for them
    pub async fn unmount(mut self) {
        debug!("Unmounting {} ({})", self.screen, self.id);
        self.scheduler.teardown().await;
    }
}

/// Mount `screen` with a fresh scheduler
pub fn mount(screen: Screen, ctx: &ScreenContext) -> MountedScreen {
    info!("Mounting {} screen", screen);
    match screen {
        Screen::Screensaver => ScreensaverScreen::mount(ctx),
        Screen::Service => ServiceScreen::mount(ctx),
        Screen::History => HistoryScreen::mount(ctx),
        Screen::Notifications => NotificationsScreen::mount(ctx),
        Screen::Settings => SettingsScreen::mount(ctx),
    }
}
