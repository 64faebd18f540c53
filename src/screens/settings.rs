use super::{MountedScreen, Screen, ScreenContext, ScreenView};
use crate::backend::{DeviceInfo, KioskBackend};
use crate::events::{KioskEvent, OperatorCommand};
use crate::poller::{fetch_with_timeout, ScreenScheduler};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub const NOT_ASSIGNED: &str = "Not Assigned";
const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KioskInfo {
    pub serial_number: String,
    pub hostname: String,
    pub ip_address: String,
    pub mac_address: String,
    pub assigned_room: String,
    pub app_version: String,
}

impl KioskInfo {
    pub fn from_device(device: Option<&DeviceInfo>) -> Self {
        let field = |value: Option<&String>| {
            value.cloned().unwrap_or_else(|| UNKNOWN.to_string())
        };
        Self {
            serial_number: field(device.and_then(|d| d.serial_number.as_ref())),
            hostname: field(device.and_then(|d| d.name.as_ref().or(d.id.as_ref()))),
            ip_address: field(device.and_then(|d| d.ip_address.as_ref())),
            mac_address: field(device.and_then(|d| d.mac_address.as_ref())),
            assigned_room: device
                .and_then(|d| d.assigned_room_name.clone().or_else(|| d.assigned_room.clone()))
                .unwrap_or_else(|| NOT_ASSIGNED.to_string()),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsView {
    pub loading: bool,
    pub refreshing: bool,
    pub kiosk: KioskInfo,
    pub error: Option<String>,
}

async fn fetch_kiosk(backend: &dyn KioskBackend, timeout: Duration) -> Result<Option<DeviceInfo>, String> {
    fetch_with_timeout(backend.device_info(), Some(timeout))
        .await
        .map_err(|e| {
            warn!("Failed to fetch device info: {}", e);
            "Failed to load kiosk information".to_string()
        })
}

pub struct SettingsScreen;

impl SettingsScreen {
    pub fn mount(ctx: &ScreenContext) -> MountedScreen {
        let mut scheduler = ScreenScheduler::new("settings");
        let (command_tx, mut commands) = mpsc::unbounded_channel();

        let backend = Arc::clone(&ctx.backend);
        let event_bus = Arc::clone(&ctx.event_bus);
        let views = ctx.views.clone();
        let timeout = ctx.config.backend.request_timeout();

        scheduler.spawn("settings-loop", async move {
            let mut view = SettingsView {
                loading: true,
                refreshing: false,
                kiosk: KioskInfo::from_device(None),
                error: None,
            };
            views.publish(ScreenView::Settings(view.clone()));

            let device = fetch_kiosk(backend.as_ref(), timeout).await;
            view.loading = false;
            match device {
                Ok(device) => view.kiosk = KioskInfo::from_device(device.as_ref()),
                Err(message) => view.error = Some(message),
            }
            views.publish(ScreenView::Settings(view.clone()));

            while let Some(command) = commands.recv().await {
                if command != OperatorCommand::Refresh {
                    continue;
                }

                // "Refresh Rooms": sync from the cloud, then re-read the device
                view.refreshing = true;
                views.publish(ScreenView::Settings(view.clone()));

                if let Err(e) = backend.sync().await {
                    warn!("Room refresh sync failed: {}", e);
                }
                match fetch_kiosk(backend.as_ref(), timeout).await {
                    Ok(device) => {
                        let room = device.as_ref().and_then(|d| d.assigned_room.clone());
                        view.kiosk = KioskInfo::from_device(device.as_ref());
                        view.error = None;
                        info!("Kiosk room after refresh: {}", view.kiosk.assigned_room);
                        let _ = event_bus.publish_now(KioskEvent::RoomAssignmentUpdated { room });
                    }
                    Err(message) => view.error = Some(message),
                }
                view.refreshing = false;
                views.publish(ScreenView::Settings(view.clone()));
            }
        });

        MountedScreen::new(Screen::Settings, scheduler, command_tx)
    }
}
