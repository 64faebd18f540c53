use super::{MountedScreen, Screen, ScreenContext, ScreenView};
use crate::backend::DeviceInfo;
use crate::config::PollingConfig;
use crate::events::{EventFilter, KioskEvent};
use crate::poller::{PollResult, PollerSpec, ScreenScheduler, SequenceGuard, SequenceSource};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, trace};

pub const ROOM_AVAILABLE: &str = "Available";
pub const ROOM_UNAVAILABLE: &str = "Unavailable";

/// Idle screen: the kiosk's room and whether it is assigned
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomInfoView {
    /// Assigned room, or "Unavailable"
    pub room: String,
    pub status: String,
    pub status_class: String,
    pub available: bool,
}

impl RoomInfoView {
    pub fn from_room(room: Option<&str>) -> Self {
        match room {
            Some(room) => Self {
                room: room.to_string(),
                status: ROOM_AVAILABLE.to_string(),
                status_class: "text-green-500".to_string(),
                available: true,
            },
            None => Self::unavailable(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            room: ROOM_UNAVAILABLE.to_string(),
            status: ROOM_UNAVAILABLE.to_string(),
            status_class: "text-yellow-500".to_string(),
            available: false,
        }
    }
}

fn room_of(device: Option<&DeviceInfo>) -> Option<String> {
    let device = device?;
    device
        .assigned_room
        .clone()
        .or_else(|| device.assigned_room_name.clone())
}

pub struct ScreensaverScreen;

impl ScreensaverScreen {
    pub fn mount(ctx: &ScreenContext) -> MountedScreen {
        let mut scheduler = ScreenScheduler::new("screensaver");
        let (tx, mut rx) = mpsc::unbounded_channel::<PollResult<Option<DeviceInfo>>>();
        let (command_tx, mut commands) = mpsc::unbounded_channel();
        let sequence = SequenceSource::new();

        let backend = Arc::clone(&ctx.backend);
        scheduler.poll(
            PollerSpec::new("device", PollingConfig::interval(ctx.config.polling.device))
                .with_timeout(ctx.config.backend.request_timeout()),
            sequence.clone(),
            move || {
                let backend = Arc::clone(&backend);
                async move { backend.device_info().await }
            },
            {
                let tx = tx.clone();
                move |result| {
                    let _ = tx.send(result);
                }
            },
        );

        let views = ctx.views.clone();
        let backend = Arc::clone(&ctx.backend);
        let mut events = ctx.event_bus.subscribe_filtered(
            EventFilter::EventTypes(vec!["room_assignment_updated"]),
            "screensaver",
        );

        scheduler.spawn("screensaver-loop", async move {
            let mut guard = SequenceGuard::new();
            let mut refetches = JoinSet::new();
            views.publish(ScreenView::Screensaver(RoomInfoView::unavailable()));

            loop {
                tokio::select! {
                    Some(result) = rx.recv() => {
                        if guard.admit(result.seq).is_err() {
                            continue;
                        }
                        if let Some(e) = &result.error {
                            trace!("Device info failed: {}", e);
                        }
                        // Any failure reads as unassigned
                        let room = room_of(result.payload.flatten().as_ref());
                        views.publish(ScreenView::Screensaver(RoomInfoView::from_room(room.as_deref())));
                    }
                    Ok(event) = events.recv() => {
                        if let KioskEvent::RoomAssignmentUpdated { room } = event {
                            match room {
                                Some(room) => {
                                    debug!("Room assignment pushed: {}", room);
                                    guard.admit(sequence.next()).ok();
                                    views.publish(ScreenView::Screensaver(RoomInfoView::from_room(Some(&room))));
                                }
                                None => {
                                    let backend = Arc::clone(&backend);
                                    let tx = tx.clone();
                                    let seq = sequence.next();
                                    refetches.spawn(async move {
                                        let result = backend.device_info().await;
                                        let _ = tx.send(PollResult::from_result(seq, result));
                                    });
                                }
                            }
                        }
                    }
                    Some(command) = commands.recv() => {
                        trace!("Screensaver ignores {:?}", command);
                    }
                    Some(_) = refetches.join_next(), if !refetches.is_empty() => {}
                }
            }
        });

        MountedScreen::new(Screen::Screensaver, scheduler, command_tx)
    }
}
