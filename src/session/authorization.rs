use crate::backend::{KioskBackend, Room};
use serde::Serialize;
use tracing::{debug, warn};

/// Whether the recognized teacher may start a class in this kiosk's room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Authorization {
    Pending,
    Registered,
    NotRegistered,
}

/// The kiosk's room: the assigned one if listed, else the first listed
pub fn pick_room<'a>(rooms: &'a [Room], assigned: Option<&str>) -> Option<&'a Room> {
    assigned
        .and_then(|assigned| rooms.iter().find(|room| room.id == assigned))
        .or_else(|| rooms.first())
}

pub fn teacher_in_room(room: &Room, teacher_id: &str) -> bool {
    if room.assigned_teachers.iter().any(|id| id == teacher_id) {
        return true;
    }
    // Older syncs only kept the raw document
    room.raw_doc
        .as_deref()
        .map(|doc| !teacher_id.is_empty() && doc.contains(teacher_id))
        .unwrap_or(false)
}

/// Cross-reference the teacher against the room's assigned teachers.
///
/// Fails closed: any lookup failure is `NotRegistered`.
pub async fn check_teacher_authorization(backend: &dyn KioskBackend, teacher_id: &str) -> Authorization {
    let device = match backend.device_info().await {
        Ok(Some(device)) => device,
        Ok(None) => {
            warn!("Kiosk is not registered; teacher {} not authorized", teacher_id);
            return Authorization::NotRegistered;
        }
        Err(e) => {
            warn!("Device lookup failed during authorization: {}", e);
            return Authorization::NotRegistered;
        }
    };

    let mut rooms = Vec::new();
    if let Some(kiosk_id) = device.id.as_deref() {
        match backend.rooms(Some(kiosk_id)).await {
            Ok(found) => rooms = found,
            Err(e) => debug!("Rooms by kiosk lookup failed, trying all rooms: {}", e),
        }
    }
    if rooms.is_empty() {
        match backend.rooms(None).await {
            Ok(found) => rooms = found,
            Err(e) => {
                warn!("Room lookup failed during authorization: {}", e);
                return Authorization::NotRegistered;
            }
        }
    }

    let Some(room) = pick_room(&rooms, device.assigned_room.as_deref()) else {
        warn!("No rooms known to the backend; teacher {} not authorized", teacher_id);
        return Authorization::NotRegistered;
    };

    if teacher_in_room(room, teacher_id) {
        debug!("Teacher {} is assigned to room {}", teacher_id, room.id);
        Authorization::Registered
    } else {
        debug!("Teacher {} is not assigned to room {}", teacher_id, room.id);
        Authorization::NotRegistered
    }
}
