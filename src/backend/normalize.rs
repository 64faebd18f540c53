//! Boundary normalisation: one function per entity.
//!
//! The backend has accumulated several spellings for the same concepts over
//! time. Everything past this module sees only the canonical types.

use super::types::*;
use crate::error::{BackendError, BackendResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// First present, non-placeholder string among `keys`. Numbers are stringified.
pub(crate) fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| obj.get(*key).and_then(as_clean_string))
}

fn as_clean_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            match trimmed.to_ascii_lowercase().as_str() {
                "" | "null" | "none" | "undefined" => None,
                _ => Some(trimmed.to_string()),
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    match obj.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn u32_field(obj: &Map<String, Value>, key: &str) -> Option<u32> {
    match obj.get(key)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
            .map(|v| v.min(u32::MAX as u64) as u32),
        Value::String(s) => s.trim().parse().ok(),
        Value::Array(items) => Some(items.len() as u32),
        _ => None,
    }
}

fn expect_object<'a>(value: &'a Value, entity: &str) -> BackendResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| BackendError::malformed(format!("{} payload is not an object", entity)))
}

/// Array found either at the root or under one of `keys`
fn list_at<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(obj) => keys
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_array)),
        _ => None,
    }
}

/// Parse the timestamp spellings the backend emits: RFC 3339, naive
/// `YYYY-MM-DD[ T]HH:MM:SS`, a bare date, unix seconds or milliseconds,
/// and Firestore `{seconds|_seconds}` objects.
pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => {
            let raw = raw.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
                return Some(dt.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }
            if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
            }
            raw.parse::<f64>().ok().and_then(from_unix)
        }
        Value::Number(n) => n.as_f64().and_then(from_unix),
        Value::Object(obj) => obj
            .get("seconds")
            .or_else(|| obj.get("_seconds"))
            .and_then(Value::as_i64)
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

fn from_unix(value: f64) -> Option<DateTime<Utc>> {
    // Anything this large is milliseconds
    let millis = if value > 1e11 { value } else { value * 1000.0 };
    Utc.timestamp_millis_opt(millis as i64).single()
}

fn timestamp_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter()
        .find_map(|key| obj.get(*key).and_then(parse_timestamp))
}

/// `{kiosk: {...}}`, `{device: {...}}` or the kiosk object itself. `None` when unregistered.
pub fn device_info(value: &Value) -> BackendResult<Option<DeviceInfo>> {
    let root = expect_object(value, "device info")?;

    let kiosk = if root.contains_key("kiosk") {
        root.get("kiosk")
    } else if root.contains_key("device") {
        root.get("device")
    } else {
        Some(value)
    };

    let kiosk = match kiosk {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(obj)) => obj,
        Some(_) => return Err(BackendError::malformed("kiosk is not an object")),
    };

    Ok(Some(DeviceInfo {
        id: string_field(kiosk, &["id", "fs_id", "kioskId"]),
        name: string_field(kiosk, &["name", "hostname"]),
        serial_number: string_field(kiosk, &["serialNumber", "serial_number", "serial"]),
        ip_address: string_field(kiosk, &["ipAddress", "ip_address", "ip"]),
        mac_address: string_field(kiosk, &["macAddress", "mac_address", "mac"]),
        assigned_room: ["assignedRoomId", "assignedRoom", "assignedRoomName", "roomId"]
            .iter()
            .find_map(|key| kiosk.get(*key).and_then(as_clean_string).filter(|room| is_real_room(room))),
        assigned_room_name: string_field(kiosk, &["assignedRoomName", "roomName"])
            .filter(|room| is_real_room(room)),
        status: string_field(kiosk, &["status"]),
    }))
}

// The backend fills the room name with "Unavailable" when it cannot resolve it
fn is_real_room(room: &str) -> bool {
    !room.eq_ignore_ascii_case("unavailable")
}

/// `{session: {...} | null}`. A session without a class id is no session.
pub fn session(value: &Value) -> BackendResult<Option<SessionSnapshot>> {
    let root = expect_object(value, "session")?;
    let session = match root.get("session") {
        None => return Err(BackendError::malformed("missing session field")),
        Some(Value::Null) => return Ok(None),
        Some(Value::Object(obj)) => obj,
        Some(_) => return Err(BackendError::malformed("session is not an object")),
    };

    let Some(class_id) = string_field(session, &["class_id", "classId"]) else {
        return Ok(None);
    };

    Ok(Some(SessionSnapshot {
        class_id,
        teacher_id: string_field(session, &["teacher_id", "teacherId"]),
        teacher_name: string_field(session, &["teacher_name", "teacherName"]),
        class_name: string_field(session, &["class_name", "className", "subjectName"]),
        started_at: string_field(session, &["started_at", "startedAt", "timeStarted"]),
        profile_pic_url: string_field(session, &["profilePicUrl", "teacher_profilePicUrl"]),
    }))
}

fn recognition_signal(obj: &Map<String, Value>, subject: SubjectKind) -> RecognitionSignal {
    let status = string_field(obj, &["status"])
        .map(|s| RecognitionStatus::parse(&s))
        .unwrap_or(RecognitionStatus::Unknown);

    let known = bool_field(obj, "known")
        .or_else(|| bool_field(obj, "detected_known"))
        .unwrap_or(false);

    RecognitionSignal {
        subject,
        id: string_field(obj, &["id", "student_id", "teacher_id"]),
        name: string_field(obj, &["name", "student_name", "teacher_name"]),
        status,
        known,
        registered: bool_field(obj, "registered"),
        profile_pic_url: string_field(obj, &["profilePicUrl", "profile_pic_url"]),
    }
}

/// Single object, bare array, or `{results|faces: [...]}`
pub fn recognition(value: &Value, subject: SubjectKind) -> BackendResult<RecognitionReading> {
    let (candidates, root) = match value {
        Value::Array(items) => (items.iter().collect::<Vec<_>>(), None),
        Value::Object(obj) => match list_at(value, &["results", "faces"]) {
            Some(items) => (items.iter().collect(), Some(obj)),
            None => (vec![value], Some(obj)),
        },
        _ => return Err(BackendError::malformed("recognition payload is not an object")),
    };

    let candidates = candidates
        .into_iter()
        .filter_map(Value::as_object)
        .map(|obj| recognition_signal(obj, subject))
        .collect();

    Ok(RecognitionReading {
        candidates,
        detected_faces: root.and_then(|obj| u32_field(obj, "detected")),
    })
}

/// `{faces, ts, known}`
pub fn detection(value: &Value) -> BackendResult<FaceDetection> {
    let obj = expect_object(value, "detection")?;
    Ok(FaceDetection {
        faces: u32_field(obj, "faces").unwrap_or(0),
        known: bool_field(obj, "known").unwrap_or(false),
    })
}

/// `{status: "unrecognized", ts}`; anything else reads as nothing to report
pub fn unrecognized(value: &Value) -> BackendResult<UnrecognizedReport> {
    let obj = expect_object(value, "unrecognized")?;
    let unrecognized = string_field(obj, &["status"])
        .map(|s| s.eq_ignore_ascii_case("unrecognized"))
        .unwrap_or(false);
    Ok(UnrecognizedReport {
        unrecognized,
        ts: obj.get("ts").and_then(Value::as_f64),
    })
}

/// `{studentsPresent: [id, ...]}`, ids as strings or numbers, order kept, duplicates dropped
pub fn roster(value: &Value) -> BackendResult<Vec<String>> {
    let items = list_at(value, &["studentsPresent", "students_present"])
        .ok_or_else(|| BackendError::malformed("missing studentsPresent"))?;

    let mut ids: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let id = match item {
            Value::Object(obj) => string_field(obj, &["id", "student_id"]),
            other => as_clean_string(other),
        };
        if let Some(id) = id {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    Ok(ids)
}

fn assigned_teachers(value: Option<&Value>) -> Vec<String> {
    let parsed;
    let value = match value {
        // Stored as a JSON string by the sync job
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(v) => {
                parsed = v;
                &parsed
            }
            Err(_) => return Vec::new(),
        },
        Some(v) => v,
        None => return Vec::new(),
    };

    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(obj) => string_field(obj, &["id", "teacher_id", "fs_id"]),
                other => as_clean_string(other),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// `{rooms: [...]}`
pub fn rooms(value: &Value) -> BackendResult<Vec<Room>> {
    let items = list_at(value, &["rooms"]).ok_or_else(|| BackendError::malformed("missing rooms"))?;

    Ok(items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| {
            let id = string_field(obj, &["fs_id", "id", "roomId"])?;
            Some(Room {
                id,
                name: string_field(obj, &["roomname", "roomName", "name"]),
                assigned_teachers: assigned_teachers(
                    obj.get("assignedteachers").or_else(|| obj.get("assignedTeachers")),
                ),
                raw_doc: match obj.get("raw_doc") {
                    Some(Value::String(raw)) => Some(raw.clone()),
                    Some(Value::Null) | None => None,
                    Some(other) => Some(other.to_string()),
                },
            })
        })
        .collect())
}

/// `{students: [...]}` or `{teachers: [...]}`
pub fn people(value: &Value, key: &str) -> BackendResult<Vec<Person>> {
    let items = list_at(value, &[key]).ok_or_else(|| BackendError::malformed(format!("missing {}", key)))?;

    Ok(items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| {
            Some(Person {
                id: string_field(obj, &["id", "fs_id"])?,
                firstname: string_field(obj, &["firstname", "firstName"]).unwrap_or_default(),
                lastname: string_field(obj, &["lastname", "lastName"]).unwrap_or_default(),
                profile_pic_url: string_field(obj, &["profilePicUrl"]),
            })
        })
        .collect())
}

/// `{classes: [...]}`
pub fn classes(value: &Value) -> BackendResult<Vec<ClassOption>> {
    let items = list_at(value, &["classes"]).ok_or_else(|| BackendError::malformed("missing classes"))?;

    Ok(items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| {
            Some(ClassOption {
                id: string_field(obj, &["id", "class_id", "fs_id"])?,
                name: string_field(obj, &["name", "class_name"]),
                subject_name: string_field(obj, &["subjectName", "subject"]),
                grade_level: string_field(obj, &["gradeLevel", "grade_level"]),
                section: string_field(obj, &["section"]),
            })
        })
        .collect())
}

fn history_entry(obj: &Map<String, Value>) -> HistoryEntry {
    let raw_teacher_pic = obj
        .get("raw_doc")
        .and_then(|doc| doc.get("teacher"))
        .and_then(|teacher| teacher.get("profilePicUrl"))
        .and_then(as_clean_string);

    HistoryEntry {
        id: string_field(obj, &["id", "fs_id"]),
        class_id: string_field(obj, &["class_id", "classId"]),
        teacher_id: string_field(obj, &["teacher_id", "teacherId"]),
        teacher_name: string_field(obj, &["teacher_name", "teacherName"]),
        teacher_profile_pic_url: string_field(obj, &["teacher_profilePicUrl"]).or(raw_teacher_pic),
        subject: string_field(obj, &["subjectName", "subject", "class_name", "class_code"]),
        room: string_field(obj, &["room_fs_id", "room", "roomId"]),
        time_started: timestamp_field(obj, &["timeStarted"]),
        time_ended: timestamp_field(obj, &["timeEnded"]),
        date: timestamp_field(obj, &["date"]),
        created_at: timestamp_field(obj, &["createdAt"]),
        students_present_total: u32_field(obj, "students_present_total")
            .or_else(|| u32_field(obj, "studentsPresent"))
            .unwrap_or(0),
    }
}

/// `{history: [...]}`
pub fn history(value: &Value) -> BackendResult<Vec<HistoryEntry>> {
    let items = list_at(value, &["history", "sessions"])
        .ok_or_else(|| BackendError::malformed("missing history"))?;

    Ok(items
        .iter()
        .filter_map(Value::as_object)
        .map(history_entry)
        .collect())
}

/// Bare array (what the backend sends) or `{notifications: [...]}`
pub fn notifications(value: &Value) -> BackendResult<Vec<Notification>> {
    let items = list_at(value, &["notifications"])
        .ok_or_else(|| BackendError::malformed("missing notifications"))?;

    Ok(items
        .iter()
        .filter_map(Value::as_object)
        .enumerate()
        .map(|(index, obj)| Notification {
            id: string_field(obj, &["notif_id", "id", "fs_id"]).unwrap_or_else(|| format!("local-{}", index)),
            kiosk_id: string_field(obj, &["kiosk_id", "kioskId"]),
            room: string_field(obj, &["room", "roomId"]),
            title: string_field(obj, &["title"]).unwrap_or_else(|| "Notification".to_string()),
            kind: string_field(obj, &["type", "kind"])
                .map(|t| t.to_ascii_lowercase())
                .unwrap_or_else(|| "info".to_string()),
            details: obj
                .get("details")
                .or_else(|| obj.get("raw_doc"))
                .filter(|v| !v.is_null())
                .cloned(),
            timestamp: timestamp_field(obj, &["timestamp", "createdAt"]),
            is_read: bool_field(obj, "is_read").unwrap_or(false),
        })
        .collect())
}

/// `{error: "code"}` as sent with non-2xx responses
pub fn error_code(value: &Value) -> Option<String> {
    value.as_object().and_then(|obj| string_field(obj, &["error", "code"]))
}
