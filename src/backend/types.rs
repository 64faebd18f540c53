use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kiosk identity as reported by `GET /device/info`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub serial_number: Option<String>,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    /// Assigned room id (or name, when that is all the backend knows)
    pub assigned_room: Option<String>,
    pub assigned_room_name: Option<String>,
    pub status: Option<String>,
}

/// Read-only copy of the backend's current session. Absent means no class is running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub class_id: String,
    pub teacher_id: Option<String>,
    pub teacher_name: Option<String>,
    pub class_name: Option<String>,
    pub started_at: Option<String>,
    pub profile_pic_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub teacher_id: String,
    pub teacher_name: String,
    pub class_id: String,
    pub class_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Teacher,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionStatus {
    Success,
    Denied,
    Unknown,
    /// The backend reports `service_inactive` (no class running for student matching)
    Inactive,
}

impl RecognitionStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" => RecognitionStatus::Success,
            "denied" => RecognitionStatus::Denied,
            "service_inactive" | "inactive" => RecognitionStatus::Inactive,
            _ => RecognitionStatus::Unknown,
        }
    }
}

/// One recognition candidate, normalized from whatever shape the backend sent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionSignal {
    pub subject: SubjectKind,
    pub id: Option<String>,
    pub name: Option<String>,
    pub status: RecognitionStatus,
    /// Face matched some enrolled record, even if not usable right now
    pub known: bool,
    /// Explicit registration flag, when the backend sends one
    pub registered: Option<bool>,
    pub profile_pic_url: Option<String>,
}

impl RecognitionSignal {
    pub fn is_success(&self) -> bool {
        self.status == RecognitionStatus::Success && self.id.is_some()
    }

    pub fn is_denied(&self) -> bool {
        self.id.is_some()
            && (self.status == RecognitionStatus::Denied || self.registered == Some(false))
    }
}

/// All candidates from one recognition poll
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionReading {
    pub candidates: Vec<RecognitionSignal>,
    /// Face count piggybacked on the recognition payload
    pub detected_faces: Option<u32>,
}

/// `GET /detect`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub faces: u32,
    pub known: bool,
}

/// `GET /unrecognized`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UnrecognizedReport {
    pub unrecognized: bool,
    /// Unix seconds of the last unrecognized detection
    pub ts: Option<f64>,
}

impl UnrecognizedReport {
    /// Whether the report is recent enough to show, relative to `now_unix`
    pub fn is_recent(&self, now_unix: f64, window_secs: f64) -> bool {
        match (self.unrecognized, self.ts) {
            (true, Some(ts)) => now_unix - ts < window_secs,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: Option<String>,
    pub assigned_teachers: Vec<String>,
    pub raw_doc: Option<String>,
}

/// Student or teacher name record from the lookup tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub firstname: String,
    pub lastname: String,
    pub profile_pic_url: Option<String>,
}

impl Person {
    /// "First Last", trimmed; empty when neither part is known
    pub fn display_name(&self) -> String {
        format!("{} {}", self.firstname.trim(), self.lastname.trim())
            .trim()
            .to_string()
    }

    /// "Last, First" as used on the roster panel
    pub fn roster_name(&self) -> String {
        let last = self.lastname.trim();
        let first = self.firstname.trim();
        match (last.is_empty(), first.is_empty()) {
            (false, false) => format!("{}, {}", last, first),
            (false, true) => last.to_string(),
            (true, false) => first.to_string(),
            (true, true) => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassOption {
    pub id: String,
    pub name: Option<String>,
    pub subject_name: Option<String>,
    pub grade_level: Option<String>,
    pub section: Option<String>,
}

impl ClassOption {
    /// Name sent to the backend when starting a session
    pub fn session_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.subject_name.clone())
            .unwrap_or_default()
    }

    /// Chooser label: subject (or class name) followed by grade and section, when known
    pub fn label(&self) -> String {
        let title = self
            .subject_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("Untitled");
        let detail = format!(
            "{} {}",
            self.grade_level.as_deref().unwrap_or(""),
            self.section.as_deref().unwrap_or("")
        );
        let detail = detail.trim();
        if detail.is_empty() {
            title.to_string()
        } else {
            format!("{} — {}", title, detail)
        }
    }
}

/// One past class session from `GET /session/history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Option<String>,
    pub class_id: Option<String>,
    pub teacher_id: Option<String>,
    pub teacher_name: Option<String>,
    pub teacher_profile_pic_url: Option<String>,
    /// First of subjectName, subject, class_name, class_code
    pub subject: Option<String>,
    pub room: Option<String>,
    pub time_started: Option<DateTime<Utc>>,
    pub time_ended: Option<DateTime<Utc>>,
    pub date: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub students_present_total: u32,
}

impl HistoryEntry {
    /// Timestamp used for newest-first ordering
    pub fn sort_key(&self) -> Option<DateTime<Utc>> {
        self.time_started.or(self.date).or(self.created_at)
    }

    /// Date printed on the card
    pub fn card_date(&self) -> Option<DateTime<Utc>> {
        self.date.or(self.created_at).or(self.time_started)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kiosk_id: Option<String>,
    pub room: Option<String>,
    pub title: String,
    pub kind: String,
    pub details: Option<serde_json::Value>,
    pub timestamp: Option<DateTime<Utc>>,
    pub is_read: bool,
}
