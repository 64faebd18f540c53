use super::authorization::Authorization;
use super::model::PresentStudent;
use crate::backend::SessionSnapshot;
use crate::recognition::Identity;
use serde::Serialize;
use std::fmt;

pub const NOT_AVAILABLE: &str = "Not Available";
pub const SERVICE_INACTIVE: &str = "Service inactive";
pub const DETECTING_FACES: &str = "Detecting faces...";
pub const STUDENT_PRESENT: &str = "Present";
pub const STUDENT_DENIED: &str = "Denied - Not registered";
pub const UNKNOWN_STUDENT: &str = "Unknown";
pub const UNRECOGNIZED_BANNER: &str = "Unidentified face detected";

/// Discrete state of the service screen's status pill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    Ready,
    Recognizing,
    Recognized,
    Active,
    PendingStop,
    NotRegistered,
}

impl DisplayState {
    pub fn label(&self, teacher_name: Option<&str>) -> String {
        match self {
            DisplayState::Ready => DETECTING_FACES.to_string(),
            DisplayState::Recognizing => "Recognizing face...".to_string(),
            DisplayState::Recognized => {
                format!("{} — Start service", teacher_name.unwrap_or("Teacher"))
            }
            DisplayState::Active => "Active".to_string(),
            DisplayState::PendingStop => "Scan face to stop service".to_string(),
            DisplayState::NotRegistered => "You are not registered in this room".to_string(),
        }
    }

    pub fn circle_class(&self) -> &'static str {
        match self {
            DisplayState::Ready => "bg-white",
            DisplayState::Recognizing => "bg-yellow-300",
            DisplayState::Recognized => "bg-yellow-400",
            DisplayState::Active => "bg-red-500",
            DisplayState::PendingStop => "bg-blue-400",
            DisplayState::NotRegistered => "bg-red-500",
        }
    }

    pub fn text_class(&self) -> &'static str {
        match self {
            DisplayState::Ready => "text-white",
            DisplayState::Recognizing => "text-yellow-300",
            DisplayState::Recognized => "text-yellow-400",
            DisplayState::Active => "text-green-400",
            DisplayState::PendingStop => "text-blue-400",
            DisplayState::NotRegistered => "text-red-400",
        }
    }

    pub fn border_class(&self) -> &'static str {
        match self {
            DisplayState::Ready => "border-white",
            DisplayState::Recognizing => "border-yellow-300",
            DisplayState::Recognized => "border-yellow-400",
            DisplayState::Active => "border-green-400",
            DisplayState::PendingStop => "border-blue-400",
            DisplayState::NotRegistered => "border-red-400",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayState::Ready => "ready",
            DisplayState::Recognizing => "recognizing",
            DisplayState::Recognized => "recognized",
            DisplayState::Active => "active",
            DisplayState::PendingStop => "pending_stop",
            DisplayState::NotRegistered => "not_registered",
        }
    }
}

impl fmt::Display for DisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopBar {
    /// Only filled while a session is active
    pub teacher_name: Option<String>,
    pub class_name: Option<String>,
    pub profile_pic_url: Option<String>,
    /// "Active" or "Service inactive"
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentPanel {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassChoice {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassChooserView {
    pub teacher_name: String,
    pub loading: bool,
    pub classes: Vec<ClassChoice>,
    pub selected: Option<String>,
}

/// Everything the service screen renders, published atomically per update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub state: DisplayState,
    pub label: String,
    pub circle_class: &'static str,
    pub text_class: &'static str,
    pub border_class: &'static str,
    pub top_bar: TopBar,
    pub student: StudentPanel,
    pub roster: Vec<PresentStudent>,
    pub present_count: usize,
    pub session: Option<SessionSnapshot>,
    /// Teacher recognized before a session starts
    pub teacher: Option<Identity>,
    pub authorization: Authorization,
    pub faces: u32,
    pub toast: Option<String>,
    pub unrecognized_banner: Option<String>,
    pub backend_unreachable: bool,
    pub class_chooser: Option<ClassChooserView>,
    pub starting: bool,
    pub stopping: bool,
    pub pending_stop_remaining_secs: Option<u64>,
}

impl SessionView {
    /// The view shown before any poll has landed
    pub fn initial() -> Self {
        let state = DisplayState::Ready;
        Self {
            state,
            label: state.label(None),
            circle_class: state.circle_class(),
            text_class: state.text_class(),
            border_class: state.border_class(),
            top_bar: TopBar {
                teacher_name: None,
                class_name: None,
                profile_pic_url: None,
                title: SERVICE_INACTIVE.to_string(),
            },
            student: StudentPanel {
                name: NOT_AVAILABLE.to_string(),
                status: SERVICE_INACTIVE.to_string(),
            },
            roster: Vec::new(),
            present_count: 0,
            session: None,
            teacher: None,
            authorization: Authorization::Pending,
            faces: 0,
            toast: None,
            unrecognized_banner: None,
            backend_unreachable: false,
            class_chooser: None,
            starting: false,
            stopping: false,
            pending_stop_remaining_secs: None,
        }
    }
}

impl Default for SessionView {
    fn default() -> Self {
        Self::initial()
    }
}
