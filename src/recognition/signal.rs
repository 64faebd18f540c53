use crate::backend::{RecognitionSignal, RecognitionStatus};
use serde::Serialize;

/// Pick the candidate that speaks for the frame.
///
/// First successful match wins, then the first explicit denial, then whatever
/// came first. Backend order breaks ties.
pub fn select_candidate(candidates: &[RecognitionSignal]) -> Option<&RecognitionSignal> {
    candidates
        .iter()
        .find(|c| c.is_success())
        .or_else(|| candidates.iter().find(|c| c.is_denied()))
        .or_else(|| candidates.first())
}

/// A resolved person, compared by id only so that name or picture updates
/// between ticks do not restart a hold.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub id: String,
    pub name: Option<String>,
    pub profile_pic_url: Option<String>,
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Identity {}

impl Identity {
    pub fn new<S: Into<String>>(id: S, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
            profile_pic_url: None,
        }
    }

    /// Name to show, falling back to the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Successful match only; anything else is "nobody"
pub fn matched_identity(signal: Option<&RecognitionSignal>) -> Option<Identity> {
    let signal = signal?;
    if signal.status != RecognitionStatus::Success {
        return None;
    }
    let id = signal.id.clone()?;
    Some(Identity {
        id,
        name: signal.name.clone(),
        profile_pic_url: signal.profile_pic_url.clone(),
    })
}

/// What the student panel should say about one candidate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum StudentObservation {
    Present(String),
    Denied(String),
}

impl StudentObservation {
    pub fn from_signal(signal: &RecognitionSignal) -> Option<Self> {
        let id = signal.id.clone()?;
        if signal.is_success() {
            Some(StudentObservation::Present(id))
        } else if signal.is_denied() {
            Some(StudentObservation::Denied(id))
        } else {
            None
        }
    }

    pub fn id(&self) -> &str {
        match self {
            StudentObservation::Present(id) | StudentObservation::Denied(id) => id,
        }
    }
}
