//! Session view-model: what the service screen should show.

mod attendance;
mod authorization;
mod model;
mod view;
mod view_model;
#[cfg(test)]
mod tests;

pub use attendance::MarkThrottle;
pub use authorization::{check_teacher_authorization, pick_room, teacher_in_room, Authorization};
pub use model::{AttendanceRoster, PresentStudent};
pub use view::*;
pub use view_model::{
    Effect, SessionSettings, SessionViewModel, TOAST_SCAN_TO_STOP, TOAST_STARTED,
    TOAST_START_FAILED, TOAST_STOPPED, TOAST_STOP_FAILED,
};
