use super::attendance::MarkThrottle;
use super::authorization::Authorization;
use super::model::AttendanceRoster;
use super::view::*;
use crate::backend::{
    ClassOption, FaceDetection, Person, RecognitionReading, SessionSnapshot, StartSessionRequest,
    UnrecognizedReport,
};
use crate::config::RollcallConfig;
use crate::error::{BackendError, BackendResult};
use crate::events::{KioskEvent, OperatorCommand};
use crate::poller::{PollResult, SequenceGuard};
use crate::recognition::{
    matched_identity, select_candidate, Identity, Stabilizer, StudentObservation,
    UnrecognizedDetector,
};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, trace, warn};

pub const TOAST_STARTED: &str = "Service started";
pub const TOAST_STOPPED: &str = "Service stopped";
pub const TOAST_SCAN_TO_STOP: &str = "Scan face to stop service";
pub const TOAST_START_FAILED: &str = "Failed to start service";
pub const TOAST_STOP_FAILED: &str = "Failed to stop service";

/// Timing knobs for the view-model, lifted out of the config
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub teacher_hold: Duration,
    pub student_hold: Duration,
    pub unrecognized_decay: Duration,
    pub unrecognized_window_secs: f64,
    pub stop_timeout: Duration,
    pub mark_throttle: Duration,
    pub toast: Duration,
    pub unreachable_after_failures: u32,
}

impl SessionSettings {
    pub fn from_config(config: &RollcallConfig) -> Self {
        Self {
            teacher_hold: config.recognition.hold(),
            student_hold: config.recognition.student_hold(),
            unrecognized_decay: config.recognition.unrecognized_decay(),
            unrecognized_window_secs: config.recognition.unrecognized_window().as_secs_f64(),
            stop_timeout: config.session.stop_timeout(),
            mark_throttle: config.session.mark_throttle(),
            toast: config.session.toast(),
            unreachable_after_failures: config.session.unreachable_after_failures,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&RollcallConfig::default())
    }
}

/// Work the view-model asks its screen to do. Outcomes come back through
/// the matching `apply_*` method.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchSession,
    CheckAuthorization { teacher_id: String },
    FetchClasses { teacher_id: String },
    StartSession(StartSessionRequest),
    StopSession,
    MarkAttendance { student_id: String, student_name: String },
    ResolveStudentNames { ids: Vec<String> },
    /// Tell other screens the room assignment may have changed
    AnnounceRoom,
    Publish(KioskEvent),
}

#[derive(Debug, Clone)]
struct ClassChooser {
    teacher: Identity,
    loading: bool,
    classes: Vec<ClassOption>,
    selected: Option<String>,
}

#[derive(Debug, Default)]
struct StreamGuards {
    session: SequenceGuard,
    teacher: SequenceGuard,
    students: SequenceGuard,
    detect: SequenceGuard,
    unrecognized: SequenceGuard,
    roster: SequenceGuard,
}

fn admit(guard: &mut SequenceGuard, stream: &str, seq: u64) -> bool {
    match guard.admit(seq) {
        Ok(()) => true,
        Err(e) => {
            trace!("Dropping {} result: {}", stream, e);
            false
        }
    }
}

fn unix_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Composition of session, teacher, student, detection and roster streams
/// into one [`SessionView`].
///
/// Pure state machine: no I/O, time comes in as arguments and side effects
/// go out as [`Effect`]s.
pub struct SessionViewModel {
    settings: SessionSettings,
    guards: StreamGuards,

    session: Option<SessionSnapshot>,
    session_failures: u32,
    backend_unreachable: bool,

    teacher: Stabilizer<Identity>,
    teacher_in_frame: bool,
    authorization: Authorization,

    student: Stabilizer<StudentObservation>,
    pre_session_student: bool,

    faces: u32,
    faces_known: bool,
    unrecognized: UnrecognizedDetector,

    roster: AttendanceRoster,
    throttle: MarkThrottle,

    chooser: Option<ClassChooser>,
    starting: bool,
    stopping: bool,
    stop_pending_until: Option<Instant>,
    toast: Option<(String, Instant)>,
}

impl SessionViewModel {
    pub fn new(settings: SessionSettings, now: Instant) -> Self {
        Self {
            guards: StreamGuards::default(),
            session: None,
            session_failures: 0,
            backend_unreachable: false,
            teacher: Stabilizer::new(settings.teacher_hold, now),
            teacher_in_frame: false,
            authorization: Authorization::Pending,
            student: Stabilizer::new(settings.student_hold, now),
            pre_session_student: false,
            faces: 0,
            faces_known: false,
            unrecognized: UnrecognizedDetector::new(settings.teacher_hold, settings.unrecognized_decay),
            roster: AttendanceRoster::new(),
            throttle: MarkThrottle::new(settings.mark_throttle),
            chooser: None,
            starting: false,
            stopping: false,
            stop_pending_until: None,
            toast: None,
            settings,
        }
    }

    pub fn session(&self) -> Option<&SessionSnapshot> {
        self.session.as_ref()
    }

    pub fn is_stop_pending(&self) -> bool {
        self.stop_pending_until.is_some()
    }

    pub fn display_state(&self) -> DisplayState {
        if self.stop_pending_until.is_some() {
            DisplayState::PendingStop
        } else if self.session.is_some() {
            DisplayState::Active
        } else if self.teacher.state().is_some() {
            if self.authorization == Authorization::NotRegistered {
                DisplayState::NotRegistered
            } else {
                DisplayState::Recognized
            }
        } else if (self.faces > 0 && !self.pre_session_student) || self.teacher.pending().is_some() {
            DisplayState::Recognizing
        } else {
            DisplayState::Ready
        }
    }

    fn show_toast(&mut self, message: &str, now: Instant) {
        self.toast = Some((message.to_string(), now + self.settings.toast));
    }

    /// Reset everything derived from a session, immediately
    fn end_session(&mut self, now: Instant) {
        self.session = None;
        self.teacher.clear(now);
        self.teacher_in_frame = false;
        self.authorization = Authorization::Pending;
        self.student.clear(now);
        self.stop_pending_until = None;
        self.stopping = false;
        self.roster.clear();
        self.throttle.clear();
        self.unrecognized.reset();
    }

    pub fn apply_session(&mut self, result: PollResult<Option<SessionSnapshot>>, now: Instant) -> Vec<Effect> {
        if !admit(&mut self.guards.session, "session", result.seq) {
            return Vec::new();
        }

        if !result.ok {
            // A backend that answers with an error is up; only transport failures count
            if !result.error.as_ref().is_some_and(BackendError::is_network) {
                return Vec::new();
            }
            self.session_failures += 1;
            if self.session_failures >= self.settings.unreachable_after_failures && !self.backend_unreachable {
                warn!("Session poll failed {} times in a row", self.session_failures);
                self.backend_unreachable = true;
            }
            return Vec::new();
        }

        if self.backend_unreachable {
            info!("Session poll recovered");
        }
        self.session_failures = 0;
        self.backend_unreachable = false;

        let mut effects = Vec::new();
        let snapshot = result.payload.flatten();
        match (self.session.take(), snapshot) {
            (None, None) => {}
            (Some(previous), None) => {
                info!("Session for class {} ended", previous.class_id);
                self.end_session(now);
                self.show_toast(TOAST_STOPPED, now);
                effects.push(Effect::Publish(KioskEvent::SessionEnded {
                    timestamp: result.timestamp,
                }));
            }
            (previous, Some(next)) => {
                let is_new = previous
                    .as_ref()
                    .map(|p| p.class_id != next.class_id)
                    .unwrap_or(true);
                if is_new {
                    info!("Session for class {} is active", next.class_id);
                    self.show_toast(TOAST_STARTED, now);
                    self.chooser = None;
                    self.starting = false;
                    self.roster.clear();
                    self.throttle.clear();
                    self.student.clear(now);
                    self.unrecognized.reset();
                    effects.push(Effect::Publish(KioskEvent::SessionStarted {
                        class_id: next.class_id.clone(),
                        teacher_id: next.teacher_id.clone(),
                        timestamp: result.timestamp,
                    }));
                }
                self.session = Some(next);
            }
        }
        effects
    }

    pub fn apply_teacher(&mut self, result: PollResult<RecognitionReading>, now: Instant) -> Vec<Effect> {
        if !admit(&mut self.guards.teacher, "teacher", result.seq) {
            return Vec::new();
        }
        let Some(reading) = result.payload else {
            return Vec::new();
        };
        if let Some(faces) = reading.detected_faces {
            self.faces = faces;
        }

        let identity = matched_identity(select_candidate(&reading.candidates));
        self.teacher_in_frame = identity.is_some();

        let mut effects = Vec::new();
        match identity {
            None => {
                self.teacher.observe(None, now);
                if self.session.is_none() && self.teacher.state().is_some() {
                    debug!("Recognized teacher left the frame");
                    self.teacher.clear(now);
                    self.authorization = Authorization::Pending;
                }
            }
            Some(identity) => {
                if self.teacher.observe(Some(identity), now) {
                    if let Some(teacher) = self.teacher.state().cloned() {
                        effects.extend(self.on_teacher_stabilized(teacher));
                    }
                }
            }
        }

        self.refresh_unrecognized(now);
        effects
    }

    fn on_teacher_stabilized(&mut self, teacher: Identity) -> Vec<Effect> {
        if self.stop_pending_until.is_some() {
            return self.try_stop(&teacher);
        }
        if self.session.is_some() {
            return Vec::new();
        }

        info!("Teacher {} recognized", teacher.id);
        self.authorization = Authorization::Pending;
        vec![Effect::CheckAuthorization {
            teacher_id: teacher.id,
        }]
    }

    fn try_stop(&mut self, teacher: &Identity) -> Vec<Effect> {
        if self.stopping {
            return Vec::new();
        }
        let owner = self.session.as_ref().and_then(|s| s.teacher_id.as_deref());
        if owner != Some(teacher.id.as_str()) {
            info!(
                "Teacher {} re-scanned but session belongs to {:?}; not stopping",
                teacher.id, owner
            );
            return Vec::new();
        }

        info!("Teacher {} confirmed stop", teacher.id);
        self.stopping = true;
        vec![Effect::StopSession]
    }

    pub fn apply_students(&mut self, result: PollResult<RecognitionReading>, now: Instant) -> Vec<Effect> {
        if !admit(&mut self.guards.students, "students", result.seq) {
            return Vec::new();
        }
        let Some(reading) = result.payload else {
            return Vec::new();
        };
        if let Some(faces) = reading.detected_faces {
            self.faces = faces;
        }

        let candidate = select_candidate(&reading.candidates);

        if self.session.is_none() {
            // Students are ignored before a session, but a known face is not "unrecognized"
            self.pre_session_student = candidate
                .map(|c| c.is_success() || c.known)
                .unwrap_or(false);
            self.student.clear(now);
            self.refresh_unrecognized(now);
            return Vec::new();
        }
        self.pre_session_student = false;

        if let Some(candidate) = candidate {
            if let (Some(id), Some(name)) = (&candidate.id, &candidate.name) {
                self.roster.learn_name(id, name);
            }
        }

        let Some(observation) = candidate.and_then(StudentObservation::from_signal) else {
            self.student.clear(now);
            return Vec::new();
        };

        self.student.observe(Some(observation.clone()), now);

        match self.student.state() {
            Some(StudentObservation::Present(id)) if *id == observation.id() => {
                let id = id.clone();
                self.maybe_mark(&id, now)
            }
            _ => Vec::new(),
        }
    }

    fn maybe_mark(&mut self, student_id: &str, now: Instant) -> Vec<Effect> {
        if self.roster.contains(student_id) {
            return Vec::new();
        }
        if !self.throttle.try_acquire(student_id, now) {
            trace!("Mark for {} throttled", student_id);
            return Vec::new();
        }
        let student_name = self.roster.name_of(student_id).unwrap_or_default().to_string();
        debug!("Marking student {} present", student_id);
        vec![Effect::MarkAttendance {
            student_id: student_id.to_string(),
            student_name,
        }]
    }

    pub fn apply_detection(&mut self, result: PollResult<FaceDetection>, now: Instant) {
        if !admit(&mut self.guards.detect, "detect", result.seq) {
            return;
        }
        if let Some(detection) = result.payload {
            self.faces = detection.faces;
            self.faces_known = detection.known;
        }
        self.refresh_unrecognized(now);
    }

    pub fn apply_unrecognized(&mut self, result: PollResult<UnrecognizedReport>) {
        if !admit(&mut self.guards.unrecognized, "unrecognized", result.seq) {
            return;
        }
        if let Some(report) = result.payload {
            let recent = report.is_recent(
                unix_seconds(result.timestamp),
                self.settings.unrecognized_window_secs,
            );
            self.unrecognized
                .set_backend_report(recent && self.session.is_none());
        }
    }

    fn refresh_unrecognized(&mut self, now: Instant) {
        let unmatched = self.session.is_none()
            && self.faces > 0
            && !self.faces_known
            && !self.pre_session_student
            && !self.teacher_in_frame
            && self.teacher.state().is_none();
        self.unrecognized.observe(unmatched, now);
    }

    pub fn apply_roster(&mut self, result: PollResult<Vec<String>>) -> Vec<Effect> {
        if !admit(&mut self.guards.roster, "roster", result.seq) {
            return Vec::new();
        }
        let Some(ids) = result.payload else {
            return Vec::new();
        };
        if self.session.is_none() {
            self.roster.clear();
            return Vec::new();
        }

        let missing = self.roster.replace(ids);
        if missing.is_empty() {
            Vec::new()
        } else {
            vec![Effect::ResolveStudentNames { ids: missing }]
        }
    }

    pub fn apply_student_names(&mut self, result: BackendResult<Vec<Person>>) {
        match result {
            Ok(people) => self.roster.set_names(&people),
            Err(e) => debug!("Student name lookup failed, showing ids: {}", e),
        }
    }

    pub fn apply_mark_result(&mut self, student_id: &str, result: BackendResult<Vec<String>>) -> Vec<Effect> {
        match result {
            Ok(ids) => {
                if self.session.is_none() {
                    return Vec::new();
                }
                let missing = self.roster.replace(ids);
                info!("Student {} marked present", student_id);
                let mut effects = vec![Effect::Publish(KioskEvent::AttendanceMarked {
                    student_id: student_id.to_string(),
                    present_count: self.roster.len(),
                })];
                if !missing.is_empty() {
                    effects.push(Effect::ResolveStudentNames { ids: missing });
                }
                effects
            }
            Err(e) => {
                warn!("Failed to mark student {}: {}", student_id, e);
                Vec::new()
            }
        }
    }

    pub fn apply_authorization(&mut self, teacher_id: &str, authorization: Authorization) {
        match self.teacher.state() {
            Some(teacher) if teacher.id == teacher_id => {
                info!("Teacher {} authorization: {:?}", teacher_id, authorization);
                self.authorization = authorization;
            }
            _ => trace!("Dropping authorization for departed teacher {}", teacher_id),
        }
    }

    pub fn apply_classes(&mut self, teacher_id: &str, result: BackendResult<Vec<ClassOption>>) {
        let Some(chooser) = self.chooser.as_mut() else {
            return;
        };
        if chooser.teacher.id != teacher_id {
            return;
        }
        chooser.loading = false;
        chooser.classes = match result {
            Ok(classes) => classes,
            Err(e) => {
                warn!("Failed to load classes for {}: {}", teacher_id, e);
                Vec::new()
            }
        };
        chooser.selected = chooser.classes.first().map(|c| c.id.clone());
    }

    pub fn apply_start_result(&mut self, result: BackendResult<()>, now: Instant) -> Vec<Effect> {
        self.starting = false;
        match result {
            Ok(()) => vec![Effect::FetchSession, Effect::AnnounceRoom],
            Err(e) => {
                warn!("Failed to start session: {}", e);
                self.show_toast(TOAST_START_FAILED, now);
                Vec::new()
            }
        }
    }

    pub fn apply_stop_result(&mut self, result: BackendResult<()>, now: Instant) -> Vec<Effect> {
        self.stopping = false;
        self.stop_pending_until = None;
        match result {
            Ok(()) => {
                self.show_toast(TOAST_STOPPED, now);
                vec![Effect::FetchSession]
            }
            Err(e) => {
                warn!("Failed to stop session: {}", e);
                self.show_toast(TOAST_STOP_FAILED, now);
                Vec::new()
            }
        }
    }

    pub fn handle_command(&mut self, command: &OperatorCommand, now: Instant) -> Vec<Effect> {
        match command {
            OperatorCommand::OpenClassChooser => self.open_chooser(),
            OperatorCommand::ConfirmStart { class_id } => self.confirm_start(class_id.as_deref()),
            OperatorCommand::CancelClassChooser => {
                self.chooser = None;
                Vec::new()
            }
            OperatorCommand::RequestStop => {
                if self.session.is_none() || self.stop_pending_until.is_some() || self.stopping {
                    return Vec::new();
                }
                info!("Stop requested, waiting for the session's teacher to re-scan");
                self.stop_pending_until = Some(now + self.settings.stop_timeout);
                // Only an observation made after the request counts
                self.teacher.clear(now);
                self.show_toast(TOAST_SCAN_TO_STOP, now);
                Vec::new()
            }
            OperatorCommand::CancelStop => {
                if !self.stopping {
                    self.stop_pending_until = None;
                }
                Vec::new()
            }
            OperatorCommand::Refresh => vec![Effect::FetchSession],
            _ => Vec::new(),
        }
    }

    fn open_chooser(&mut self) -> Vec<Effect> {
        if self.display_state() != DisplayState::Recognized {
            debug!("Class chooser needs a recognized teacher");
            return Vec::new();
        }
        let Some(teacher) = self.teacher.state().cloned() else {
            return Vec::new();
        };
        let teacher_id = teacher.id.clone();
        self.chooser = Some(ClassChooser {
            teacher,
            loading: true,
            classes: Vec::new(),
            selected: None,
        });
        vec![Effect::FetchClasses { teacher_id }, Effect::AnnounceRoom]
    }

    fn confirm_start(&mut self, class_id: Option<&str>) -> Vec<Effect> {
        if self.starting || self.session.is_some() {
            return Vec::new();
        }
        let Some(teacher) = self.teacher.state().cloned() else {
            warn!("Start confirmed without a recognized teacher");
            return Vec::new();
        };
        match self.authorization {
            Authorization::Registered => {}
            Authorization::NotRegistered => {
                warn!("Teacher {} is not registered in this room", teacher.id);
                return Vec::new();
            }
            Authorization::Pending => {
                debug!("Authorization for {} still pending", teacher.id);
                return Vec::new();
            }
        }

        let chosen = class_id
            .map(str::to_string)
            .or_else(|| self.chooser.as_ref().and_then(|c| c.selected.clone()));
        let Some(class_id) = chosen else {
            warn!("Start confirmed without a class");
            return Vec::new();
        };
        let class_name = self
            .chooser
            .as_ref()
            .and_then(|c| c.classes.iter().find(|class| class.id == class_id))
            .map(ClassOption::session_name)
            .unwrap_or_default();

        info!("Starting session for class {} with teacher {}", class_id, teacher.id);
        self.starting = true;
        self.chooser = None;
        vec![Effect::StartSession(StartSessionRequest {
            teacher_id: teacher.id,
            teacher_name: teacher.name.unwrap_or_default(),
            class_id,
            class_name,
        })]
    }

    /// Advance timers: toast expiry, stop-request timeout, banner decay
    pub fn tick(&mut self, now: Instant) {
        if matches!(&self.toast, Some((_, until)) if now >= *until) {
            self.toast = None;
        }

        if let Some(until) = self.stop_pending_until {
            if now >= until && !self.stopping {
                info!("Stop request timed out, session stays active");
                self.stop_pending_until = None;
            }
        }

        self.unrecognized.expire(now);
    }

    pub fn view(&self, now: Instant) -> SessionView {
        let state = self.display_state();
        let teacher = match self.session {
            None => self.teacher.state().cloned(),
            Some(_) => None,
        };

        let top_bar = match &self.session {
            Some(session) => TopBar {
                teacher_name: session.teacher_name.clone(),
                class_name: session.class_name.clone(),
                profile_pic_url: session.profile_pic_url.clone(),
                title: "Active".to_string(),
            },
            None => TopBar {
                teacher_name: None,
                class_name: None,
                profile_pic_url: None,
                title: SERVICE_INACTIVE.to_string(),
            },
        };

        let student = match (&self.session, self.student.state()) {
            (None, _) => StudentPanel {
                name: NOT_AVAILABLE.to_string(),
                status: SERVICE_INACTIVE.to_string(),
            },
            (Some(_), None) => StudentPanel {
                name: DETECTING_FACES.to_string(),
                status: DETECTING_FACES.to_string(),
            },
            (Some(_), Some(observation)) => StudentPanel {
                name: self
                    .roster
                    .name_of(observation.id())
                    .unwrap_or(UNKNOWN_STUDENT)
                    .to_string(),
                status: match observation {
                    StudentObservation::Present(_) => STUDENT_PRESENT.to_string(),
                    StudentObservation::Denied(_) => STUDENT_DENIED.to_string(),
                },
            },
        };

        let class_chooser = self.chooser.as_ref().map(|chooser| ClassChooserView {
            teacher_name: chooser.teacher.display_name().to_string(),
            loading: chooser.loading,
            classes: chooser
                .classes
                .iter()
                .map(|class| ClassChoice {
                    id: class.id.clone(),
                    label: class.label(),
                })
                .collect(),
            selected: chooser.selected.clone(),
        });

        let banner = matches!(state, DisplayState::Ready | DisplayState::Recognizing)
            && self.unrecognized.banner_visible(now);

        SessionView {
            state,
            label: state.label(teacher.as_ref().and_then(|t| t.name.as_deref())),
            circle_class: state.circle_class(),
            text_class: state.text_class(),
            border_class: state.border_class(),
            top_bar,
            student,
            roster: self.roster.entries(),
            present_count: self.roster.len(),
            session: self.session.clone(),
            teacher,
            authorization: self.authorization,
            faces: self.faces,
            toast: self
                .toast
                .as_ref()
                .filter(|(_, until)| now < *until)
                .map(|(message, _)| message.clone()),
            unrecognized_banner: banner.then(|| UNRECOGNIZED_BANNER.to_string()),
            backend_unreachable: self.backend_unreachable,
            class_chooser,
            starting: self.starting,
            stopping: self.stopping,
            pending_stop_remaining_secs: self.stop_pending_until.map(|until| {
                let remaining = until.saturating_duration_since(now).as_millis() as u64;
                remaining.div_ceil(1000)
            }),
        }
    }
}
