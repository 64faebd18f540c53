use super::client::KioskBackend;
use super::types::*;
use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::time::Duration;

/// A backend call as recorded by [`MockBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    DeviceInfo,
    Session,
    StartSession(StartSessionRequest),
    StopSession,
    Attendance,
    Mark { student_id: String, student_name: String },
    RecognizeTeacher,
    RecognizeStudents,
    Detect,
    Unrecognized,
    CameraFrame,
    Rooms(Option<String>),
    Teachers(Vec<String>),
    Students(Vec<String>),
    Classes(String),
    History(u32),
    Notifications,
    Sync,
    Register(String),
}

struct MockState {
    device: BackendResult<Option<DeviceInfo>>,
    session: BackendResult<Option<SessionSnapshot>>,
    start_result: BackendResult<()>,
    stop_result: BackendResult<()>,
    roster: Vec<String>,
    mark_result: Option<BackendError>,
    teacher: BackendResult<RecognitionReading>,
    students_reading: BackendResult<RecognitionReading>,
    detection: BackendResult<FaceDetection>,
    unrecognized: BackendResult<UnrecognizedReport>,
    frame: BackendResult<Bytes>,
    kiosk_rooms: BackendResult<Vec<Room>>,
    all_rooms: BackendResult<Vec<Room>>,
    teacher_people: Vec<Person>,
    student_people: Vec<Person>,
    classes: BackendResult<Vec<ClassOption>>,
    history: BackendResult<Vec<HistoryEntry>>,
    notifications: BackendResult<Vec<Notification>>,
    sync_result: BackendResult<()>,
    registration: BackendResult<()>,
    /// Starting a session makes it show up on the next `session()` call
    follow_session: bool,
    delay: Option<Duration>,
}

/// In-memory backend for tests and `--dry-run`.
///
/// Every response is scriptable and every call is recorded.
pub struct MockBackend {
    state: Mutex<MockState>,
    calls: Mutex<Vec<BackendCall>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// An idle, unregistered-room backend: no session, no faces, empty tables
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                device: Ok(None),
                session: Ok(None),
                start_result: Ok(()),
                stop_result: Ok(()),
                roster: Vec::new(),
                mark_result: None,
                teacher: Ok(RecognitionReading::default()),
                students_reading: Ok(RecognitionReading::default()),
                detection: Ok(FaceDetection::default()),
                unrecognized: Ok(UnrecognizedReport::default()),
                frame: Err(BackendError::Backend {
                    status: 503,
                    code: Some("camera_unavailable".to_string()),
                }),
                kiosk_rooms: Ok(Vec::new()),
                all_rooms: Ok(Vec::new()),
                teacher_people: Vec::new(),
                student_people: Vec::new(),
                classes: Ok(Vec::new()),
                history: Ok(Vec::new()),
                notifications: Ok(Vec::new()),
                sync_result: Ok(()),
                registration: Ok(()),
                follow_session: true,
                delay: None,
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_device(&self, device: BackendResult<Option<DeviceInfo>>) {
        self.state.lock().device = device;
    }

    pub fn set_session(&self, session: BackendResult<Option<SessionSnapshot>>) {
        self.state.lock().session = session;
    }

    pub fn set_start_result(&self, result: BackendResult<()>) {
        self.state.lock().start_result = result;
    }

    pub fn set_stop_result(&self, result: BackendResult<()>) {
        self.state.lock().stop_result = result;
    }

    /// Whether start/stop calls update the scripted session
    pub fn set_follow_session(&self, follow: bool) {
        self.state.lock().follow_session = follow;
    }

    pub fn set_roster(&self, roster: Vec<String>) {
        self.state.lock().roster = roster;
    }

    pub fn set_mark_error(&self, error: Option<BackendError>) {
        self.state.lock().mark_result = error;
    }

    pub fn set_teacher_reading(&self, reading: BackendResult<RecognitionReading>) {
        self.state.lock().teacher = reading;
    }

    pub fn set_student_reading(&self, reading: BackendResult<RecognitionReading>) {
        self.state.lock().students_reading = reading;
    }

    pub fn set_detection(&self, detection: BackendResult<FaceDetection>) {
        self.state.lock().detection = detection;
    }

    pub fn set_unrecognized(&self, report: BackendResult<UnrecognizedReport>) {
        self.state.lock().unrecognized = report;
    }

    pub fn set_frame(&self, frame: BackendResult<Bytes>) {
        self.state.lock().frame = frame;
    }

    pub fn set_rooms(&self, by_kiosk: BackendResult<Vec<Room>>, all: BackendResult<Vec<Room>>) {
        let mut state = self.state.lock();
        state.kiosk_rooms = by_kiosk;
        state.all_rooms = all;
    }

    pub fn set_teachers(&self, teachers: Vec<Person>) {
        self.state.lock().teacher_people = teachers;
    }

    pub fn set_students(&self, students: Vec<Person>) {
        self.state.lock().student_people = students;
    }

    pub fn set_classes(&self, classes: BackendResult<Vec<ClassOption>>) {
        self.state.lock().classes = classes;
    }

    pub fn set_history(&self, history: BackendResult<Vec<HistoryEntry>>) {
        self.state.lock().history = history;
    }

    pub fn set_notifications(&self, notifications: BackendResult<Vec<Notification>>) {
        self.state.lock().notifications = notifications;
    }

    pub fn set_sync_result(&self, result: BackendResult<()>) {
        self.state.lock().sync_result = result;
    }

    pub fn set_registration_result(&self, result: BackendResult<()>) {
        self.state.lock().registration = result;
    }

    /// Delay every call by `delay` (to exercise timeouts and overlap)
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().delay = delay;
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| matches(call)).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    async fn record(&self, call: BackendCall) {
        self.calls.lock().push(call);
        let delay = self.state.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn filter_people(people: &[Person], ids: &[String]) -> Vec<Person> {
    people
        .iter()
        .filter(|person| ids.contains(&person.id))
        .cloned()
        .collect()
}

#[async_trait]
impl KioskBackend for MockBackend {
    async fn device_info(&self) -> BackendResult<Option<DeviceInfo>> {
        self.record(BackendCall::DeviceInfo).await;
        self.state.lock().device.clone()
    }

    async fn session(&self) -> BackendResult<Option<SessionSnapshot>> {
        self.record(BackendCall::Session).await;
        self.state.lock().session.clone()
    }

    async fn start_session(&self, request: &StartSessionRequest) -> BackendResult<()> {
        self.record(BackendCall::StartSession(request.clone())).await;
        let mut state = self.state.lock();
        let result = state.start_result.clone();
        if result.is_ok() && state.follow_session {
            state.session = Ok(Some(SessionSnapshot {
                class_id: request.class_id.clone(),
                teacher_id: Some(request.teacher_id.clone()),
                teacher_name: Some(request.teacher_name.clone()),
                class_name: Some(request.class_name.clone()),
                started_at: None,
                profile_pic_url: None,
            }));
        }
        result
    }

    async fn stop_session(&self) -> BackendResult<()> {
        self.record(BackendCall::StopSession).await;
        let mut state = self.state.lock();
        let result = state.stop_result.clone();
        if result.is_ok() && state.follow_session {
            state.session = Ok(None);
            state.roster.clear();
        }
        result
    }

    async fn attendance(&self) -> BackendResult<Vec<String>> {
        self.record(BackendCall::Attendance).await;
        Ok(self.state.lock().roster.clone())
    }

    async fn mark_attendance(&self, student_id: &str, student_name: &str) -> BackendResult<Vec<String>> {
        self.record(BackendCall::Mark {
            student_id: student_id.to_string(),
            student_name: student_name.to_string(),
        })
        .await;
        let mut state = self.state.lock();
        if let Some(error) = state.mark_result.clone() {
            return Err(error);
        }
        if !state.roster.iter().any(|id| id == student_id) {
            state.roster.push(student_id.to_string());
        }
        Ok(state.roster.clone())
    }

    async fn recognize_teacher(&self) -> BackendResult<RecognitionReading> {
        self.record(BackendCall::RecognizeTeacher).await;
        self.state.lock().teacher.clone()
    }

    async fn recognize_students(&self) -> BackendResult<RecognitionReading> {
        self.record(BackendCall::RecognizeStudents).await;
        self.state.lock().students_reading.clone()
    }

    async fn detect(&self) -> BackendResult<FaceDetection> {
        self.record(BackendCall::Detect).await;
        self.state.lock().detection.clone()
    }

    async fn unrecognized(&self) -> BackendResult<UnrecognizedReport> {
        self.record(BackendCall::Unrecognized).await;
        self.state.lock().unrecognized.clone()
    }

    async fn camera_frame(&self) -> BackendResult<Bytes> {
        self.record(BackendCall::CameraFrame).await;
        self.state.lock().frame.clone()
    }

    async fn rooms(&self, kiosk_id: Option<&str>) -> BackendResult<Vec<Room>> {
        self.record(BackendCall::Rooms(kiosk_id.map(str::to_string))).await;
        let state = self.state.lock();
        match kiosk_id {
            Some(_) => state.kiosk_rooms.clone(),
            None => state.all_rooms.clone(),
        }
    }

    async fn teachers(&self, ids: &[String]) -> BackendResult<Vec<Person>> {
        self.record(BackendCall::Teachers(ids.to_vec())).await;
        Ok(filter_people(&self.state.lock().teacher_people, ids))
    }

    async fn students(&self, ids: &[String]) -> BackendResult<Vec<Person>> {
        self.record(BackendCall::Students(ids.to_vec())).await;
        Ok(filter_people(&self.state.lock().student_people, ids))
    }

    async fn classes_for_teacher(&self, teacher_id: &str) -> BackendResult<Vec<ClassOption>> {
        self.record(BackendCall::Classes(teacher_id.to_string())).await;
        self.state.lock().classes.clone()
    }

    async fn history(&self, limit: u32) -> BackendResult<Vec<HistoryEntry>> {
        self.record(BackendCall::History(limit)).await;
        self.state.lock().history.clone()
    }

    async fn notifications(&self) -> BackendResult<Vec<Notification>> {
        self.record(BackendCall::Notifications).await;
        self.state.lock().notifications.clone()
    }

    async fn sync(&self) -> BackendResult<()> {
        self.record(BackendCall::Sync).await;
        self.state.lock().sync_result.clone()
    }

    async fn redeem_registration_code(&self, code: &str) -> BackendResult<()> {
        self.record(BackendCall::Register(code.to_string())).await;
        self.state.lock().registration.clone()
    }
}
