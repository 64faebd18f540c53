use super::*;
use crate::backend::{
    ClassOption, DeviceInfo, FaceDetection, MockBackend, Person, RecognitionReading,
    RecognitionSignal, RecognitionStatus, Room, SessionSnapshot, SubjectKind,
};
use crate::error::BackendError;
use crate::events::{KioskEvent, OperatorCommand};
use crate::poller::PollResult;
use std::time::{Duration, Instant};

/// Drives a view-model with a fake clock and a shared tick counter
struct Harness {
    vm: SessionViewModel,
    base: Instant,
    seq: u64,
}

impl Harness {
    fn new() -> Self {
        let base = Instant::now();
        Self {
            vm: SessionViewModel::new(SessionSettings::default(), base),
            base,
            seq: 0,
        }
    }

    fn at(&self, millis: u64) -> Instant {
        self.base + Duration::from_millis(millis)
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn session(&mut self, snapshot: Option<SessionSnapshot>, millis: u64) -> Vec<Effect> {
        let seq = self.next_seq();
        let now = self.at(millis);
        self.vm.apply_session(PollResult::success(seq, snapshot), now)
    }

    fn session_failure(&mut self, millis: u64) -> Vec<Effect> {
        let seq = self.next_seq();
        let now = self.at(millis);
        self.vm
            .apply_session(PollResult::failure(seq, BackendError::network("down")), now)
    }

    fn teacher(&mut self, signals: Vec<RecognitionSignal>, millis: u64) -> Vec<Effect> {
        let seq = self.next_seq();
        let now = self.at(millis);
        self.vm.apply_teacher(PollResult::success(seq, reading(signals)), now)
    }

    fn students(&mut self, signals: Vec<RecognitionSignal>, millis: u64) -> Vec<Effect> {
        let seq = self.next_seq();
        let now = self.at(millis);
        self.vm.apply_students(PollResult::success(seq, reading(signals)), now)
    }

    /// Same teacher every 500ms from `from` through `to` inclusive
    fn hold_teacher(&mut self, id: &str, name: &str, from: u64, to: u64) -> Vec<Effect> {
        let mut effects = Vec::new();
        let mut t = from;
        while t <= to {
            effects.extend(self.teacher(vec![teacher(id, name)], t));
            t += 500;
        }
        effects
    }

    fn hold_student(&mut self, id: &str, from: u64, to: u64) -> Vec<Effect> {
        let mut effects = Vec::new();
        let mut t = from;
        while t <= to {
            effects.extend(self.students(vec![student(id, RecognitionStatus::Success)], t));
            t += 500;
        }
        effects
    }

    fn command(&mut self, command: OperatorCommand, millis: u64) -> Vec<Effect> {
        let now = self.at(millis);
        self.vm.handle_command(&command, now)
    }

    fn view(&self, millis: u64) -> SessionView {
        self.vm.view(self.at(millis))
    }

    /// A session owned by T1, already applied
    fn active() -> Self {
        let mut harness = Self::new();
        harness.session(Some(snapshot("C1", "T1")), 0);
        harness
    }
}

fn teacher(id: &str, name: &str) -> RecognitionSignal {
    RecognitionSignal {
        subject: SubjectKind::Teacher,
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        status: RecognitionStatus::Success,
        known: true,
        registered: None,
        profile_pic_url: None,
    }
}

fn student(id: &str, status: RecognitionStatus) -> RecognitionSignal {
    RecognitionSignal {
        subject: SubjectKind::Student,
        id: Some(id.to_string()),
        name: Some(format!("Student {}", id)),
        status,
        known: true,
        registered: None,
        profile_pic_url: None,
    }
}

fn reading(candidates: Vec<RecognitionSignal>) -> RecognitionReading {
    RecognitionReading {
        candidates,
        detected_faces: None,
    }
}

fn snapshot(class_id: &str, teacher_id: &str) -> SessionSnapshot {
    SessionSnapshot {
        class_id: class_id.to_string(),
        teacher_id: Some(teacher_id.to_string()),
        teacher_name: Some("Ms. X".to_string()),
        class_name: Some("Algebra".to_string()),
        started_at: None,
        profile_pic_url: None,
    }
}

fn stop_count(effects: &[Effect]) -> usize {
    effects.iter().filter(|e| **e == Effect::StopSession).count()
}

fn marks(effects: &[Effect]) -> Vec<String> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::MarkAttendance { student_id, .. } => Some(student_id.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_no_session_reads_not_available() {
    let mut harness = Harness::new();
    let effects = harness.session(None, 0);
    assert!(effects.is_empty());

    let view = harness.view(0);
    assert_eq!(view.state, DisplayState::Ready);
    assert_eq!(view.student.name, "Not Available");
    assert_eq!(view.student.status, "Service inactive");
    assert_eq!(view.top_bar.title, "Service inactive");
    assert!(view.session.is_none());
}

#[test]
fn test_sustained_teacher_becomes_recognized() {
    let mut harness = Harness::new();
    harness.session(None, 0);

    let effects = harness.hold_teacher("T1", "Ms. X", 0, 1000);
    assert!(effects.is_empty());
    assert_eq!(harness.view(1000).state, DisplayState::Recognizing);

    let effects = harness.teacher(vec![teacher("T1", "Ms. X")], 1500);
    assert_eq!(
        effects,
        vec![Effect::CheckAuthorization {
            teacher_id: "T1".to_string()
        }]
    );

    let view = harness.view(1500);
    assert_eq!(view.state, DisplayState::Recognized);
    assert_eq!(view.label, "Ms. X — Start service");
    assert_eq!(view.authorization, Authorization::Pending);
}

#[test]
fn test_contradicting_teacher_restarts_hold() {
    let mut harness = Harness::new();
    harness.hold_teacher("T1", "Ms. X", 0, 1000);

    // T2 takes over at 1200; its hold starts from zero there
    let effects = harness.hold_teacher("T2", "Mr. Y", 1200, 2200);
    assert!(effects.is_empty());
    assert_eq!(harness.view(2200).state, DisplayState::Recognizing);

    let effects = harness.teacher(vec![teacher("T2", "Mr. Y")], 2700);
    assert_eq!(effects.len(), 1);
    assert_eq!(harness.view(2700).label, "Mr. Y — Start service");
}

#[test]
fn test_teacher_leaving_clears_recognition() {
    let mut harness = Harness::new();
    harness.hold_teacher("T1", "Ms. X", 0, 1500);
    assert_eq!(harness.view(1500).state, DisplayState::Recognized);

    harness.teacher(Vec::new(), 2000);
    let view = harness.view(2000);
    assert_eq!(view.state, DisplayState::Ready);
    assert!(view.teacher.is_none());
}

#[test]
fn test_unregistered_teacher_cannot_start() {
    let mut harness = Harness::new();
    harness.hold_teacher("T1", "Ms. X", 0, 1500);
    harness.vm.apply_authorization("T1", Authorization::NotRegistered);

    let view = harness.view(1500);
    assert_eq!(view.state, DisplayState::NotRegistered);
    assert_eq!(view.label, "You are not registered in this room");

    let effects = harness.command(
        OperatorCommand::ConfirmStart {
            class_id: Some("C1".to_string()),
        },
        1600,
    );
    assert!(effects.is_empty());
}

#[test]
fn test_start_waits_for_authorization() {
    let mut harness = Harness::new();
    harness.hold_teacher("T1", "Ms. X", 0, 1500);

    let confirm = OperatorCommand::ConfirmStart {
        class_id: Some("C1".to_string()),
    };
    assert!(harness.command(confirm.clone(), 1600).is_empty());

    // A verdict for someone else is ignored
    harness.vm.apply_authorization("T9", Authorization::Registered);
    assert!(harness.command(confirm, 1700).is_empty());
}

#[test]
fn test_confirm_start_posts_once_then_refetches() {
    let mut harness = Harness::new();
    harness.session(None, 0);
    harness.hold_teacher("T1", "Ms. X", 0, 1500);
    harness.vm.apply_authorization("T1", Authorization::Registered);

    let confirm = OperatorCommand::ConfirmStart {
        class_id: Some("C1".to_string()),
    };
    let effects = harness.command(confirm.clone(), 1600);
    assert_eq!(effects.len(), 1);
    match &effects[0] {
        Effect::StartSession(request) => {
            assert_eq!(request.class_id, "C1");
            assert_eq!(request.teacher_id, "T1");
            assert_eq!(request.teacher_name, "Ms. X");
        }
        other => panic!("expected a start, got {:?}", other),
    }
    assert!(harness.view(1600).starting);

    // Double tap while the POST is in flight
    assert!(harness.command(confirm, 1650).is_empty());

    let effects = harness.vm.apply_start_result(Ok(()), harness.at(1800));
    assert_eq!(effects, vec![Effect::FetchSession, Effect::AnnounceRoom]);

    let effects = harness.session(Some(snapshot("C1", "T1")), 1900);
    assert!(effects.iter().any(|e| matches!(
        e,
        Effect::Publish(KioskEvent::SessionStarted { class_id, .. }) if class_id == "C1"
    )));

    let view = harness.view(1900);
    assert_eq!(view.state, DisplayState::Active);
    assert_eq!(view.top_bar.title, "Active");
    assert_eq!(view.top_bar.teacher_name.as_deref(), Some("Ms. X"));
    assert_eq!(view.toast.as_deref(), Some(TOAST_STARTED));
    assert!(!view.starting);
}

#[test]
fn test_failed_start_stays_recognized() {
    let mut harness = Harness::new();
    harness.hold_teacher("T1", "Ms. X", 0, 1500);
    harness.vm.apply_authorization("T1", Authorization::Registered);
    harness.command(
        OperatorCommand::ConfirmStart {
            class_id: Some("C1".to_string()),
        },
        1600,
    );

    let err = BackendError::Backend {
        status: 500,
        code: None,
    };
    let effects = harness.vm.apply_start_result(Err(err), harness.at(1700));
    assert!(effects.is_empty());

    let view = harness.view(1700);
    assert_eq!(view.state, DisplayState::Recognized);
    assert_eq!(view.toast.as_deref(), Some(TOAST_START_FAILED));
    assert!(!view.starting);
}

#[test]
fn test_class_chooser_selects_first_class() {
    let mut harness = Harness::new();
    harness.hold_teacher("T1", "Ms. X", 0, 1500);
    harness.vm.apply_authorization("T1", Authorization::Registered);

    let effects = harness.command(OperatorCommand::OpenClassChooser, 1600);
    assert_eq!(
        effects,
        vec![
            Effect::FetchClasses {
                teacher_id: "T1".to_string()
            },
            Effect::AnnounceRoom
        ]
    );
    assert!(harness.view(1600).class_chooser.map(|c| c.loading).unwrap_or(false));

    harness.vm.apply_classes(
        "T1",
        Ok(vec![
            ClassOption {
                id: "C7".to_string(),
                name: Some("Algebra".to_string()),
                subject_name: Some("Algebra".to_string()),
                grade_level: Some("7".to_string()),
                section: Some("Rizal".to_string()),
            },
            ClassOption {
                id: "C8".to_string(),
                name: Some("Biology".to_string()),
                subject_name: None,
                grade_level: None,
                section: None,
            },
        ]),
    );

    let chooser = harness.view(1700).class_chooser.expect("chooser open");
    assert!(!chooser.loading);
    assert_eq!(chooser.selected.as_deref(), Some("C7"));
    assert_eq!(chooser.classes.len(), 2);

    let effects = harness.command(OperatorCommand::ConfirmStart { class_id: None }, 1800);
    match effects.as_slice() {
        [Effect::StartSession(request)] => {
            assert_eq!(request.class_id, "C7");
            assert_eq!(request.class_name, "Algebra");
        }
        other => panic!("expected one start, got {:?}", other),
    }
    assert!(harness.view(1800).class_chooser.is_none());
}

#[test]
fn test_stop_requires_session_owner() {
    let mut harness = Harness::active();

    // Seen before the request; must not count
    let effects = harness.hold_teacher("T1", "Ms. X", 0, 2000);
    assert_eq!(stop_count(&effects), 0);

    harness.command(OperatorCommand::RequestStop, 2100);
    let view = harness.view(2100);
    assert_eq!(view.state, DisplayState::PendingStop);
    assert_eq!(view.toast.as_deref(), Some(TOAST_SCAN_TO_STOP));

    let effects = harness.hold_teacher("T2", "Mr. Y", 2500, 5000);
    assert_eq!(stop_count(&effects), 0);
    assert_eq!(harness.view(5000).state, DisplayState::PendingStop);

    let effects = harness.hold_teacher("T1", "Ms. X", 5500, 9000);
    assert_eq!(stop_count(&effects), 1);
    assert!(harness.view(9000).stopping);

    let effects = harness.vm.apply_stop_result(Ok(()), harness.at(9200));
    assert_eq!(effects, vec![Effect::FetchSession]);

    let effects = harness.session(None, 9300);
    assert!(effects
        .iter()
        .any(|e| matches!(e, Effect::Publish(KioskEvent::SessionEnded { .. }))));

    let view = harness.view(9300);
    assert_eq!(view.state, DisplayState::Ready);
    assert_eq!(view.toast.as_deref(), Some(TOAST_STOPPED));
}

#[test]
fn test_pending_stop_times_out() {
    let mut harness = Harness::active();
    harness.command(OperatorCommand::RequestStop, 1000);

    harness.vm.tick(harness.at(30_000));
    let view = harness.view(30_000);
    assert_eq!(view.state, DisplayState::PendingStop);
    assert_eq!(view.pending_stop_remaining_secs, Some(1));

    harness.vm.tick(harness.at(31_000));
    let view = harness.view(31_000);
    assert_eq!(view.state, DisplayState::Active);
    assert!(view.pending_stop_remaining_secs.is_none());
}

#[test]
fn test_cancel_stop_returns_to_active() {
    let mut harness = Harness::active();
    harness.command(OperatorCommand::RequestStop, 1000);
    harness.command(OperatorCommand::CancelStop, 2000);
    assert_eq!(harness.view(2000).state, DisplayState::Active);

    // Without a pending request a re-scan does nothing
    let effects = harness.hold_teacher("T1", "Ms. X", 2500, 5000);
    assert_eq!(stop_count(&effects), 0);
}

#[test]
fn test_failed_stop_keeps_session() {
    let mut harness = Harness::active();
    harness.command(OperatorCommand::RequestStop, 0);
    harness.hold_teacher("T1", "Ms. X", 500, 2000);

    let err = BackendError::AuthorizationDenied {
        details: "403".to_string(),
    };
    let effects = harness.vm.apply_stop_result(Err(err), harness.at(2100));
    assert!(effects.is_empty());

    let view = harness.view(2100);
    assert_eq!(view.state, DisplayState::Active);
    assert_eq!(view.toast.as_deref(), Some(TOAST_STOP_FAILED));
    assert!(!view.stopping);
}

#[test]
fn test_mark_is_idempotent_within_window() {
    let mut harness = Harness::active();

    let effects = harness.hold_student("S1", 0, 1000);
    assert!(marks(&effects).is_empty());

    let effects = harness.hold_student("S1", 1500, 4000);
    assert_eq!(marks(&effects), vec!["S1".to_string()]);

    let view = harness.view(4000);
    assert_eq!(view.student.name, "Student S1");
    assert_eq!(view.student.status, "Present");

    let effects = harness
        .vm
        .apply_mark_result("S1", Ok(vec!["S1".to_string()]));
    assert!(effects.iter().any(|e| matches!(
        e,
        Effect::Publish(KioskEvent::AttendanceMarked { present_count: 1, .. })
    )));

    // Well past the throttle window, but already on the roster
    let effects = harness.hold_student("S1", 4500, 20_000);
    assert!(marks(&effects).is_empty());

    let view = harness.view(20_000);
    assert_eq!(view.present_count, 1);
    assert_eq!(view.roster.len(), 1);
    assert_eq!(view.roster[0].name, "Student S1");
}

#[test]
fn test_failed_mark_retries_after_window() {
    let mut harness = Harness::active();
    let effects = harness.hold_student("S1", 0, 1500);
    assert_eq!(marks(&effects).len(), 1);

    let err = BackendError::network("refused");
    assert!(harness.vm.apply_mark_result("S1", Err(err)).is_empty());

    let effects = harness.hold_student("S1", 2000, 11_000);
    assert!(marks(&effects).is_empty());

    let effects = harness.students(vec![student("S1", RecognitionStatus::Success)], 11_500);
    assert_eq!(marks(&effects).len(), 1);
}

#[test]
fn test_denied_student_is_not_marked() {
    let mut harness = Harness::active();
    let mut effects = Vec::new();
    for t in [0, 500, 1000, 1500, 2000] {
        effects.extend(harness.students(vec![student("S9", RecognitionStatus::Denied)], t));
    }
    assert!(marks(&effects).is_empty());

    let view = harness.view(2000);
    assert_eq!(view.student.name, "Student S9");
    assert_eq!(view.student.status, "Denied - Not registered");
}

#[test]
fn test_students_ignored_without_session() {
    let mut harness = Harness::new();
    harness.session(None, 0);
    let effects = harness.hold_student("S1", 0, 3000);
    assert!(marks(&effects).is_empty());
    assert_eq!(harness.view(3000).student.name, "Not Available");
}

#[test]
fn test_empty_student_frame_shows_detecting() {
    let mut harness = Harness::active();
    harness.hold_student("S1", 0, 1500);
    harness.students(Vec::new(), 2000);

    let view = harness.view(2000);
    assert_eq!(view.student.name, "Detecting faces...");
}

#[test]
fn test_session_end_resets_immediately() {
    let mut harness = Harness::active();
    harness.hold_teacher("T1", "Ms. X", 0, 1500);
    harness.hold_student("S1", 0, 1500);
    harness.vm.apply_mark_result("S1", Ok(vec!["S1".to_string()]));
    assert_eq!(harness.view(1500).present_count, 1);

    // Same instant as the last observation: no debounce on the way down
    harness.session(None, 1500);
    let view = harness.view(1500);
    assert_eq!(view.state, DisplayState::Ready);
    assert!(view.teacher.is_none());
    assert_eq!(view.student.name, "Not Available");
    assert!(view.roster.is_empty());
    assert_eq!(view.present_count, 0);
    assert_eq!(view.authorization, Authorization::Pending);
}

#[test]
fn test_stale_session_result_is_dropped() {
    let mut harness = Harness::new();
    let now = harness.at(0);

    harness
        .vm
        .apply_session(PollResult::success(2, Some(snapshot("C1", "T1"))), now);
    assert_eq!(harness.view(0).state, DisplayState::Active);

    // Tick 1 lands late with the pre-start answer
    let effects = harness.vm.apply_session(PollResult::success(1, None), now);
    assert!(effects.is_empty());
    assert_eq!(harness.view(0).state, DisplayState::Active);

    // A repeated sequence number is stale too
    harness.vm.apply_session(PollResult::success(2, None), now);
    assert_eq!(harness.view(0).state, DisplayState::Active);

    harness.vm.apply_session(PollResult::success(3, None), now);
    assert_eq!(harness.view(0).state, DisplayState::Ready);
}

#[test]
fn test_unreachable_after_repeated_failures() {
    let mut harness = Harness::new();
    harness.session_failure(0);
    harness.session_failure(3000);
    assert!(!harness.view(3000).backend_unreachable);

    harness.session_failure(6000);
    assert!(harness.view(6000).backend_unreachable);

    // One good poll clears the flag
    harness.session(None, 9000);
    assert!(!harness.view(9000).backend_unreachable);
}

#[test]
fn test_error_responses_do_not_mark_backend_unreachable() {
    let mut harness = Harness::new();
    let now = harness.at(0);
    for seq in 1..=5 {
        let error = if seq % 2 == 0 {
            BackendError::malformed("not json")
        } else {
            BackendError::Backend {
                status: 500,
                code: None,
            }
        };
        harness.vm.apply_session(PollResult::failure(seq, error), now);
    }
    assert!(!harness.view(0).backend_unreachable);

    // Error responses neither count toward nor reset the transport streak
    harness.seq = 5;
    harness.session_failure(3000);
    harness.session_failure(6000);
    harness.vm.apply_session(
        PollResult::failure(
            8,
            BackendError::Backend {
                status: 503,
                code: None,
            },
        ),
        harness.at(7000),
    );
    harness.seq = 8;
    harness.session_failure(9000);
    assert!(harness.view(9000).backend_unreachable);
}

#[test]
fn test_failed_poll_keeps_active_session() {
    let mut harness = Harness::active();
    harness.session_failure(3000);
    assert_eq!(harness.view(3000).state, DisplayState::Active);
}

#[test]
fn test_unrecognized_banner_decays() {
    let mut harness = Harness::new();
    harness.session(None, 0);

    let detection = FaceDetection {
        faces: 1,
        known: false,
    };
    harness
        .vm
        .apply_detection(PollResult::success(10, detection), harness.at(0));
    assert!(harness.view(0).unrecognized_banner.is_none());

    harness
        .vm
        .apply_detection(PollResult::success(11, detection), harness.at(1500));
    assert_eq!(
        harness.view(1500).unrecognized_banner.as_deref(),
        Some("Unidentified face detected")
    );

    // Still there, but the banner clears after the decay
    harness
        .vm
        .apply_detection(PollResult::success(12, detection), harness.at(4600));
    assert!(harness.view(4600).unrecognized_banner.is_none());
}

#[test]
fn test_toast_expires_on_tick() {
    let mut harness = Harness::active();
    assert_eq!(harness.view(0).toast.as_deref(), Some(TOAST_STARTED));

    harness.vm.tick(harness.at(3500));
    assert!(harness.view(3500).toast.is_none());
}

#[test]
fn test_roster_requests_unknown_names() {
    let mut harness = Harness::active();
    let effects = harness
        .vm
        .apply_roster(PollResult::success(1, vec!["S1".to_string(), "S2".to_string()]));
    assert_eq!(
        effects,
        vec![Effect::ResolveStudentNames {
            ids: vec!["S1".to_string(), "S2".to_string()]
        }]
    );

    harness.vm.apply_student_names(Ok(vec![Person {
        id: "S1".to_string(),
        firstname: "Ana".to_string(),
        lastname: "Cruz".to_string(),
        profile_pic_url: None,
    }]));
    let view = harness.view(0);
    assert_eq!(view.roster[0].name, "Ana Cruz");
    // Unresolved names fall back to the id
    assert_eq!(view.roster[1].name, "S2");

    // Unchanged roster, nothing to resolve
    let effects = harness
        .vm
        .apply_roster(PollResult::success(2, vec!["S1".to_string(), "S2".to_string()]));
    assert!(effects.is_empty());
}

#[test]
fn test_mark_throttle_window() {
    let base = Instant::now();
    let mut throttle = MarkThrottle::new(Duration::from_secs(10));
    assert!(throttle.try_acquire("S1", base));
    assert!(!throttle.try_acquire("S1", base + Duration::from_secs(9)));
    assert!(throttle.try_acquire("S2", base + Duration::from_secs(9)));
    assert!(throttle.try_acquire("S1", base + Duration::from_secs(10)));
}

fn room(id: &str, teachers: &[&str], raw_doc: Option<&str>) -> Room {
    Room {
        id: id.to_string(),
        name: None,
        assigned_teachers: teachers.iter().map(|t| t.to_string()).collect(),
        raw_doc: raw_doc.map(str::to_string),
    }
}

fn device(id: &str, assigned_room: Option<&str>) -> DeviceInfo {
    DeviceInfo {
        id: Some(id.to_string()),
        assigned_room: assigned_room.map(str::to_string),
        ..DeviceInfo::default()
    }
}

#[test]
fn test_pick_room_prefers_assignment() {
    let rooms = vec![room("R1", &[], None), room("R2", &[], None)];
    assert_eq!(pick_room(&rooms, Some("R2")).map(|r| r.id.as_str()), Some("R2"));
    assert_eq!(pick_room(&rooms, Some("R9")).map(|r| r.id.as_str()), Some("R1"));
    assert_eq!(pick_room(&rooms, None).map(|r| r.id.as_str()), Some("R1"));
    assert!(pick_room(&[], Some("R1")).is_none());
}

#[tokio::test]
async fn test_authorization_uses_kiosk_room() {
    let backend = MockBackend::new();
    backend.set_device(Ok(Some(device("K1", Some("R2")))));
    backend.set_rooms(
        Ok(vec![room("R1", &["T9"], None), room("R2", &["T1"], None)]),
        Ok(Vec::new()),
    );

    assert_eq!(
        check_teacher_authorization(&backend, "T1").await,
        Authorization::Registered
    );
    assert_eq!(
        check_teacher_authorization(&backend, "T9").await,
        Authorization::NotRegistered
    );
}

#[tokio::test]
async fn test_authorization_falls_back_to_all_rooms() {
    let backend = MockBackend::new();
    backend.set_device(Ok(Some(device("K1", None))));
    backend.set_rooms(
        Err(BackendError::network("refused")),
        Ok(vec![room("R1", &[], Some("{\"assignedteachers\": [\"T1\"]}"))]),
    );

    assert_eq!(
        check_teacher_authorization(&backend, "T1").await,
        Authorization::Registered
    );
}

#[tokio::test]
async fn test_authorization_fails_closed() {
    let backend = MockBackend::new();
    assert_eq!(
        check_teacher_authorization(&backend, "T1").await,
        Authorization::NotRegistered
    );

    backend.set_device(Err(BackendError::network("refused")));
    assert_eq!(
        check_teacher_authorization(&backend, "T1").await,
        Authorization::NotRegistered
    );

    backend.set_device(Ok(Some(device("K1", None))));
    backend.set_rooms(
        Err(BackendError::network("refused")),
        Err(BackendError::Backend {
            status: 500,
            code: None,
        }),
    );
    assert_eq!(
        check_teacher_authorization(&backend, "T1").await,
        Authorization::NotRegistered
    );
}
