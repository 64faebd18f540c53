use super::*;
use std::time::{Duration, Instant};

const HOLD: Duration = Duration::from_millis(1500);

fn signal(status: RecognitionStatus, id: Option<&str>) -> RecognitionSignal {
    RecognitionSignal {
        subject: SubjectKind::Student,
        id: id.map(str::to_string),
        name: id.map(|id| format!("Student {}", id)),
        status,
        known: id.is_some(),
        registered: None,
        profile_pic_url: None,
    }
}

fn ms(base: Instant, millis: u64) -> Instant {
    base + Duration::from_millis(millis)
}

#[test]
fn test_select_candidate_precedence() {
    let unknown = signal(RecognitionStatus::Unknown, None);
    let denied = signal(RecognitionStatus::Denied, Some("S2"));
    let success = signal(RecognitionStatus::Success, Some("S1"));
    let later_success = signal(RecognitionStatus::Success, Some("S3"));

    let all = vec![unknown.clone(), denied.clone(), success.clone(), later_success];
    assert_eq!(select_candidate(&all), Some(&success));

    let no_success = vec![unknown.clone(), denied.clone()];
    assert_eq!(select_candidate(&no_success), Some(&denied));

    let only_unknown = vec![unknown.clone()];
    assert_eq!(select_candidate(&only_unknown), Some(&unknown));

    assert_eq!(select_candidate(&[]), None);
}

#[test]
fn test_unregistered_flag_counts_as_denied() {
    let mut flagged = signal(RecognitionStatus::Unknown, Some("S9"));
    flagged.registered = Some(false);
    assert_eq!(
        StudentObservation::from_signal(&flagged),
        Some(StudentObservation::Denied("S9".to_string()))
    );
    assert_eq!(StudentObservation::from_signal(&signal(RecognitionStatus::Unknown, None)), None);
}

#[test]
fn test_stabilizer_requires_continuous_hold() {
    let t0 = Instant::now();
    let mut stabilizer = Stabilizer::new(HOLD, t0);

    assert!(!stabilizer.observe(Some("T1"), t0));
    assert!(!stabilizer.observe(Some("T1"), ms(t0, 1000)));
    assert_eq!(stabilizer.state(), None);
    assert_eq!(stabilizer.pending(), Some(&"T1"));

    assert!(stabilizer.observe(Some("T1"), ms(t0, 1500)));
    assert_eq!(stabilizer.state(), Some(&"T1"));
    assert_eq!(stabilizer.signal().since, ms(t0, 1500));
    assert_eq!(stabilizer.pending(), None);

    // Staying put is not a change
    assert!(!stabilizer.observe(Some("T1"), ms(t0, 3000)));
    assert_eq!(stabilizer.signal().since, ms(t0, 1500));
}

#[test]
fn test_stabilizer_interruption_resets_hold() {
    let t0 = Instant::now();
    let mut stabilizer = Stabilizer::new(HOLD, t0);

    stabilizer.observe(Some("T1"), t0);
    stabilizer.observe(Some("T1"), ms(t0, 1400));
    stabilizer.observe(None, ms(t0, 1450));
    assert!(!stabilizer.observe(Some("T1"), ms(t0, 1500)));
    assert!(!stabilizer.observe(Some("T1"), ms(t0, 2900)));
    assert!(stabilizer.observe(Some("T1"), ms(t0, 3000)));
}

#[test]
fn test_stabilizer_contradiction_restarts_from_zero() {
    let t0 = Instant::now();
    let mut stabilizer = Stabilizer::new(HOLD, t0);

    stabilizer.observe(Some("T1"), t0);
    stabilizer.observe(Some("T1"), ms(t0, 1500));
    assert_eq!(stabilizer.state(), Some(&"T1"));

    // B after A: no credit carried over from A
    assert!(!stabilizer.observe(Some("T2"), ms(t0, 1600)));
    assert!(!stabilizer.observe(Some("T2"), ms(t0, 3000)));
    assert_eq!(stabilizer.state(), Some(&"T1"));
    assert!(stabilizer.observe(Some("T2"), ms(t0, 3100)));
    assert_eq!(stabilizer.state(), Some(&"T2"));
}

#[test]
fn test_stabilizer_never_flips_on_single_tick() {
    let t0 = Instant::now();
    let sequence = [
        Some("A"),
        None,
        Some("B"),
        Some("A"),
        Some("B"),
        None,
        Some("A"),
    ];

    let mut stabilizer = Stabilizer::new(HOLD, t0);
    for (i, raw) in sequence.into_iter().enumerate() {
        // Ticks 1s apart with the value changing every tick
        stabilizer.observe(raw, ms(t0, i as u64 * 1000));
        assert_eq!(stabilizer.state(), None);
    }
}

#[test]
fn test_stabilizer_clear_and_restart() {
    let t0 = Instant::now();
    let mut stabilizer = Stabilizer::new(HOLD, t0);
    stabilizer.observe(Some("T1"), t0);
    stabilizer.observe(Some("T1"), ms(t0, 1500));

    stabilizer.restart_hold();
    assert_eq!(stabilizer.state(), Some(&"T1"));
    stabilizer.observe(Some("T1"), ms(t0, 2000));
    assert!(!stabilizer.observe(Some("T1"), ms(t0, 3000)));

    stabilizer.clear(ms(t0, 3100));
    assert_eq!(stabilizer.state(), None);
    assert_eq!(stabilizer.signal().since, ms(t0, 3100));
}

#[test]
fn test_identity_compares_by_id() {
    let a = Identity::new("T1", Some("Ms. X".to_string()));
    let b = Identity::new("T1", None);
    assert_eq!(a, b);
    assert_eq!(b.display_name(), "T1");
    assert_ne!(a, Identity::new("T2", Some("Ms. X".to_string())));
}

#[test]
fn test_unrecognized_hold_then_decay() {
    let t0 = Instant::now();
    let mut detector = UnrecognizedDetector::new(HOLD, Duration::from_secs(3));

    detector.observe(true, t0);
    detector.observe(true, ms(t0, 1000));
    assert!(!detector.banner_visible(ms(t0, 1000)));

    detector.observe(true, ms(t0, 1500));
    assert!(detector.banner_visible(ms(t0, 1500)));

    // Still unmatched, but the banner decays on schedule
    detector.observe(true, ms(t0, 3000));
    assert!(detector.banner_visible(ms(t0, 4400)));
    detector.observe(true, ms(t0, 4500));
    assert!(!detector.banner_visible(ms(t0, 4500)));

    // A full new hold is needed to show it again
    detector.observe(true, ms(t0, 5500));
    assert!(!detector.banner_visible(ms(t0, 5500)));
    detector.observe(true, ms(t0, 6000));
    assert!(detector.banner_visible(ms(t0, 6000)));
}

#[test]
fn test_unrecognized_interrupted_hold() {
    let t0 = Instant::now();
    let mut detector = UnrecognizedDetector::new(HOLD, Duration::from_secs(3));

    detector.observe(true, t0);
    detector.observe(false, ms(t0, 1000));
    detector.observe(true, ms(t0, 1500));
    assert!(!detector.banner_visible(ms(t0, 1500)));

    detector.set_backend_report(true);
    assert!(detector.banner_visible(ms(t0, 1500)));
    detector.reset();
    assert!(!detector.banner_visible(ms(t0, 1500)));
}
