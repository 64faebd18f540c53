use super::{now, MountedScreen, ScreenContext, ScreenView};
use crate::backend::{
    ClassOption, FaceDetection, Person, RecognitionReading, SessionSnapshot, UnrecognizedReport,
};
use crate::config::PollingConfig;
use crate::error::BackendResult;
use crate::events::{KioskEvent, OperatorCommand};
use crate::poller::{fetch_with_timeout, PollResult, PollerSpec, ScreenScheduler, SequenceSource};
use crate::session::{check_teacher_authorization, Authorization, Effect, SessionSettings, SessionViewModel};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

/// Toast expiry, stop timeout and banner decay are checked this often
const TICK: Duration = Duration::from_millis(250);

/// Everything that can change the service screen's view-model
#[derive(Debug)]
enum ServiceMsg {
    Session(PollResult<Option<SessionSnapshot>>),
    Teacher(PollResult<RecognitionReading>),
    Students(PollResult<RecognitionReading>),
    Detect(PollResult<FaceDetection>),
    Unrecognized(PollResult<UnrecognizedReport>),
    Roster(PollResult<Vec<String>>),
    Authorization {
        teacher_id: String,
        authorization: Authorization,
    },
    Classes {
        teacher_id: String,
        result: BackendResult<Vec<ClassOption>>,
    },
    Started(BackendResult<()>),
    Stopped(BackendResult<()>),
    Marked {
        student_id: String,
        result: BackendResult<Vec<String>>,
    },
    Names(BackendResult<Vec<Person>>),
}

/// The attendance screen: camera feed, teacher/student recognition and the
/// running session.
pub struct ServiceScreen {
    ctx: ScreenContext,
    vm: SessionViewModel,
    session_seq: SequenceSource,
    timeout: Duration,
    tx: mpsc::UnboundedSender<ServiceMsg>,
    /// Effect executions; dropped (and aborted) with the screen loop
    in_flight: JoinSet<()>,
}

/// Register a poller whose results land on the screen loop as `wrap(result)`
macro_rules! poll_into {
    ($scheduler:expr, $ctx:expr, $tx:expr, $spec:expr, $seq:expr, $call:ident, $wrap:path) => {{
        let backend = Arc::clone(&$ctx.backend);
        let tx = $tx.clone();
        $scheduler.poll(
            $spec,
            $seq,
            move || {
                let backend = Arc::clone(&backend);
                async move { backend.$call().await }
            },
            move |result| {
                let _ = tx.send($wrap(result));
            },
        );
    }};
}

impl ServiceScreen {
    pub fn mount(ctx: &ScreenContext) -> MountedScreen {
        let mut scheduler = ScreenScheduler::new("service");
        let (tx, rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let polling = &ctx.config.polling;
        let timeout = ctx.config.backend.request_timeout();
        let spec = |name: &str, millis: u64| {
            PollerSpec::new(name, PollingConfig::interval(millis)).with_timeout(timeout)
        };
        let session_seq = SequenceSource::new();

        poll_into!(scheduler, ctx, tx, spec("session", polling.session), session_seq.clone(), session, ServiceMsg::Session);
        poll_into!(scheduler, ctx, tx, spec("teacher", polling.teacher), SequenceSource::new(), recognize_teacher, ServiceMsg::Teacher);
        poll_into!(scheduler, ctx, tx, spec("students", polling.student), SequenceSource::new(), recognize_students, ServiceMsg::Students);
        poll_into!(scheduler, ctx, tx, spec("detect", polling.detect), SequenceSource::new(), detect, ServiceMsg::Detect);
        poll_into!(scheduler, ctx, tx, spec("unrecognized", polling.unrecognized), SequenceSource::new(), unrecognized, ServiceMsg::Unrecognized);
        poll_into!(scheduler, ctx, tx, spec("roster", polling.roster), SequenceSource::new(), attendance, ServiceMsg::Roster);

        // Camera frames bypass the view-model; a failed fetch keeps the old frame
        {
            let backend = Arc::clone(&ctx.backend);
            let frames = Arc::clone(&ctx.frames);
            scheduler.poll(
                spec("camera", polling.camera),
                SequenceSource::new(),
                move || {
                    let backend = Arc::clone(&backend);
                    async move { backend.camera_frame().await }
                },
                move |result: PollResult<bytes::Bytes>| match result.payload {
                    Some(frame) => {
                        frames.push(frame);
                    }
                    None => frames.record_failure(),
                },
            );
        }

        let screen = ServiceScreen {
            ctx: ctx.clone(),
            vm: SessionViewModel::new(SessionSettings::from_config(&ctx.config), now()),
            session_seq,
            timeout,
            tx,
            in_flight: JoinSet::new(),
        };
        scheduler.spawn("service-loop", screen.run(rx, command_rx));

        MountedScreen::new(super::Screen::Service, scheduler, command_tx)
    }

    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<ServiceMsg>,
        mut commands: mpsc::UnboundedReceiver<OperatorCommand>,
    ) {
        let mut ticker = tokio::time::interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.publish();

        loop {
            tokio::select! {
                Some(msg) = rx.recv() => {
                    let effects = self.apply(msg);
                    self.execute(effects);
                }
                Some(command) = commands.recv() => {
                    debug!("Service screen command: {:?}", command);
                    let effects = self.vm.handle_command(&command, now());
                    self.execute(effects);
                }
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    if let Err(e) = joined {
                        warn!("Service screen task failed: {}", e);
                    }
                }
                _ = ticker.tick() => {
                    self.vm.tick(now());
                }
            }
            self.publish();
        }
    }

    fn publish(&self) {
        let view = self.vm.view(now());
        self.ctx.views.publish(ScreenView::Service(Box::new(view)));
    }

    fn apply(&mut self, msg: ServiceMsg) -> Vec<Effect> {
        let now = now();
        match msg {
            ServiceMsg::Session(result) => self.vm.apply_session(result, now),
            ServiceMsg::Teacher(result) => self.vm.apply_teacher(result, now),
            ServiceMsg::Students(result) => self.vm.apply_students(result, now),
            ServiceMsg::Detect(result) => {
                self.vm.apply_detection(result, now);
                Vec::new()
            }
            ServiceMsg::Unrecognized(result) => {
                self.vm.apply_unrecognized(result);
                Vec::new()
            }
            ServiceMsg::Roster(result) => self.vm.apply_roster(result),
            ServiceMsg::Authorization {
                teacher_id,
                authorization,
            } => {
                self.vm.apply_authorization(&teacher_id, authorization);
                Vec::new()
            }
            ServiceMsg::Classes { teacher_id, result } => {
                self.vm.apply_classes(&teacher_id, result);
                Vec::new()
            }
            ServiceMsg::Started(result) => self.vm.apply_start_result(result, now),
            ServiceMsg::Stopped(result) => self.vm.apply_stop_result(result, now),
            ServiceMsg::Marked { student_id, result } => {
                self.vm.apply_mark_result(&student_id, result)
            }
            ServiceMsg::Names(result) => {
                self.vm.apply_student_names(result);
                Vec::new()
            }
        }
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            trace!("Service screen effect: {:?}", effect);
            let backend = Arc::clone(&self.ctx.backend);
            let tx = self.tx.clone();
            let timeout = Some(self.timeout);

            match effect {
                Effect::FetchSession => {
                    let sequence = self.session_seq.clone();
                    self.in_flight.spawn(async move {
                        let seq = sequence.next();
                        let result = fetch_with_timeout(backend.session(), timeout).await;
                        let _ = tx.send(ServiceMsg::Session(PollResult::from_result(seq, result)));
                    });
                }
                Effect::CheckAuthorization { teacher_id } => {
                    self.in_flight.spawn(async move {
                        let authorization = check_teacher_authorization(backend.as_ref(), &teacher_id).await;
                        let _ = tx.send(ServiceMsg::Authorization {
                            teacher_id,
                            authorization,
                        });
                    });
                }
                Effect::FetchClasses { teacher_id } => {
                    self.in_flight.spawn(async move {
                        let result =
                            fetch_with_timeout(backend.classes_for_teacher(&teacher_id), timeout).await;
                        let _ = tx.send(ServiceMsg::Classes { teacher_id, result });
                    });
                }
                Effect::StartSession(request) => {
                    self.in_flight.spawn(async move {
                        let result = fetch_with_timeout(backend.start_session(&request), timeout).await;
                        let _ = tx.send(ServiceMsg::Started(result));
                    });
                }
                Effect::StopSession => {
                    self.in_flight.spawn(async move {
                        let result = fetch_with_timeout(backend.stop_session(), timeout).await;
                        let _ = tx.send(ServiceMsg::Stopped(result));
                    });
                }
                Effect::MarkAttendance {
                    student_id,
                    student_name,
                } => {
                    self.in_flight.spawn(async move {
                        let result = fetch_with_timeout(
                            backend.mark_attendance(&student_id, &student_name),
                            timeout,
                        )
                        .await;
                        let _ = tx.send(ServiceMsg::Marked { student_id, result });
                    });
                }
                Effect::ResolveStudentNames { ids } => {
                    self.in_flight.spawn(async move {
                        let result = fetch_with_timeout(backend.students(&ids), timeout).await;
                        let _ = tx.send(ServiceMsg::Names(result));
                    });
                }
                Effect::AnnounceRoom => {
                    let event_bus = Arc::clone(&self.ctx.event_bus);
                    self.in_flight.spawn(async move {
                        match fetch_with_timeout(backend.device_info(), timeout).await {
                            Ok(device) => {
                                let room = device.and_then(|d| d.assigned_room);
                                info!("Announcing room assignment {:?}", room);
                                let _ = event_bus.publish_now(KioskEvent::RoomAssignmentUpdated { room });
                            }
                            Err(e) => debug!("Room announcement skipped: {}", e),
                        }
                    });
                }
                Effect::Publish(event) => {
                    if let Err(e) = self.ctx.event_bus.publish_now(event) {
                        trace!("Event not delivered: {}", e);
                    }
                }
            }
        }
    }
}
