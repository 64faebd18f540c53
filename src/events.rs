use crate::error::EventBusError;
use crate::screens::Screen;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};

/// Commands issued by whoever operates the kiosk (touch renderer, keyboard, status API)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum OperatorCommand {
    /// Load the recognized teacher's classes and show the chooser
    OpenClassChooser,
    /// Start a session for the given class (or the chooser's current selection)
    ConfirmStart { class_id: Option<String> },
    CancelClassChooser,
    /// Ask to stop the running session; requires the starting teacher to re-scan
    RequestStop,
    CancelStop,
    /// Re-fetch whatever the mounted screen shows
    Refresh,
    NextPage,
    PreviousPage,
    MarkRead { id: String },
    MarkAllRead,
    SetFilter { filter: String },
}

/// Events that can occur in the kiosk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KioskEvent {
    /// The backend reported a newly active session
    SessionStarted {
        class_id: String,
        teacher_id: Option<String>,
        timestamp: SystemTime,
    },
    /// The backend reported that the active session is gone
    SessionEnded { timestamp: SystemTime },
    /// Short-lived message for the mounted screen
    Toast { message: String },
    /// Blocking overlay requested (sync in flight, backend starting, ...)
    OverlayShown { message: String },
    OverlayHidden,
    /// The kiosk's assigned room is known to have changed
    RoomAssignmentUpdated { room: Option<String> },
    /// Backend reachability changed
    BackendReachability {
        reachable: bool,
        timestamp: SystemTime,
    },
    /// A student was marked present
    AttendanceMarked {
        student_id: String,
        present_count: usize,
    },
    Operator(OperatorCommand),
    Navigate(Screen),
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl KioskEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            KioskEvent::SessionStarted { class_id, .. } => {
                format!("Session started for class {}", class_id)
            }
            KioskEvent::SessionEnded { .. } => "Session ended".to_string(),
            KioskEvent::Toast { message } => format!("Toast: {}", message),
            KioskEvent::OverlayShown { message } => format!("Overlay shown: {}", message),
            KioskEvent::OverlayHidden => "Overlay hidden".to_string(),
            KioskEvent::RoomAssignmentUpdated { room } => match room {
                Some(room) => format!("Assigned room updated: {}", room),
                None => "Assigned room cleared".to_string(),
            },
            KioskEvent::BackendReachability { reachable, .. } => {
                if *reachable {
                    "Backend reachable".to_string()
                } else {
                    "Backend unreachable".to_string()
                }
            }
            KioskEvent::AttendanceMarked {
                student_id,
                present_count,
            } => format!(
                "Student {} marked present ({} present)",
                student_id, present_count
            ),
            KioskEvent::Operator(command) => format!("Operator command: {:?}", command),
            KioskEvent::Navigate(screen) => format!("Navigate to {}", screen),
            KioskEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            KioskEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            KioskEvent::SessionStarted { .. } => "session_started",
            KioskEvent::SessionEnded { .. } => "session_ended",
            KioskEvent::Toast { .. } => "toast",
            KioskEvent::OverlayShown { .. } => "overlay_shown",
            KioskEvent::OverlayHidden => "overlay_hidden",
            KioskEvent::RoomAssignmentUpdated { .. } => "room_assignment_updated",
            KioskEvent::BackendReachability { .. } => "backend_reachability",
            KioskEvent::AttendanceMarked { .. } => "attendance_marked",
            KioskEvent::Operator(_) => "operator",
            KioskEvent::Navigate(_) => "navigate",
            KioskEvent::SystemError { .. } => "system_error",
            KioskEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Broadcast bus shared by screens, the navigator and the operator surfaces.
///
/// Publishing never blocks; a receiver that falls more than `capacity`
/// events behind gets [`EventBusError::Lagged`] once and then resumes with
/// the newest events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<KioskEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<KioskEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to the event types in `filter`; `name` shows up in logs
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            filter,
            name: name.to_string(),
        }
    }

    pub async fn publish(&self, event: KioskEvent) -> Result<usize, EventBusError> {
        self.publish_now(event)
    }

    /// Synchronous publish, for callers that cannot await (poll callbacks, blocking threads)
    pub fn publish_now(&self, event: KioskEvent) -> Result<usize, EventBusError> {
        match &event {
            KioskEvent::SessionStarted { .. }
            | KioskEvent::SessionEnded { .. }
            | KioskEvent::RoomAssignmentUpdated { .. }
            | KioskEvent::ShutdownRequested { .. } => info!("{}", event.description()),
            KioskEvent::BackendReachability { reachable: false, .. } => {
                warn!("{}", event.description())
            }
            KioskEvent::SystemError { .. } => error!("{}", event.description()),
            _ => debug!("Publishing event: {}", event.description()),
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Which events a [`EventReceiver`] passes on
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    EventTypes(Vec<&'static str>),
}

impl EventFilter {
    pub fn matches(&self, event: &KioskEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
        }
    }
}

/// Named, filtered view of the bus
pub struct EventReceiver {
    receiver: broadcast::Receiver<KioskEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    fn lagged(&self, skipped: u64) -> EventBusError {
        warn!("Receiver '{}' lagged behind by {} events", self.name, skipped);
        EventBusError::Lagged {
            receiver: self.name.clone(),
            skipped,
        }
    }

    /// Wait for the next event that passes the filter
    pub async fn recv(&mut self) -> Result<KioskEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => {
                    trace!("Receiver '{}' got {}", self.name, event.event_type());
                    return Ok(event);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => return Err(self.lagged(n)),
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Next matching event already queued, if any
    pub fn try_recv(&mut self) -> Result<Option<KioskEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Ok(Some(event)),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => return Err(self.lagged(n)),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let event = KioskEvent::Toast {
            message: "Service started".to_string(),
        };

        let subscriber_count = event_bus.publish(event).await.unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            KioskEvent::Toast { message } => assert_eq!(message, "Service started"),
            _ => panic!("Unexpected event type"),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_fails() {
        let event_bus = EventBus::new(10);
        let result = event_bus.publish(KioskEvent::OverlayHidden).await;
        assert!(matches!(result, Err(EventBusError::PublishFailed { .. })));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus
            .publish(KioskEvent::Navigate(Screen::History))
            .await
            .unwrap();

        let _ = timeout(Duration::from_millis(100), receiver1.recv())
            .await
            .unwrap()
            .unwrap();
        let _ = timeout(Duration::from_millis(100), receiver2.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_event_filter() {
        let filter = EventFilter::EventTypes(vec!["operator", "navigate"]);

        assert!(filter.matches(&KioskEvent::Operator(OperatorCommand::RequestStop)));
        assert!(filter.matches(&KioskEvent::Navigate(Screen::Service)));
        assert!(!filter.matches(&KioskEvent::OverlayHidden));
        assert!(EventFilter::All.matches(&KioskEvent::OverlayHidden));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let mut receiver =
            event_bus.subscribe_filtered(EventFilter::EventTypes(vec!["operator"]), "test");

        event_bus.publish(KioskEvent::OverlayHidden).await.unwrap();
        event_bus
            .publish(KioskEvent::Operator(OperatorCommand::CancelStop))
            .await
            .unwrap();

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            event,
            KioskEvent::Operator(OperatorCommand::CancelStop)
        ));
        assert!(receiver.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lagged_receiver_reports_and_resumes() {
        let event_bus = EventBus::new(2);
        let mut receiver = event_bus.subscribe_filtered(EventFilter::All, "slow");

        for _ in 0..4 {
            event_bus.publish_now(KioskEvent::OverlayHidden).unwrap();
        }
        assert!(matches!(
            receiver.recv().await,
            Err(EventBusError::Lagged { skipped: 2, .. })
        ));
        assert!(matches!(receiver.recv().await, Ok(KioskEvent::OverlayHidden)));
    }

    #[test]
    fn test_operator_command_wire_format() {
        let json = serde_json::to_string(&OperatorCommand::ConfirmStart {
            class_id: Some("C1".to_string()),
        })
        .unwrap();
        assert_eq!(json, r#"{"command":"confirm_start","class_id":"C1"}"#);

        let parsed: OperatorCommand = serde_json::from_str(r#"{"command":"request_stop"}"#).unwrap();
        assert_eq!(parsed, OperatorCommand::RequestStop);
    }

    #[test]
    fn test_event_properties() {
        let event = KioskEvent::AttendanceMarked {
            student_id: "S1".to_string(),
            present_count: 4,
        };
        assert_eq!(event.event_type(), "attendance_marked");
        assert_eq!(event.description(), "Student S1 marked present (4 present)");
    }
}
