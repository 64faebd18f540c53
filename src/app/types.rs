use serde::Serialize;

/// Component lifecycle states
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// System shutdown reason
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    UserRequest(String),
}
