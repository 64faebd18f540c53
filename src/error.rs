use thiserror::Error;

#[derive(Error, Debug)]
pub enum RollcallError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Status server error: {0}")]
    StatusServer(#[from] StatusServerError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl RollcallError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Failures talking to the attendance backend.
///
/// None of these are allowed to escape a screen: pollers fold them into a
/// failed `PollResult` and the view-model turns them into a degraded state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Backend unreachable: {details}")]
    NetworkUnavailable { details: String },

    #[error("Backend returned HTTP {status}{}", code.as_deref().map(|c| format!(" ({})", c)).unwrap_or_default())]
    Backend { status: u16, code: Option<String> },

    #[error("Malformed backend response: {details}")]
    MalformedResponse { details: String },

    #[error("Authorization denied: {details}")]
    AuthorizationDenied { details: String },

    #[error("Stale result {seq} (latest applied {latest})")]
    StaleResult { seq: u64, latest: u64 },
}

impl BackendError {
    pub fn network<S: Into<String>>(details: S) -> Self {
        Self::NetworkUnavailable {
            details: details.into(),
        }
    }

    pub fn malformed<S: Into<String>>(details: S) -> Self {
        Self::MalformedResponse {
            details: details.into(),
        }
    }

    /// Short machine-friendly name used in logs and the status API
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::NetworkUnavailable { .. } => "network_unavailable",
            BackendError::Backend { .. } => "backend_error",
            BackendError::MalformedResponse { .. } => "malformed_response",
            BackendError::AuthorizationDenied { .. } => "authorization_denied",
            BackendError::StaleResult { .. } => "stale_result",
        }
    }

    /// Error code carried in a `{ "error": ... }` body, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            BackendError::Backend { code, .. } => code.as_deref(),
            BackendError::AuthorizationDenied { details } => Some(details.as_str()),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, BackendError::NetworkUnavailable { .. })
    }
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver '{receiver}' skipped {skipped} events")]
    Lagged { receiver: String, skipped: u64 },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

#[derive(Error, Debug)]
pub enum StatusServerError {
    #[error("Failed to bind status server to {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Status server failed: {details}")]
    StartupFailed { details: String },
}

pub type Result<T> = std::result::Result<T, RollcallError>;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display_includes_code() {
        let err = BackendError::Backend {
            status: 400,
            code: Some("invalid_code".to_string()),
        };
        assert_eq!(err.to_string(), "Backend returned HTTP 400 (invalid_code)");
        assert_eq!(err.code(), Some("invalid_code"));

        let bare = BackendError::Backend {
            status: 503,
            code: None,
        };
        assert_eq!(bare.to_string(), "Backend returned HTTP 503");
    }

    #[test]
    fn test_backend_error_kind() {
        assert_eq!(BackendError::network("refused").kind(), "network_unavailable");
        assert_eq!(BackendError::malformed("x").kind(), "malformed_response");
        assert!(BackendError::network("timeout").is_network());
        assert!(!BackendError::malformed("x").is_network());
    }

    #[test]
    fn test_conversion_into_top_level() {
        let err: RollcallError = BackendError::network("down").into();
        assert!(matches!(err, RollcallError::Backend(_)));
    }
}
