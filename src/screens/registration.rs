use crate::backend::KioskBackend;
use crate::error::BackendError;
use crate::poller::fetch_with_timeout;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

const GENERIC_FAILURE: &str = "Registration failed. Please try again.";
const NETWORK_FAILURE: &str = "Unable to reach the kiosk service. Check the connection and try again.";

/// Human-readable message for a registration error code
pub fn registration_message(code: Option<&str>) -> String {
    let message = match code {
        Some("invalid_code") => "That registration code is not valid.",
        Some("code_used") => "That registration code has already been used.",
        Some("code_expired") => "That registration code has expired. Request a new one.",
        Some("firestore_unavailable") => "The registration service is unavailable right now. Try again later.",
        Some("already_registered") => "This kiosk is already registered.",
        _ => GENERIC_FAILURE,
    };
    message.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationOutcome {
    pub success: bool,
    pub code: Option<String>,
    pub message: String,
}

impl RegistrationOutcome {
    fn from_error(error: &BackendError) -> Self {
        let message = if error.is_network() {
            NETWORK_FAILURE.to_string()
        } else {
            registration_message(error.code())
        };
        Self {
            success: false,
            code: error.code().map(str::to_string),
            message,
        }
    }
}

/// Redeem a registration code against `POST /device/register/code`.
///
/// A call that outlasts `timeout` reads as a network failure.
pub async fn redeem_code(backend: &dyn KioskBackend, code: &str, timeout: Duration) -> RegistrationOutcome {
    let code = code.trim();
    if code.is_empty() {
        return RegistrationOutcome {
            success: false,
            code: Some("invalid_code".to_string()),
            message: registration_message(Some("invalid_code")),
        };
    }

    match fetch_with_timeout(backend.redeem_registration_code(code), Some(timeout)).await {
        Ok(()) => {
            info!("Kiosk registered");
            RegistrationOutcome {
                success: true,
                code: None,
                message: "Kiosk registered.".to_string(),
            }
        }
        Err(e) => {
            warn!("Registration failed: {}", e);
            RegistrationOutcome::from_error(&e)
        }
    }
}
