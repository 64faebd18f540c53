use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RollcallConfig {
    pub backend: BackendConfig,
    pub polling: PollingConfig,
    pub recognition: RecognitionConfig,
    pub session: SessionConfig,
    pub display: DisplayConfig,
    pub status: StatusConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackendConfig {
    /// Base URL of the attendance backend
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Endpoint polled for student recognition results
    #[serde(default = "default_student_recognition_path")]
    pub student_recognition_path: String,
}

/// Poll intervals, all in milliseconds
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_session_interval")]
    pub session: u64,

    #[serde(default = "default_teacher_interval")]
    pub teacher: u64,

    #[serde(default = "default_student_interval")]
    pub student: u64,

    #[serde(default = "default_detect_interval")]
    pub detect: u64,

    #[serde(default = "default_unrecognized_interval")]
    pub unrecognized: u64,

    #[serde(default = "default_roster_interval")]
    pub roster: u64,

    /// Camera frame refresh (~15 FPS)
    #[serde(default = "default_camera_interval")]
    pub camera: u64,

    #[serde(default = "default_device_interval")]
    pub device: u64,

    #[serde(default = "default_notifications_interval")]
    pub notifications: u64,

    /// Backend reachability probe
    #[serde(default = "default_health_interval")]
    pub health: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RecognitionConfig {
    /// How long a teacher identity must be seen continuously before it is accepted
    #[serde(default = "default_hold_ms")]
    pub hold_ms: u64,

    /// Same as `hold_ms`, for students during an active session
    #[serde(default = "default_hold_ms")]
    pub student_hold_ms: u64,

    /// How long the "unidentified face" banner stays up once declared
    #[serde(default = "default_unrecognized_decay_ms")]
    pub unrecognized_decay_ms: u64,

    /// Backend unrecognized reports older than this are ignored
    #[serde(default = "default_unrecognized_window_secs")]
    pub unrecognized_window_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// How long a stop request waits for the starting teacher to re-scan
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,

    /// Minimum spacing between attendance marks for the same student
    #[serde(default = "default_mark_throttle_ms")]
    pub mark_throttle_ms: u64,

    /// Toast lifetime
    #[serde(default = "default_toast_ms")]
    pub toast_ms: u64,

    /// Consecutive failed session polls before the backend is reported unreachable
    #[serde(default = "default_unreachable_after_failures")]
    pub unreachable_after_failures: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DisplayConfig {
    /// IANA timezone used for dates shown on the kiosk
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_history_page_size")]
    pub history_page_size: usize,

    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StatusConfig {
    /// Serve the current view to a local renderer
    #[serde(default = "default_status_enabled")]
    pub enabled: bool,

    #[serde(default = "default_status_ip")]
    pub ip: String,

    #[serde(default = "default_status_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Read operator commands from the attached terminal
    #[serde(default = "default_operator_console")]
    pub operator_console: bool,
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl PollingConfig {
    pub fn interval(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }
}

impl RecognitionConfig {
    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    pub fn student_hold(&self) -> Duration {
        Duration::from_millis(self.student_hold_ms)
    }

    pub fn unrecognized_decay(&self) -> Duration {
        Duration::from_millis(self.unrecognized_decay_ms)
    }

    pub fn unrecognized_window(&self) -> Duration {
        Duration::from_secs(self.unrecognized_window_secs)
    }
}

impl SessionConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn mark_throttle(&self) -> Duration {
        Duration::from_millis(self.mark_throttle_ms)
    }

    pub fn toast(&self) -> Duration {
        Duration::from_millis(self.toast_ms)
    }
}

impl DisplayConfig {
    /// Parsed display timezone, falling back to UTC
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

impl RollcallConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("rollcall.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("backend.base_url", default_base_url())?
            .set_default(
                "backend.request_timeout_ms",
                default_request_timeout_ms() as i64,
            )?
            .set_default(
                "backend.student_recognition_path",
                default_student_recognition_path(),
            )?
            .set_default("polling.session", default_session_interval() as i64)?
            .set_default("polling.teacher", default_teacher_interval() as i64)?
            .set_default("polling.student", default_student_interval() as i64)?
            .set_default("polling.detect", default_detect_interval() as i64)?
            .set_default(
                "polling.unrecognized",
                default_unrecognized_interval() as i64,
            )?
            .set_default("polling.roster", default_roster_interval() as i64)?
            .set_default("polling.camera", default_camera_interval() as i64)?
            .set_default("polling.device", default_device_interval() as i64)?
            .set_default(
                "polling.notifications",
                default_notifications_interval() as i64,
            )?
            .set_default("polling.health", default_health_interval() as i64)?
            .set_default("recognition.hold_ms", default_hold_ms() as i64)?
            .set_default("recognition.student_hold_ms", default_hold_ms() as i64)?
            .set_default(
                "recognition.unrecognized_decay_ms",
                default_unrecognized_decay_ms() as i64,
            )?
            .set_default(
                "recognition.unrecognized_window_secs",
                default_unrecognized_window_secs() as i64,
            )?
            .set_default(
                "session.stop_timeout_secs",
                default_stop_timeout_secs() as i64,
            )?
            .set_default("session.mark_throttle_ms", default_mark_throttle_ms() as i64)?
            .set_default("session.toast_ms", default_toast_ms() as i64)?
            .set_default(
                "session.unreachable_after_failures",
                default_unreachable_after_failures() as i64,
            )?
            .set_default("display.timezone", default_timezone())?
            .set_default(
                "display.history_page_size",
                default_history_page_size() as i64,
            )?
            .set_default("display.history_limit", default_history_limit() as i64)?
            .set_default("status.enabled", default_status_enabled())?
            .set_default("status.ip", default_status_ip())?
            .set_default("status.port", default_status_port() as i64)?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default("system.operator_console", default_operator_console())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // ROLLCALL_BACKEND__BASE_URL=... style overrides
            .add_source(
                Environment::with_prefix("ROLLCALL")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: RollcallConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if reqwest::Url::parse(&self.backend.base_url).is_err() {
            return Err(ConfigError::Message(format!(
                "Backend base_url is not a valid URL: {}",
                self.backend.base_url
            )));
        }

        if self.backend.request_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Backend request_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if !self.backend.student_recognition_path.starts_with('/') {
            return Err(ConfigError::Message(
                "Backend student_recognition_path must start with '/'".to_string(),
            ));
        }

        let intervals = [
            ("session", self.polling.session),
            ("teacher", self.polling.teacher),
            ("student", self.polling.student),
            ("detect", self.polling.detect),
            ("unrecognized", self.polling.unrecognized),
            ("roster", self.polling.roster),
            ("camera", self.polling.camera),
            ("device", self.polling.device),
            ("notifications", self.polling.notifications),
            ("health", self.polling.health),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(ConfigError::Message(format!(
                    "Polling interval '{}' must be greater than 0",
                    name
                )));
            }
        }

        if self.recognition.hold_ms == 0 || self.recognition.student_hold_ms == 0 {
            return Err(ConfigError::Message(
                "Recognition hold must be greater than 0".to_string(),
            ));
        }

        if self.recognition.unrecognized_decay_ms == 0 {
            return Err(ConfigError::Message(
                "Recognition unrecognized_decay_ms must be greater than 0".to_string(),
            ));
        }

        if self.session.stop_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Session stop_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.session.toast_ms == 0 {
            return Err(ConfigError::Message(
                "Session toast_ms must be greater than 0".to_string(),
            ));
        }

        if self.session.unreachable_after_failures == 0 {
            return Err(ConfigError::Message(
                "Session unreachable_after_failures must be greater than 0".to_string(),
            ));
        }

        if self.display.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::Message(format!(
                "Unknown display timezone: {}",
                self.display.timezone
            )));
        }

        if self.display.history_page_size == 0 {
            return Err(ConfigError::Message(
                "Display history_page_size must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for RollcallConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                base_url: default_base_url(),
                request_timeout_ms: default_request_timeout_ms(),
                student_recognition_path: default_student_recognition_path(),
            },
            polling: PollingConfig {
                session: default_session_interval(),
                teacher: default_teacher_interval(),
                student: default_student_interval(),
                detect: default_detect_interval(),
                unrecognized: default_unrecognized_interval(),
                roster: default_roster_interval(),
                camera: default_camera_interval(),
                device: default_device_interval(),
                notifications: default_notifications_interval(),
                health: default_health_interval(),
            },
            recognition: RecognitionConfig {
                hold_ms: default_hold_ms(),
                student_hold_ms: default_hold_ms(),
                unrecognized_decay_ms: default_unrecognized_decay_ms(),
                unrecognized_window_secs: default_unrecognized_window_secs(),
            },
            session: SessionConfig {
                stop_timeout_secs: default_stop_timeout_secs(),
                mark_throttle_ms: default_mark_throttle_ms(),
                toast_ms: default_toast_ms(),
                unreachable_after_failures: default_unreachable_after_failures(),
            },
            display: DisplayConfig {
                timezone: default_timezone(),
                history_page_size: default_history_page_size(),
                history_limit: default_history_limit(),
            },
            status: StatusConfig {
                enabled: default_status_enabled(),
                ip: default_status_ip(),
                port: default_status_port(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
                operator_console: default_operator_console(),
            },
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_request_timeout_ms() -> u64 {
    3000
}
fn default_student_recognition_path() -> String {
    "/recognize-camera".to_string()
}

fn default_session_interval() -> u64 {
    3000
}
fn default_teacher_interval() -> u64 {
    1500
}
fn default_student_interval() -> u64 {
    800
}
fn default_detect_interval() -> u64 {
    700
}
fn default_unrecognized_interval() -> u64 {
    1200
}
fn default_roster_interval() -> u64 {
    1500
}
fn default_camera_interval() -> u64 {
    66
}
fn default_device_interval() -> u64 {
    5000
}
fn default_notifications_interval() -> u64 {
    10000
}
fn default_health_interval() -> u64 {
    3000
}

fn default_hold_ms() -> u64 {
    1500
}
fn default_unrecognized_decay_ms() -> u64 {
    3000
}
fn default_unrecognized_window_secs() -> u64 {
    10
}

fn default_stop_timeout_secs() -> u64 {
    30
}
fn default_mark_throttle_ms() -> u64 {
    10000
}
fn default_toast_ms() -> u64 {
    3000
}
fn default_unreachable_after_failures() -> u32 {
    3
}

fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_history_page_size() -> usize {
    3
}
fn default_history_limit() -> u32 {
    200
}

fn default_status_enabled() -> bool {
    true
}
fn default_status_ip() -> String {
    "127.0.0.1".to_string()
}
fn default_status_port() -> u16 {
    8090
}

fn default_event_bus_capacity() -> usize {
    100
}
fn default_operator_console() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RollcallConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.recognition.hold(), Duration::from_millis(1500));
        assert_eq!(config.session.stop_timeout(), Duration::from_secs(30));
        assert_eq!(config.polling.session, 3000);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[backend]
base_url = "http://10.0.0.5:8000"

[recognition]
hold_ms = 2000

[display]
timezone = "Asia/Manila"
"#
        )
        .unwrap();

        let config = RollcallConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.backend.base_url, "http://10.0.0.5:8000");
        assert_eq!(config.recognition.hold_ms, 2000);
        // Untouched values keep their defaults
        assert_eq!(config.recognition.student_hold_ms, 1500);
        assert_eq!(config.polling.teacher, 1500);
        assert_eq!(config.display.tz(), chrono_tz::Asia::Manila);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = RollcallConfig::load_from_file("/nonexistent/rollcall.toml").unwrap();
        assert_eq!(config.backend.base_url, "http://localhost:8000");
        assert_eq!(config.status.port, 8090);
    }

    #[test]
    fn test_config_validation() {
        let mut config = RollcallConfig::default();

        config.polling.camera = 0;
        assert!(config.validate().is_err());
        config.polling.camera = 66;
        assert!(config.validate().is_ok());

        config.backend.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
        config.backend.base_url = "http://localhost:8000".to_string();

        config.display.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());
        config.display.timezone = "UTC".to_string();

        config.backend.student_recognition_path = "recognize-camera".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_serializes_to_toml() {
        let rendered = toml::to_string_pretty(&RollcallConfig::default()).unwrap();
        assert!(rendered.contains("[backend]"));
        assert!(rendered.contains("hold_ms = 1500"));
    }
}
