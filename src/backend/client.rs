use super::normalize;
use super::types::*;
use crate::config::BackendConfig;
use crate::error::{BackendError, BackendResult};
use crate::overlay::{OverlayNotifier, OverlayReason};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Overlay message shown while a sync is in flight
pub const SYNC_OVERLAY_MESSAGE: &str = "Syncing...";

/// The attendance backend, one method per endpoint the kiosk uses.
///
/// Every method returns canonical types; shape sniffing stays inside the
/// implementation.
#[async_trait]
pub trait KioskBackend: Send + Sync {
    /// `GET /device/info`; `None` when this kiosk is not registered
    async fn device_info(&self) -> BackendResult<Option<DeviceInfo>>;

    /// `GET /session`; `None` when no class is running
    async fn session(&self) -> BackendResult<Option<SessionSnapshot>>;

    async fn start_session(&self, request: &StartSessionRequest) -> BackendResult<()>;

    async fn stop_session(&self) -> BackendResult<()>;

    /// `GET /session/attendance`, present student ids
    async fn attendance(&self) -> BackendResult<Vec<String>>;

    /// `POST /session/mark`, returns the updated present list
    async fn mark_attendance(&self, student_id: &str, student_name: &str) -> BackendResult<Vec<String>>;

    async fn recognize_teacher(&self) -> BackendResult<RecognitionReading>;

    async fn recognize_students(&self) -> BackendResult<RecognitionReading>;

    async fn detect(&self) -> BackendResult<FaceDetection>;

    async fn unrecognized(&self) -> BackendResult<UnrecognizedReport>;

    /// `GET /camera-feed`, one JPEG frame
    async fn camera_frame(&self) -> BackendResult<Bytes>;

    /// `GET /rooms[?kioskid=]`
    async fn rooms(&self, kiosk_id: Option<&str>) -> BackendResult<Vec<Room>>;

    async fn teachers(&self, ids: &[String]) -> BackendResult<Vec<Person>>;

    async fn students(&self, ids: &[String]) -> BackendResult<Vec<Person>>;

    async fn classes_for_teacher(&self, teacher_id: &str) -> BackendResult<Vec<ClassOption>>;

    async fn history(&self, limit: u32) -> BackendResult<Vec<HistoryEntry>>;

    async fn notifications(&self) -> BackendResult<Vec<Notification>>;

    /// `GET /sync`: pull rooms, people and classes from the cloud
    async fn sync(&self) -> BackendResult<()>;

    /// `POST /device/register/code`
    async fn redeem_registration_code(&self, code: &str) -> BackendResult<()>;
}

/// reqwest-backed client for the kiosk's local backend service
pub struct HttpBackend {
    client: Client,
    base_url: String,
    student_recognition_path: String,
    timeout: Duration,
    overlay: Option<Arc<dyn OverlayNotifier>>,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| BackendError::network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            student_recognition_path: config.student_recognition_path.clone(),
            timeout: config.request_timeout(),
            overlay: None,
        })
    }

    /// Attach the notifier used for the sync overlay
    pub fn with_overlay(mut self, overlay: Arc<dyn OverlayNotifier>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> BackendResult<Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::network(format!("timed out after {:?}", self.timeout))
            } else {
                BackendError::network(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let code = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| normalize::error_code(&body));

        if status == StatusCode::FORBIDDEN {
            return Err(BackendError::AuthorizationDenied {
                details: code.unwrap_or_else(|| status.to_string()),
            });
        }

        Err(BackendError::Backend {
            status: status.as_u16(),
            code,
        })
    }

    async fn get_json(&self, path: &str) -> BackendResult<Value> {
        debug!("GET {}", path);
        let response = self.send(self.client.get(self.url(path))).await?;
        read_json(response).await
    }

    async fn get_json_query(&self, path: &str, query: &[(&str, &str)]) -> BackendResult<Value> {
        debug!("GET {} {:?}", path, query);
        let response = self
            .send(self.client.get(self.url(path)).query(query))
            .await?;
        read_json(response).await
    }

    async fn post_json(&self, path: &str, body: Option<Value>) -> BackendResult<Value> {
        debug!("POST {}", path);
        let mut request = self.client.post(self.url(path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = self.send(request).await?;
        read_json(response).await
    }
}

async fn read_json(response: Response) -> BackendResult<Value> {
    let body = response
        .bytes()
        .await
        .map_err(|e| BackendError::network(e.to_string()))?;
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&body).map_err(|e| BackendError::malformed(e.to_string()))
}

#[async_trait]
impl KioskBackend for HttpBackend {
    async fn device_info(&self) -> BackendResult<Option<DeviceInfo>> {
        normalize::device_info(&self.get_json("/device/info").await?)
    }

    async fn session(&self) -> BackendResult<Option<SessionSnapshot>> {
        normalize::session(&self.get_json("/session").await?)
    }

    async fn start_session(&self, request: &StartSessionRequest) -> BackendResult<()> {
        let body = serde_json::to_value(request).map_err(|e| BackendError::malformed(e.to_string()))?;
        self.post_json("/session/start", Some(body)).await?;
        info!("Session start posted for class {}", request.class_id);
        Ok(())
    }

    async fn stop_session(&self) -> BackendResult<()> {
        self.post_json("/session/stop", None).await?;
        info!("Session stop posted");
        Ok(())
    }

    async fn attendance(&self) -> BackendResult<Vec<String>> {
        normalize::roster(&self.get_json("/session/attendance").await?)
    }

    async fn mark_attendance(&self, student_id: &str, student_name: &str) -> BackendResult<Vec<String>> {
        let body = json!({ "student_id": student_id, "student_name": student_name });
        let response = self.post_json("/session/mark", Some(body)).await?;
        normalize::roster(&response)
    }

    async fn recognize_teacher(&self) -> BackendResult<RecognitionReading> {
        normalize::recognition(&self.get_json("/recognize-teacher").await?, SubjectKind::Teacher)
    }

    async fn recognize_students(&self) -> BackendResult<RecognitionReading> {
        let payload = self.get_json(&self.student_recognition_path).await?;
        normalize::recognition(&payload, SubjectKind::Student)
    }

    async fn detect(&self) -> BackendResult<FaceDetection> {
        normalize::detection(&self.get_json("/detect").await?)
    }

    async fn unrecognized(&self) -> BackendResult<UnrecognizedReport> {
        normalize::unrecognized(&self.get_json("/unrecognized").await?)
    }

    async fn camera_frame(&self) -> BackendResult<Bytes> {
        let response = self.send(self.client.get(self.url("/camera-feed"))).await?;
        let is_image = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(BackendError::malformed("camera feed did not return an image"));
        }
        response
            .bytes()
            .await
            .map_err(|e| BackendError::network(e.to_string()))
    }

    async fn rooms(&self, kiosk_id: Option<&str>) -> BackendResult<Vec<Room>> {
        let payload = match kiosk_id {
            Some(id) => self.get_json_query("/rooms", &[("kioskid", id)]).await?,
            None => self.get_json("/rooms").await?,
        };
        normalize::rooms(&payload)
    }

    async fn teachers(&self, ids: &[String]) -> BackendResult<Vec<Person>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids.join(",");
        let payload = self.get_json_query("/teachers", &[("ids", joined.as_str())]).await?;
        normalize::people(&payload, "teachers")
    }

    async fn students(&self, ids: &[String]) -> BackendResult<Vec<Person>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids.join(",");
        let payload = self.get_json_query("/students", &[("ids", joined.as_str())]).await?;
        normalize::people(&payload, "students")
    }

    async fn classes_for_teacher(&self, teacher_id: &str) -> BackendResult<Vec<ClassOption>> {
        let payload = self
            .get_json_query("/session/classes", &[("teacher_id", teacher_id)])
            .await?;
        normalize::classes(&payload)
    }

    async fn history(&self, limit: u32) -> BackendResult<Vec<HistoryEntry>> {
        let limit = limit.to_string();
        let payload = self
            .get_json_query("/session/history", &[("limit", limit.as_str())])
            .await?;
        normalize::history(&payload)
    }

    async fn notifications(&self) -> BackendResult<Vec<Notification>> {
        normalize::notifications(&self.get_json("/kiosk_notifications").await?)
    }

    async fn sync(&self) -> BackendResult<()> {
        if let Some(overlay) = &self.overlay {
            overlay.show(OverlayReason::Sync, SYNC_OVERLAY_MESSAGE);
        }

        let result = self.get_json("/sync").await;

        if let Some(overlay) = &self.overlay {
            overlay.hide(OverlayReason::Sync);
        }

        match result {
            Ok(_) => {
                info!("Backend sync completed");
                Ok(())
            }
            Err(e) => {
                warn!("Backend sync failed: {}", e);
                Err(e)
            }
        }
    }

    async fn redeem_registration_code(&self, code: &str) -> BackendResult<()> {
        let body = json!({ "code": code.trim() });
        self.post_json("/device/register/code", Some(body)).await?;
        info!("Registration code accepted");
        Ok(())
    }
}
