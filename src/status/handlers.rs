use crate::events::{KioskEvent, OperatorCommand};
use crate::frame::CameraFrame;
use crate::screens::{redeem_code, Screen};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use bytes::Bytes;
use futures::stream::Stream;
use serde::Deserialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::Ordering;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::server::ServerState;

/// Map `/operator/{command}` plus its query string onto a command
pub fn parse_operator_command(
    name: &str,
    params: &HashMap<String, String>,
) -> Result<OperatorCommand, String> {
    let param = |key: &str| params.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let command = match name {
        "open_class_chooser" => OperatorCommand::OpenClassChooser,
        "confirm_start" => OperatorCommand::ConfirmStart {
            class_id: param("class_id"),
        },
        "cancel_class_chooser" => OperatorCommand::CancelClassChooser,
        "request_stop" => OperatorCommand::RequestStop,
        "cancel_stop" => OperatorCommand::CancelStop,
        "refresh" => OperatorCommand::Refresh,
        "next_page" => OperatorCommand::NextPage,
        "previous_page" => OperatorCommand::PreviousPage,
        "mark_all_read" => OperatorCommand::MarkAllRead,
        "mark_read" => OperatorCommand::MarkRead {
            id: param("id").ok_or("mark_read needs an id")?,
        },
        "set_filter" => OperatorCommand::SetFilter {
            filter: param("filter").ok_or("set_filter needs a filter")?,
        },
        other => return Err(format!("unknown operator command '{}'", other)),
    };
    Ok(command)
}

fn error_body(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn jpeg_part(frame: &CameraFrame) -> Bytes {
    let header = format!(
        "--FRAME\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\nX-Frame-ID: {}\r\nX-Timestamp: {}\r\n\r\n",
        frame.size(),
        frame.id,
        frame
            .timestamp
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis()
    );
    let mut part = Vec::with_capacity(header.len() + frame.size() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(&frame.data);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}

/// Handler for health check endpoint
pub async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let frames = state.frames.stats();
    let latest = state.frames.latest();
    let overlay = state.overlay.snapshot();

    let health_info = serde_json::json!({
        "status": "healthy",
        "backend_reachable": state.reachable.load(Ordering::Relaxed),
        "overlay": overlay,
        "camera": {
            "frames_received": frames.frames_received,
            "fetch_failures": frames.fetch_failures,
            "latest_frame_id": latest.map(|f| f.id),
        },
        "server_info": {
            "subscribers": state.event_bus.subscriber_count(),
        }
    });

    (StatusCode::OK, Json(health_info))
}

pub async fn view_handler(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.views.current())
}

pub async fn overlay_handler(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.overlay.snapshot())
}

/// Server-sent events: the current view, then every change
pub async fn view_stream_handler(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New view stream client connected");
    let mut views = state.views.subscribe();

    let stream = async_stream::stream! {
        loop {
            let view = views.borrow_and_update().clone();
            match Event::default().event("view").json_data(&view) {
                Ok(event) => yield Ok(event),
                Err(e) => warn!("Failed to encode view: {}", e),
            }
            if views.changed().await.is_err() {
                break;
            }
        }
        debug!("View stream ended");
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Latest polled camera frame
pub async fn camera_frame_handler(State(state): State<ServerState>) -> Response {
    match state.frames.latest() {
        Some(frame) => (
            [
                (header::CONTENT_TYPE, "image/jpeg"),
                (header::CACHE_CONTROL, "no-cache, private"),
            ],
            frame.data,
        )
            .into_response(),
        None => error_body(
            StatusCode::SERVICE_UNAVAILABLE,
            "no camera frame yet".to_string(),
        ),
    }
}

/// Multipart JPEG stream of every polled frame
pub async fn mjpeg_stream_handler(State(state): State<ServerState>) -> Response {
    info!("New MJPEG stream client connected");
    let mut frames = state.frames.subscribe();
    let first = state.frames.latest();

    let stream = async_stream::stream! {
        let mut frames_streamed = 0u64;
        if let Some(frame) = first {
            frames_streamed += 1;
            yield Ok::<_, Infallible>(jpeg_part(&frame));
        }

        loop {
            match frames.recv().await {
                Ok(frame) => {
                    frames_streamed += 1;
                    yield Ok(jpeg_part(&frame));
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("MJPEG client skipped {} frames", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        info!("MJPEG client finished after {} frames", frames_streamed);
    };

    (
        [
            (
                header::CONTENT_TYPE,
                "multipart/x-mixed-replace; boundary=FRAME",
            ),
            (header::CACHE_CONTROL, "no-cache, private"),
            (header::PRAGMA, "no-cache"),
        ],
        axum::body::Body::from_stream(stream),
    )
        .into_response()
}

pub async fn operator_handler(
    State(state): State<ServerState>,
    Path(command): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let command = match parse_operator_command(&command, &params) {
        Ok(command) => command,
        Err(message) => return error_body(StatusCode::BAD_REQUEST, message),
    };

    debug!("Operator command from status API: {:?}", command);
    match state.event_bus.publish_now(KioskEvent::Operator(command)) {
        Ok(_) => StatusCode::ACCEPTED.into_response(),
        Err(e) => error_body(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

pub async fn navigate_handler(
    State(state): State<ServerState>,
    Path(screen): Path<String>,
) -> Response {
    let screen: Screen = match screen.parse() {
        Ok(screen) => screen,
        Err(message) => return error_body(StatusCode::NOT_FOUND, message),
    };

    match state.event_bus.publish_now(KioskEvent::Navigate(screen)) {
        Ok(_) => StatusCode::ACCEPTED.into_response(),
        Err(e) => error_body(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub code: String,
}

pub async fn register_handler(
    State(state): State<ServerState>,
    Json(request): Json<RegisterRequest>,
) -> Response {
    let outcome = redeem_code(state.backend.as_ref(), &request.code, state.request_timeout).await;
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(outcome)).into_response()
}
