use super::{MountedScreen, Screen, ScreenContext, ScreenView};
use crate::backend::Notification;
use crate::config::PollingConfig;
use crate::events::OperatorCommand;
use crate::poller::{PollResult, PollerSpec, ScreenScheduler, SequenceGuard, SequenceSource};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const LOAD_FAILED: &str = "Failed to load notifications";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationFilter {
    #[default]
    All,
    Unread,
    Alert,
    Info,
    Success,
}

impl NotificationFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationFilter::All => "all",
            NotificationFilter::Unread => "unread",
            NotificationFilter::Alert => "alert",
            NotificationFilter::Info => "info",
            NotificationFilter::Success => "success",
        }
    }

    pub fn matches(&self, notification: &Notification, read: bool) -> bool {
        match self {
            NotificationFilter::All => true,
            NotificationFilter::Unread => !read,
            NotificationFilter::Alert => notification.kind == "alert",
            NotificationFilter::Info => notification.kind == "info",
            NotificationFilter::Success => notification.kind == "success",
        }
    }
}

impl fmt::Display for NotificationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(NotificationFilter::All),
            "unread" => Ok(NotificationFilter::Unread),
            "alert" => Ok(NotificationFilter::Alert),
            "info" => Ok(NotificationFilter::Info),
            "success" => Ok(NotificationFilter::Success),
            other => Err(format!("unknown notification filter '{}'", other)),
        }
    }
}

/// "12s ago", "5m ago", "3h ago", "2d ago", then "Mar 4"
pub fn relative_time(at: Option<DateTime<Utc>>, now: DateTime<Utc>, tz: Tz) -> String {
    let Some(at) = at else {
        return String::new();
    };
    let secs = (now - at).num_seconds().max(0);
    if secs < 60 {
        return format!("{}s ago", secs);
    }
    let mins = secs / 60;
    if mins < 60 {
        return format!("{}m ago", mins);
    }
    let hours = mins / 60;
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    let days = hours / 24;
    if days < 7 {
        return format!("{}d ago", days);
    }
    at.with_timezone(&tz).format("%b %-d").to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationItem {
    pub id: String,
    pub title: String,
    pub kind: String,
    pub details: Option<serde_json::Value>,
    pub timestamp: Option<DateTime<Utc>>,
    pub relative_time: String,
    pub is_read: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationsView {
    pub filter: NotificationFilter,
    pub items: Vec<NotificationItem>,
    pub unread: usize,
    pub error: Option<String>,
}

/// Notification feed with read marks kept locally across refreshes
pub(crate) struct NotificationsState {
    notifications: Vec<Notification>,
    read: HashSet<String>,
    filter: NotificationFilter,
    error: Option<String>,
    tz: Tz,
}

impl NotificationsState {
    pub(crate) fn new(tz: Tz) -> Self {
        Self {
            notifications: Vec::new(),
            read: HashSet::new(),
            filter: NotificationFilter::All,
            error: None,
            tz,
        }
    }

    fn is_read(&self, notification: &Notification) -> bool {
        notification.is_read || self.read.contains(&notification.id)
    }

    /// A failed refresh keeps the previous list on screen
    pub(crate) fn loaded(&mut self, result: PollResult<Vec<Notification>>) {
        match result.payload {
            Some(mut notifications) => {
                // Newest first, undated last
                notifications.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                self.notifications = notifications;
                self.error = None;
            }
            None => {
                if let Some(e) = &result.error {
                    warn!("Failed to load notifications: {}", e);
                }
                self.error = Some(LOAD_FAILED.to_string());
            }
        }
    }

    pub(crate) fn command(&mut self, command: &OperatorCommand) {
        match command {
            OperatorCommand::MarkRead { id } => {
                self.read.insert(id.clone());
            }
            OperatorCommand::MarkAllRead => {
                let ids: Vec<String> = self.notifications.iter().map(|n| n.id.clone()).collect();
                self.read.extend(ids);
            }
            OperatorCommand::SetFilter { filter } => match filter.parse() {
                Ok(filter) => self.filter = filter,
                Err(e) => debug!("{}", e),
            },
            _ => {}
        }
    }

    pub(crate) fn view(&self, now: DateTime<Utc>) -> NotificationsView {
        NotificationsView {
            filter: self.filter,
            items: self
                .notifications
                .iter()
                .filter(|n| self.filter.matches(n, self.is_read(n)))
                .map(|n| NotificationItem {
                    id: n.id.clone(),
                    title: n.title.clone(),
                    kind: n.kind.clone(),
                    details: n.details.clone(),
                    timestamp: n.timestamp,
                    relative_time: relative_time(n.timestamp, now, self.tz),
                    is_read: self.is_read(n),
                })
                .collect(),
            unread: self.notifications.iter().filter(|n| !self.is_read(n)).count(),
            error: self.error.clone(),
        }
    }
}

pub struct NotificationsScreen;

impl NotificationsScreen {
    pub fn mount(ctx: &ScreenContext) -> MountedScreen {
        let mut scheduler = ScreenScheduler::new("notifications");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (command_tx, mut commands) = mpsc::unbounded_channel();

        let backend = Arc::clone(&ctx.backend);
        scheduler.poll(
            PollerSpec::new(
                "notifications",
                PollingConfig::interval(ctx.config.polling.notifications),
            )
            .with_timeout(ctx.config.backend.request_timeout()),
            SequenceSource::new(),
            move || {
                let backend = Arc::clone(&backend);
                async move { backend.notifications().await }
            },
            move |result| {
                let _ = tx.send(result);
            },
        );

        let views = ctx.views.clone();
        let tz = ctx.config.display.tz();

        scheduler.spawn("notifications-loop", async move {
            let mut state = NotificationsState::new(tz);
            let mut guard = SequenceGuard::new();
            views.publish(ScreenView::Notifications(state.view(Utc::now())));

            loop {
                tokio::select! {
                    Some(result) = rx.recv() => {
                        if guard.admit(result.seq).is_err() {
                            continue;
                        }
                        state.loaded(result);
                    }
                    Some(command) = commands.recv() => state.command(&command),
                    else => break,
                }
                views.publish(ScreenView::Notifications(state.view(Utc::now())));
            }
        });

        MountedScreen::new(Screen::Notifications, scheduler, command_tx)
    }
}
