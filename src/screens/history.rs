use super::{MountedScreen, Screen, ScreenContext, ScreenView};
use crate::backend::{HistoryEntry, KioskBackend, Person};
use crate::events::OperatorCommand;
use crate::poller::{fetch_with_timeout, ScreenScheduler};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const UNTITLED_CLASS: &str = "Untitled Class";
pub const HISTORY_LOAD_FAILED: &str = "Failed to load class history";

/// One card on the class history grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryCard {
    pub id: Option<String>,
    pub subject: String,
    /// e.g. "March 4, 2025", or "-" when no date is known
    pub date: String,
    pub room: String,
    pub teacher: String,
    pub teacher_profile_pic_url: Option<String>,
    pub students_present: u32,
    pub time_in: String,
    pub time_out: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryView {
    pub loading: bool,
    pub error: Option<String>,
    pub cards: Vec<HistoryCard>,
    /// 1-based
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
}

fn format_date(at: Option<DateTime<Utc>>, tz: Tz) -> String {
    at.map(|at| at.with_timezone(&tz).format("%B %-d, %Y").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_time(at: Option<DateTime<Utc>>, tz: Tz) -> String {
    at.map(|at| at.with_timezone(&tz).format("%I:%M %p").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Newest first. Entries without any timestamp go last, in backend order.
pub(crate) fn sort_newest_first(entries: &mut [HistoryEntry]) {
    // sort_by is stable, so ties keep backend order
    entries.sort_by(|a, b| match (a.sort_key(), b.sort_key()) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// Fill in teacher names and pictures from `GET /teachers`
pub(crate) fn join_teachers(entries: &mut [HistoryEntry], teachers: &[Person]) {
    let by_id: HashMap<&str, &Person> = teachers.iter().map(|t| (t.id.as_str(), t)).collect();
    for entry in entries.iter_mut() {
        let Some(teacher) = entry.teacher_id.as_deref().and_then(|id| by_id.get(id)) else {
            continue;
        };
        let name = teacher.display_name();
        if !name.is_empty() {
            entry.teacher_name = Some(name);
        }
        if teacher.profile_pic_url.is_some() {
            entry.teacher_profile_pic_url = teacher.profile_pic_url.clone();
        }
    }
}

pub(crate) fn card(entry: &HistoryEntry, tz: Tz) -> HistoryCard {
    HistoryCard {
        id: entry.id.clone(),
        subject: entry
            .subject
            .clone()
            .unwrap_or_else(|| UNTITLED_CLASS.to_string()),
        date: format_date(entry.card_date(), tz),
        room: entry.room.clone().unwrap_or_else(|| "Room".to_string()),
        teacher: entry
            .teacher_name
            .clone()
            .or_else(|| entry.teacher_id.clone())
            .unwrap_or_else(|| "-".to_string()),
        teacher_profile_pic_url: entry.teacher_profile_pic_url.clone(),
        students_present: entry.students_present_total,
        time_in: format_time(entry.time_started, tz),
        time_out: format_time(entry.time_ended, tz),
    }
}

/// Loaded history plus paging state
pub(crate) struct HistoryState {
    entries: Vec<HistoryEntry>,
    error: Option<String>,
    loading: bool,
    page: usize,
    page_size: usize,
    tz: Tz,
}

impl HistoryState {
    pub(crate) fn new(page_size: usize, tz: Tz) -> Self {
        Self {
            entries: Vec::new(),
            error: None,
            loading: true,
            page: 1,
            page_size: page_size.max(1),
            tz,
        }
    }

    pub(crate) fn total_pages(&self) -> usize {
        self.entries.len().div_ceil(self.page_size)
    }

    pub(crate) fn loaded(&mut self, result: Result<Vec<HistoryEntry>, String>) {
        self.loading = false;
        match result {
            Ok(entries) => {
                self.entries = entries;
                self.error = None;
            }
            Err(message) => {
                self.entries.clear();
                self.error = Some(message);
            }
        }
        self.page = 1;
    }

    pub(crate) fn command(&mut self, command: &OperatorCommand) {
        match command {
            OperatorCommand::NextPage if self.page < self.total_pages() => self.page += 1,
            OperatorCommand::PreviousPage if self.page > 1 => self.page -= 1,
            _ => {}
        }
    }

    pub(crate) fn view(&self) -> HistoryView {
        let start = (self.page - 1) * self.page_size;
        HistoryView {
            loading: self.loading,
            error: self.error.clone(),
            cards: self
                .entries
                .iter()
                .skip(start)
                .take(self.page_size)
                .map(|entry| card(entry, self.tz))
                .collect(),
            page: self.page,
            total_pages: self.total_pages(),
            total: self.entries.len(),
        }
    }
}

/// History, sorted, with teacher names joined in. A failed teacher lookup
/// still shows the history.
pub(crate) async fn load_history(
    backend: &dyn KioskBackend,
    limit: u32,
    timeout: Duration,
) -> Result<Vec<HistoryEntry>, String> {
    let mut entries = match fetch_with_timeout(backend.history(limit), Some(timeout)).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to load class history: {}", e);
            return Err(HISTORY_LOAD_FAILED.to_string());
        }
    };
    sort_newest_first(&mut entries);

    let mut teacher_ids: Vec<String> = Vec::new();
    for id in entries.iter().filter_map(|e| e.teacher_id.clone()) {
        if !teacher_ids.contains(&id) {
            teacher_ids.push(id);
        }
    }

    if !teacher_ids.is_empty() {
        match fetch_with_timeout(backend.teachers(&teacher_ids), Some(timeout)).await {
            Ok(teachers) => join_teachers(&mut entries, &teachers),
            Err(e) => debug!("Teacher lookup for history failed: {}", e),
        }
    }

    info!("Loaded {} class history entries", entries.len());
    Ok(entries)
}

pub struct HistoryScreen;

impl HistoryScreen {
    pub fn mount(ctx: &ScreenContext) -> MountedScreen {
        let mut scheduler = ScreenScheduler::new("history");
        let (command_tx, mut commands) = mpsc::unbounded_channel();

        let backend = Arc::clone(&ctx.backend);
        let views = ctx.views.clone();
        let display = ctx.config.display.clone();
        let timeout = ctx.config.backend.request_timeout();

        scheduler.spawn("history-loop", async move {
            let mut state = HistoryState::new(display.history_page_size, display.tz());
            views.publish(ScreenView::History(state.view()));

            let loaded = load_history(backend.as_ref(), display.history_limit, timeout).await;
            state.loaded(loaded);
            views.publish(ScreenView::History(state.view()));

            while let Some(command) = commands.recv().await {
                if command == OperatorCommand::Refresh {
                    let loaded = load_history(backend.as_ref(), display.history_limit, timeout).await;
                    state.loaded(loaded);
                } else {
                    state.command(&command);
                }
                views.publish(ScreenView::History(state.view()));
            }
        });

        MountedScreen::new(Screen::History, scheduler, command_tx)
    }
}
