use std::collections::VecDeque;
use std::time::SystemTime;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::calendar::{CalendarState, ViewMode};
use crate::drag::{CommitResult, DropOutcome, DropTarget, PendingDrop, PointerGrab};
use crate::model::{CalendarEvent, EntryKind, EventFilter, EventPatch, NewEvent, User};
use crate::query_cache::{QueryCache, QueryKey};

const MAX_LOGS: usize = 200;
const QUICK_EVENT_MINUTES: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Calendar,
    EventDetail { event_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info,
    Warn,
    Error,
}

/// Client-side state: UI flags plus the server-state cache. Only the UI thread
/// touches it; network results arrive as [`Delta`]s.
#[derive(Debug, Clone)]
pub struct AppState {
    pub screen: Screen,
    pub calendar: CalendarState,
    pub cache: QueryCache,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
    pub backend_label: String,
    pub online: bool,
    pub last_sync: Option<SystemTime>,
    pub pending_delete: Option<String>,
    pub pointer: Option<PointerGrab>,
}

#[derive(Debug, Clone)]
pub enum Delta {
    EventsLoaded {
        filter: EventFilter,
        events: Vec<CalendarEvent>,
    },
    UsersLoaded(Vec<User>),
    FetchFailed {
        key: QueryKey,
        error: String,
    },
    EventUpdated(CalendarEvent),
    EventUpdateFailed {
        id: String,
        error: String,
    },
    EventCreated(CalendarEvent),
    EventDeleted {
        id: String,
    },
    MutationFailed {
        action: &'static str,
        error: String,
    },
    Log(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCommand {
    FetchEvents(EventFilter),
    FetchUsers,
    UpdateEvent { id: String, patch: EventPatch },
    CreateEvent(NewEvent),
    DeleteEvent { id: String },
}

impl AppState {
    pub fn new(calendar: CalendarState, cache: QueryCache) -> Self {
        Self {
            screen: Screen::Calendar,
            calendar,
            cache,
            logs: VecDeque::with_capacity(MAX_LOGS),
            help_overlay: false,
            backend_label: String::new(),
            online: true,
            last_sync: None,
            pending_delete: None,
            pointer: None,
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn notify(&mut self, level: Notice, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        match level {
            Notice::Info => log::info!("{msg}"),
            Notice::Warn => log::warn!("{msg}"),
            Notice::Error => log::error!("{msg}"),
        }
        let tag = match level {
            Notice::Info => "[INFO]",
            Notice::Warn => "[WARN]",
            Notice::Error => "[ERROR]",
        };
        self.push_log(format!("{tag} {msg}"));
    }

    pub fn last_notice(&self) -> Option<&str> {
        self.logs.back().map(|s| s.as_str())
    }

    pub fn visible_events(&self) -> Vec<CalendarEvent> {
        self.cache.events_in(&self.calendar.visible_range())
    }

    pub fn selected_event(&self) -> Option<CalendarEvent> {
        let events = self.visible_events();
        self.calendar.selected_event(&events).cloned()
    }

    pub fn users(&self) -> &[User] {
        self.cache.users()
    }

    pub fn attendee_initials(&self, event: &CalendarEvent) -> Vec<String> {
        event
            .attendees
            .iter()
            .map(|id| {
                self.cache
                    .user(*id)
                    .map(|u| u.initials())
                    .unwrap_or_else(|| format!("#{id}"))
            })
            .collect()
    }

    /// Commands needed to bring the visible range (and the roster) up to date.
    pub fn refresh_commands(&mut self, now: SystemTime, force: bool) -> Vec<ProviderCommand> {
        let mut out = Vec::new();
        let events_key = QueryKey::Events(self.calendar.visible_range());
        if force {
            self.cache.invalidate(&events_key);
        }
        if self.cache.needs_fetch(&events_key, now) && self.cache.begin_fetch(events_key) {
            if let QueryKey::Events(filter) = events_key {
                out.push(ProviderCommand::FetchEvents(filter));
            }
        }
        if self.cache.needs_fetch(&QueryKey::Users, now) && self.cache.begin_fetch(QueryKey::Users)
        {
            out.push(ProviderCommand::FetchUsers);
        }
        out
    }

    pub fn set_view(&mut self, view: ViewMode) {
        if self.calendar.drag.pending().is_some() {
            return;
        }
        self.calendar.set_view(view);
    }

    pub fn toggle_confirmation(&mut self) {
        self.calendar.show_confirmation = !self.calendar.show_confirmation;
        let msg = if self.calendar.show_confirmation {
            "Moves now ask for confirmation"
        } else {
            "Moves now save immediately"
        };
        self.notify(Notice::Info, msg);
    }

    /// Pick up the selected event. Read-only entries are refused with a notice.
    pub fn begin_drag(&mut self) -> bool {
        let Some(event) = self.selected_event() else {
            self.notify(Notice::Info, "Nothing to move on this day");
            return false;
        };
        self.begin_drag_event(&event)
    }

    pub fn begin_drag_event(&mut self, event: &CalendarEvent) -> bool {
        match self.calendar.drag.begin(event) {
            Ok(()) => {
                // Start from the event's own slot so an immediate drop is a no-op.
                self.calendar.cursor_slot = self.calendar.slot_for_time(event.start_date.time());
                self.notify(Notice::Info, format!("Moving \"{}\"", event.title));
                true
            }
            Err(err) => {
                self.notify(Notice::Warn, err.to_string());
                false
            }
        }
    }

    /// Release the dragged event under the keyboard cursor.
    pub fn drop_at_cursor(&mut self) -> Option<ProviderCommand> {
        let target = self.calendar.drop_target();
        self.drop_on(target)
    }

    pub fn drop_on(&mut self, target: Option<DropTarget>) -> Option<ProviderCommand> {
        let show_confirmation = self.calendar.show_confirmation;
        match self.calendar.drag.drop_on(target, show_confirmation) {
            DropOutcome::Cancelled => {
                log::debug!("drop outside the grid, move cancelled");
                None
            }
            DropOutcome::Unchanged => None,
            DropOutcome::AwaitingConfirmation(pending) => {
                let msg = format!("{} - confirm (y) or cancel (n)", describe_move(&pending));
                self.notify(Notice::Info, msg);
                None
            }
            DropOutcome::Commit(pending) => Some(self.commit_command(&pending)),
        }
    }

    /// Mouse press on an event: select it and remember where it was grabbed.
    pub fn press_event(&mut self, event_id: &str, at: Option<NaiveTime>) {
        let events = self.visible_events();
        if let Some(pos) = self
            .calendar
            .events_on_cursor(&events)
            .iter()
            .position(|e| e.id == event_id)
        {
            self.calendar.selected = pos;
        }
        self.pointer = Some(PointerGrab::new(event_id, at));
    }

    /// Pointer moved with the button held. The first move picks the event up;
    /// later ones move the cursor with the grab offset applied.
    pub fn drag_pointer(&mut self, date: NaiveDate, at: Option<NaiveTime>) {
        let Some(grab) = self.pointer.clone() else {
            return;
        };
        if !grab.moved {
            let event = self
                .visible_events()
                .into_iter()
                .find(|e| e.id == grab.event_id);
            if !event.is_some_and(|event| self.begin_drag_event(&event)) {
                self.pointer = None;
                return;
            }
            if let Some(pointer) = self.pointer.as_mut() {
                pointer.moved = true;
            }
        }
        let Some(start) = self
            .calendar
            .drag
            .active_event()
            .map(|event| grab.start_time(event, at))
        else {
            return;
        };
        if self.calendar.cursor != date {
            self.calendar.cursor = date;
            self.calendar.selected = 0;
        }
        if self.calendar.view != ViewMode::Month {
            self.calendar.cursor_slot = self.calendar.slot_for_time(start);
        }
    }

    /// Button released over `at` (day plus time under the pointer), or off the
    /// grid. Without a move since the press this was a click: nothing is sent.
    pub fn release_pointer(
        &mut self,
        at: Option<(NaiveDate, Option<NaiveTime>)>,
    ) -> Option<ProviderCommand> {
        let grab = self.pointer.take()?;
        if !grab.moved || !self.calendar.drag.is_dragging() {
            return None;
        }
        let event = self.calendar.drag.active_event()?.clone();
        let target = at.and_then(|(date, time)| {
            let start = time.map(|_| grab.start_time(&event, time));
            self.calendar.drop_target_at(date, start)
        });
        self.drop_on(target)
    }

    pub fn confirm_drop(&mut self) -> Option<ProviderCommand> {
        let pending = self.calendar.drag.confirm()?;
        Some(self.commit_command(&pending))
    }

    pub fn cancel_drag(&mut self) {
        if self.calendar.drag.cancel() {
            self.notify(Notice::Info, "Move cancelled");
        }
    }

    fn commit_command(&mut self, pending: &PendingDrop) -> ProviderCommand {
        self.notify(Notice::Info, format!("Saving: {}", describe_move(pending)));
        ProviderCommand::UpdateEvent {
            id: pending.event.id.clone(),
            patch: pending.patch(),
        }
    }

    /// One-hour placeholder event at the cursor slot.
    pub fn quick_create(&mut self) -> Option<ProviderCommand> {
        if !self.calendar.drag.is_idle() {
            return None;
        }
        let time = match self.calendar.view {
            ViewMode::Month => chrono::NaiveTime::from_hms_opt(18, 0, 0)?,
            ViewMode::Week | ViewMode::Day => self.calendar.slot_time(),
        };
        let start: NaiveDateTime = self.calendar.cursor.and_time(time);
        Some(ProviderCommand::CreateEvent(NewEvent {
            title: "New event".to_string(),
            description: String::new(),
            start_date: start,
            end_date: start + Duration::minutes(QUICK_EVENT_MINUTES),
            color: None,
            kind: EntryKind::Event,
            attendees: Vec::new(),
        }))
    }

    pub fn request_delete(&mut self) {
        let Some(event) = self.selected_event() else {
            return;
        };
        if !event.kind.capabilities().editable {
            self.notify(
                Notice::Warn,
                format!("\"{}\" is a {} and can't be deleted here", event.title, event.kind.label()),
            );
            return;
        }
        self.notify(Notice::Info, format!("Delete \"{}\"? (y/n)", event.title));
        self.pending_delete = Some(event.id);
    }

    pub fn confirm_delete(&mut self) -> Option<ProviderCommand> {
        let id = self.pending_delete.take()?;
        Some(ProviderCommand::DeleteEvent { id })
    }

    pub fn open_detail(&mut self) {
        if let Some(event) = self.selected_event() {
            self.screen = Screen::EventDetail { event_id: event.id };
        }
    }

    pub fn detail_event(&self) -> Option<&CalendarEvent> {
        match &self.screen {
            Screen::EventDetail { event_id } => self.cache.find_event(event_id),
            Screen::Calendar => None,
        }
    }
}

fn describe_move(pending: &PendingDrop) -> String {
    format!(
        "\"{}\" to {} {}",
        pending.event.title,
        pending.new_start.format("%a %d %b"),
        pending.new_start.format("%H:%M")
    )
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    apply_delta_at(state, delta, SystemTime::now());
}

pub fn apply_delta_at(state: &mut AppState, delta: Delta, now: SystemTime) {
    match delta {
        Delta::EventsLoaded { filter, events } => {
            if !state.cache.finish_events_fetch(filter, events, now) {
                log::debug!(
                    "dropped {} fetched before the last change",
                    QueryKey::Events(filter).label()
                );
            }
            state.online = true;
            state.last_sync = Some(now);
            let on_cursor = state.calendar.events_on_cursor(&state.visible_events()).len();
            state.calendar.clamp_selection(on_cursor);
        }
        Delta::UsersLoaded(users) => {
            state.cache.finish_fetch(&QueryKey::Users);
            state.cache.put_users(users, now);
        }
        Delta::FetchFailed { key, error } => {
            state.cache.finish_fetch(&key);
            state.online = false;
            state.notify(Notice::Warn, format!("Could not load {}: {error}", key.label()));
        }
        Delta::EventUpdated(event) => {
            // The cache only changes once the server has accepted the move.
            state.cache.apply_event(&event);
            let id = event.id.clone();
            if let CommitResult::Applied(event) = state.calendar.drag.finish_commit(&id, Ok(event))
            {
                state.notify(
                    Notice::Info,
                    format!(
                        "Saved \"{}\" ({} {})",
                        event.title,
                        event.start_date.format("%a %d %b"),
                        event.time_label()
                    ),
                );
            }
        }
        Delta::EventUpdateFailed { id, error } => {
            let title = state
                .cache
                .find_event(&id)
                .map(|e| e.title.clone())
                .unwrap_or_else(|| id.clone());
            if let CommitResult::Failed { error, .. } =
                state.calendar.drag.finish_commit(&id, Err(error))
            {
                state.notify(Notice::Error, format!("Could not move \"{title}\": {error}"));
            }
        }
        Delta::EventCreated(event) => {
            state.cache.apply_event(&event);
            state.notify(Notice::Info, format!("Created \"{}\"", event.title));
        }
        Delta::EventDeleted { id } => {
            state.cache.remove_event(&id);
            if matches!(&state.screen, Screen::EventDetail { event_id } if *event_id == id) {
                state.screen = Screen::Calendar;
            }
            state.notify(Notice::Info, "Event deleted");
        }
        Delta::MutationFailed { action, error } => {
            state.notify(Notice::Error, format!("Could not {action}: {error}"));
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}
