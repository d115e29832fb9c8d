use std::time::{Duration, SystemTime};

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use clubhouse_terminal::calendar::{CalendarState, ViewMode};
use clubhouse_terminal::layout::DayWindow;
use clubhouse_terminal::model::{CalendarEvent, EntryKind, User};
use clubhouse_terminal::query_cache::{Freshness, QueryCache, QueryKey};
use clubhouse_terminal::state::{AppState, Delta, ProviderCommand, Screen, apply_delta_at};

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, minute, 0).unwrap()
}

fn event(id: &str, date: NaiveDate) -> CalendarEvent {
    CalendarEvent {
        id: id.to_string(),
        title: format!("Session {id}"),
        description: String::new(),
        start_date: at(date, 18, 0),
        end_date: at(date, 19, 30),
        color: None,
        kind: EntryKind::Event,
        attendees: vec![1, 9],
        utc_offset: None,
    }
}

fn base_state() -> AppState {
    let calendar = CalendarState::new(monday(), ViewMode::Week, DayWindow::new(7, 22), false);
    AppState::new(calendar, QueryCache::new(Duration::from_secs(60)))
}

fn loaded_state(now: SystemTime) -> AppState {
    let mut state = base_state();
    let filter = state.calendar.visible_range();
    apply_delta_at(
        &mut state,
        Delta::EventsLoaded {
            filter,
            events: vec![event("1", monday()), event("2", monday() + ChronoDuration::days(1))],
        },
        now,
    );
    state
}

#[test]
fn refresh_requests_events_and_users_once() {
    let mut state = base_state();
    let now = SystemTime::now();
    let cmds = state.refresh_commands(now, false);
    assert_eq!(
        cmds,
        vec![
            ProviderCommand::FetchEvents(state.calendar.visible_range()),
            ProviderCommand::FetchUsers
        ]
    );
    // In flight: nothing new until the deltas land.
    assert!(state.refresh_commands(now, false).is_empty());
}

#[test]
fn loaded_events_are_fresh_then_stale() {
    let now = SystemTime::now();
    let mut state = loaded_state(now);
    let key = QueryKey::Events(state.calendar.visible_range());
    assert_eq!(state.cache.freshness(&key, now), Freshness::Fresh);
    assert!(state.online);
    assert_eq!(state.visible_events().len(), 2);

    let later = now + Duration::from_secs(61);
    assert_eq!(state.cache.freshness(&key, later), Freshness::Stale);
    let cmds = state.refresh_commands(later, false);
    assert!(cmds.contains(&ProviderCommand::FetchEvents(state.calendar.visible_range())));
}

#[test]
fn forced_refresh_refetches_fresh_data() {
    let now = SystemTime::now();
    let mut state = loaded_state(now);
    apply_delta_at(&mut state, Delta::UsersLoaded(Vec::new()), now);
    assert!(state.refresh_commands(now, false).is_empty());
    let cmds = state.refresh_commands(now, true);
    assert_eq!(cmds.len(), 1);
}

#[test]
fn successful_commit_updates_cache_and_goes_idle() {
    let now = SystemTime::now();
    let mut state = loaded_state(now);
    assert!(state.begin_drag());
    state.calendar.move_days(2);
    let Some(ProviderCommand::UpdateEvent { id, patch }) = state.drop_at_cursor() else {
        panic!("expected an update");
    };

    let mut server_copy = state.cache.find_event(&id).unwrap().clone();
    server_copy.apply_patch(&patch);
    apply_delta_at(&mut state, Delta::EventUpdated(server_copy), now);

    assert!(state.calendar.drag.is_idle());
    let stored = state.cache.find_event("1").unwrap();
    assert_eq!(stored.start_date, at(monday() + ChronoDuration::days(2), 18, 0));
    assert!(state.last_notice().unwrap().starts_with("[INFO] Saved"));
    // Mutations mark event lists stale for the next tick.
    let key = QueryKey::Events(state.calendar.visible_range());
    assert_eq!(state.cache.freshness(&key, now), Freshness::Stale);
}

#[test]
fn fetch_sent_before_a_move_does_not_undo_it() {
    let now = SystemTime::now();
    let mut state = loaded_state(now);
    apply_delta_at(&mut state, Delta::UsersLoaded(Vec::new()), now);
    let filter = state.calendar.visible_range();
    let before_move = state.visible_events();
    assert_eq!(
        state.refresh_commands(now, true),
        vec![ProviderCommand::FetchEvents(filter)]
    );

    // The move is confirmed while that fetch is still out.
    let moved = event("1", monday() + ChronoDuration::days(2));
    apply_delta_at(&mut state, Delta::EventUpdated(moved.clone()), now);
    apply_delta_at(
        &mut state,
        Delta::EventsLoaded {
            filter,
            events: before_move,
        },
        now,
    );

    assert_eq!(state.cache.find_event("1").unwrap().start_date, moved.start_date);
    let key = QueryKey::Events(filter);
    assert_eq!(state.cache.freshness(&key, now), Freshness::Stale);
    assert_eq!(
        state.refresh_commands(now, false),
        vec![ProviderCommand::FetchEvents(filter)]
    );

    // A fetch sent after the move is stored as usual.
    let after_move = vec![moved, event("2", monday() + ChronoDuration::days(1))];
    apply_delta_at(
        &mut state,
        Delta::EventsLoaded {
            filter,
            events: after_move,
        },
        now,
    );
    assert_eq!(state.cache.freshness(&key, now), Freshness::Fresh);
    assert_eq!(
        state.cache.find_event("1").unwrap().start_date,
        at(monday() + ChronoDuration::days(2), 18, 0)
    );
}

#[test]
fn failed_commit_leaves_cache_unchanged() {
    let now = SystemTime::now();
    let mut state = loaded_state(now);
    state.begin_drag();
    state.calendar.move_days(3);
    assert!(state.drop_at_cursor().is_some());

    apply_delta_at(
        &mut state,
        Delta::EventUpdateFailed {
            id: "1".to_string(),
            error: "update event: http 503 Service Unavailable".to_string(),
        },
        now,
    );

    assert!(state.calendar.drag.is_idle());
    let stored = state.cache.find_event("1").unwrap();
    assert_eq!(stored.start_date, at(monday(), 18, 0));
    let notice = state.last_notice().unwrap();
    assert!(notice.starts_with("[ERROR] Could not move \"Session 1\""));
    assert!(notice.contains("503"));
}

#[test]
fn fetch_failure_marks_offline_and_frees_the_key() {
    let now = SystemTime::now();
    let mut state = base_state();
    let cmds = state.refresh_commands(now, false);
    let ProviderCommand::FetchEvents(filter) = cmds[0].clone() else {
        panic!("expected an events fetch");
    };
    apply_delta_at(
        &mut state,
        Delta::FetchFailed {
            key: QueryKey::Events(filter),
            error: "connection refused".to_string(),
        },
        now,
    );
    assert!(!state.online);
    assert!(!state.cache.is_inflight(&QueryKey::Events(filter)));
    assert!(state.last_notice().unwrap().contains("connection refused"));
}

#[test]
fn created_and_deleted_events_patch_the_cache() {
    let now = SystemTime::now();
    let mut state = loaded_state(now);
    apply_delta_at(
        &mut state,
        Delta::EventCreated(event("3", monday() + ChronoDuration::days(4))),
        now,
    );
    assert_eq!(state.visible_events().len(), 3);

    state.screen = Screen::EventDetail {
        event_id: "3".to_string(),
    };
    apply_delta_at(&mut state, Delta::EventDeleted { id: "3".to_string() }, now);
    assert_eq!(state.visible_events().len(), 2);
    assert_eq!(state.screen, Screen::Calendar);
}

#[test]
fn quick_create_uses_cursor_slot() {
    let now = SystemTime::now();
    let mut state = loaded_state(now);
    let Some(ProviderCommand::CreateEvent(new_event)) = state.quick_create() else {
        panic!("expected a create");
    };
    assert_eq!(new_event.start_date, at(monday(), 9, 0));
    assert_eq!(new_event.end_date, at(monday(), 10, 0));
    assert_eq!(new_event.kind, EntryKind::Event);
}

#[test]
fn delete_needs_confirmation_and_editable_kind() {
    let now = SystemTime::now();
    let mut state = loaded_state(now);
    state.request_delete();
    assert_eq!(state.pending_delete.as_deref(), Some("1"));
    assert_eq!(
        state.confirm_delete(),
        Some(ProviderCommand::DeleteEvent { id: "1".to_string() })
    );
    assert!(state.pending_delete.is_none());

    let mut reservation = event("9", monday());
    reservation.kind = EntryKind::Reservation;
    let filter = state.calendar.visible_range();
    apply_delta_at(
        &mut state,
        Delta::EventsLoaded {
            filter,
            events: vec![reservation],
        },
        now,
    );
    state.request_delete();
    assert!(state.pending_delete.is_none());
}

#[test]
fn attendee_initials_fall_back_to_ids() {
    let now = SystemTime::now();
    let mut state = loaded_state(now);
    apply_delta_at(
        &mut state,
        Delta::UsersLoaded(vec![User {
            id: 1,
            first_name: "Maria".to_string(),
            last_name: "Lopez".to_string(),
            role: None,
            avatar_url: None,
        }]),
        now,
    );
    let ev = state.cache.find_event("1").unwrap().clone();
    assert_eq!(state.attendee_initials(&ev), vec!["ML".to_string(), "#9".to_string()]);
}

#[test]
fn log_is_bounded() {
    let mut state = base_state();
    for i in 0..500 {
        apply_delta_at(&mut state, Delta::Log(format!("line {i}")), SystemTime::now());
    }
    assert_eq!(state.logs.len(), 200);
    assert_eq!(state.last_notice(), Some("line 499"));
}
