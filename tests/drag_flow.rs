use std::time::{Duration, SystemTime};

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime};
use clubhouse_terminal::calendar::{CalendarState, ViewMode};
use clubhouse_terminal::drag::{
    CommitResult, DragContext, DragError, DragPhase, DropOutcome, DropTarget,
};
use clubhouse_terminal::layout::DayWindow;
use clubhouse_terminal::model::{CalendarEvent, EntryKind, EventFilter};
use clubhouse_terminal::query_cache::QueryCache;
use clubhouse_terminal::state::{AppState, ProviderCommand};

fn day1() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, minute, 0).unwrap()
}

fn training() -> CalendarEvent {
    CalendarEvent {
        id: "a".to_string(),
        title: "U12 Training".to_string(),
        description: String::new(),
        start_date: at(day1(), 17, 30),
        end_date: at(day1(), 19, 0),
        color: None,
        kind: EntryKind::Event,
        attendees: vec![1],
        utc_offset: None,
    }
}

fn reservation() -> CalendarEvent {
    CalendarEvent {
        id: "r".to_string(),
        title: "Pitch 1 reserved".to_string(),
        kind: EntryKind::Reservation,
        ..training()
    }
}

fn state_with(events: Vec<CalendarEvent>, view: ViewMode, confirm: bool) -> AppState {
    let calendar = CalendarState::new(day1(), view, DayWindow::full_day(), confirm);
    let mut cache = QueryCache::new(Duration::from_secs(60));
    let filter = calendar.visible_range();
    cache.put_events(filter, events, SystemTime::now());
    AppState::new(calendar, cache)
}

#[test]
fn read_only_entries_never_leave_idle() {
    let mut drag = DragContext::new();
    let err = drag.begin(&reservation()).unwrap_err();
    assert!(matches!(err, DragError::NotDraggable { .. }));
    assert!(drag.is_idle());

    let other = CalendarEvent {
        kind: EntryKind::Other,
        ..training()
    };
    assert!(drag.begin(&other).is_err());
    assert!(drag.is_idle());
}

#[test]
fn second_drag_is_refused_while_busy() {
    let mut drag = DragContext::new();
    drag.begin(&training()).unwrap();
    let mut second = training();
    second.id = "b".to_string();
    assert_eq!(drag.begin(&second), Err(DragError::Busy));
    assert_eq!(drag.active_event().map(|e| e.id.as_str()), Some("a"));
}

#[test]
fn drop_preserves_duration() {
    let mut drag = DragContext::new();
    let event = training();
    drag.begin(&event).unwrap();
    let target = DropTarget::slot(day1() + ChronoDuration::days(3), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    let DropOutcome::AwaitingConfirmation(pending) = drag.drop_on(Some(target), true) else {
        panic!("expected a pending confirmation");
    };
    assert_eq!(pending.new_end - pending.new_start, event.end_date - event.start_date);
    assert_eq!(pending.new_start, at(day1() + ChronoDuration::days(3), 9, 0));

    let confirmed = drag.confirm().expect("pending drop");
    assert_eq!(confirmed, pending);
    assert!(matches!(drag.phase(), DragPhase::Committing(_)));
}

#[test]
fn month_drop_keeps_time_of_day() {
    let mut drag = DragContext::new();
    drag.begin(&training()).unwrap();
    let outcome = drag.drop_on(Some(DropTarget::day(day1() + ChronoDuration::days(1))), false);
    let DropOutcome::Commit(pending) = outcome else {
        panic!("expected a commit");
    };
    assert_eq!(pending.new_start, at(day1() + ChronoDuration::days(1), 17, 30));
    assert_eq!(pending.new_end, at(day1() + ChronoDuration::days(1), 19, 0));
    assert_eq!(pending.shift(), ChronoDuration::days(1));
}

#[test]
fn drop_outside_grid_cancels() {
    let mut drag = DragContext::new();
    drag.begin(&training()).unwrap();
    assert_eq!(drag.drop_on(None, true), DropOutcome::Cancelled);
    assert!(drag.is_idle());
}

#[test]
fn drop_on_origin_is_unchanged() {
    let mut drag = DragContext::new();
    let event = training();
    drag.begin(&event).unwrap();
    let target = DropTarget::slot(day1(), event.start_date.time());
    assert_eq!(drag.drop_on(Some(target), false), DropOutcome::Unchanged);
    assert!(drag.is_idle());
}

#[test]
fn drop_without_drag_is_ignored() {
    let mut drag = DragContext::new();
    assert_eq!(drag.drop_on(Some(DropTarget::day(day1())), false), DropOutcome::Cancelled);
    assert!(drag.confirm().is_none());
    assert!(!drag.cancel());
}

#[test]
fn cancelling_pending_drop_leaves_cache_untouched() {
    let mut state = state_with(vec![training()], ViewMode::Week, true);
    assert!(state.begin_drag());
    state.calendar.move_days(2);
    assert!(state.drop_at_cursor().is_none());
    assert!(state.calendar.drag.pending().is_some());

    state.cancel_drag();
    assert!(state.calendar.drag.is_idle());
    let stored = state.cache.find_event("a").unwrap();
    assert_eq!(stored.start_date, at(day1(), 17, 30));
    assert_eq!(stored.end_date, at(day1(), 19, 0));
}

#[test]
fn drag_across_two_days_without_confirmation_issues_update() {
    let mut state = state_with(vec![training()], ViewMode::Week, false);
    assert!(state.begin_drag());
    state.calendar.move_days(2);

    let cmd = state.drop_at_cursor().expect("update command");
    let ProviderCommand::UpdateEvent { id, patch } = cmd else {
        panic!("expected an update");
    };
    assert_eq!(id, "a");
    let start = patch.start_date.unwrap();
    let end = patch.end_date.unwrap();
    assert_eq!(start, at(day1(), 17, 30) + ChronoDuration::days(2));
    assert_eq!(end, at(day1(), 19, 0) + ChronoDuration::days(2));
    assert_eq!(end - start, ChronoDuration::minutes(90));
    assert!(matches!(state.calendar.drag.phase(), DragPhase::Committing(_)));
}

#[test]
fn confirmed_drop_issues_update() {
    let mut state = state_with(vec![training()], ViewMode::Day, true);
    assert!(state.begin_drag());
    state.calendar.move_slot(2);
    assert!(state.drop_at_cursor().is_none());

    let cmd = state.confirm_drop().expect("update after confirm");
    let ProviderCommand::UpdateEvent { patch, .. } = cmd else {
        panic!("expected an update");
    };
    assert_eq!(patch.start_date, Some(at(day1(), 18, 30)));
    assert_eq!(patch.end_date, Some(at(day1(), 20, 0)));
}

#[test]
fn reservation_cannot_be_picked_up_from_state() {
    let mut state = state_with(vec![reservation()], ViewMode::Week, false);
    assert!(!state.begin_drag());
    assert!(state.calendar.drag.is_idle());
    assert!(state.last_notice().unwrap().contains("can't be moved"));
}

#[test]
fn view_change_is_blocked_while_confirming() {
    let mut state = state_with(vec![training()], ViewMode::Week, true);
    state.begin_drag();
    state.calendar.move_days(1);
    state.drop_at_cursor();
    state.set_view(ViewMode::Month);
    assert_eq!(state.calendar.view, ViewMode::Week);
}

#[test]
fn drop_target_outside_visible_days_is_none() {
    let calendar = CalendarState::new(day1(), ViewMode::Week, DayWindow::full_day(), true);
    let far = day1() + ChronoDuration::days(30);
    assert!(calendar.drop_target_at(far, None).is_none());

    let month = CalendarState::new(day1(), ViewMode::Month, DayWindow::full_day(), true);
    let target = month
        .drop_target_at(day1(), NaiveTime::from_hms_opt(8, 0, 0))
        .unwrap();
    assert_eq!(target.time, None);
}

#[test]
fn finish_commit_returns_to_idle() {
    let mut drag = DragContext::new();
    drag.begin(&training()).unwrap();
    drag.drop_on(Some(DropTarget::day(day1() + ChronoDuration::days(1))), false);

    let result = drag.finish_commit("a", Err("http 503".to_string()));
    assert!(matches!(result, CommitResult::Failed { ref error, .. } if error == "http 503"));
    assert!(drag.is_idle());
}

#[test]
fn week_range_covers_monday_to_sunday() {
    let calendar = CalendarState::new(day1() + ChronoDuration::days(3), ViewMode::Week, DayWindow::full_day(), true);
    assert_eq!(
        calendar.visible_range(),
        EventFilter::new(day1(), day1() + ChronoDuration::days(6))
    );
}

fn clinic() -> CalendarEvent {
    CalendarEvent {
        id: "c".to_string(),
        title: "Keeper clinic".to_string(),
        start_date: at(day1(), 9, 15),
        end_date: at(day1(), 10, 0),
        ..training()
    }
}

fn time(hour: u32, minute: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(hour, minute, 0)
}

#[test]
fn click_without_moving_only_selects() {
    let mut state = state_with(vec![training(), clinic()], ViewMode::Week, false);
    // Second row of the 09:15 event.
    state.press_event("c", time(9, 30));
    assert_eq!(state.release_pointer(Some((day1(), time(9, 30)))), None);

    assert!(state.calendar.drag.is_idle());
    assert!(state.pointer.is_none());
    assert_eq!(state.selected_event().map(|e| e.id), Some("c".to_string()));
    assert_eq!(state.cache.find_event("c").unwrap().start_date, at(day1(), 9, 15));
}

#[test]
fn mouse_drag_keeps_the_grab_offset() {
    let mut state = state_with(vec![clinic()], ViewMode::Week, false);
    state.press_event("c", time(9, 30));
    state.drag_pointer(day1(), time(9, 30));
    assert!(state.calendar.drag.is_dragging());
    assert_eq!(state.release_pointer(Some((day1(), time(9, 30)))), None);
    assert!(state.calendar.drag.is_idle());

    let next = day1() + ChronoDuration::days(1);
    state.press_event("c", time(9, 30));
    state.drag_pointer(next, time(10, 0));
    state.drag_pointer(next, time(10, 30));
    assert_eq!(state.calendar.cursor, next);
    assert_eq!(state.calendar.cursor_slot, 20);

    let Some(ProviderCommand::UpdateEvent { id, patch }) =
        state.release_pointer(Some((next, time(10, 30))))
    else {
        panic!("expected an update");
    };
    assert_eq!(id, "c");
    assert_eq!(patch.start_date, Some(at(next, 10, 15)));
    assert_eq!(patch.end_date, Some(at(next, 11, 0)));
}

#[test]
fn mouse_release_off_the_grid_cancels() {
    let mut state = state_with(vec![clinic()], ViewMode::Week, true);
    state.press_event("c", time(9, 30));
    state.drag_pointer(day1(), time(11, 0));
    assert_eq!(state.release_pointer(None), None);
    assert!(state.calendar.drag.is_idle());
    assert_eq!(state.cache.find_event("c").unwrap().start_date, at(day1(), 9, 15));
}

#[test]
fn mouse_drag_on_reservation_never_starts() {
    let mut state = state_with(vec![reservation()], ViewMode::Week, false);
    state.press_event("r", time(18, 0));
    state.drag_pointer(day1(), time(19, 0));
    assert!(state.calendar.drag.is_idle());
    assert!(state.pointer.is_none());
    assert_eq!(state.release_pointer(Some((day1(), time(19, 0)))), None);
}
