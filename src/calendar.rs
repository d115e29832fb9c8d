use chrono::{Datelike, Duration, Months, NaiveDate, NaiveTime, Timelike, Weekday};

use crate::drag::{DragContext, DropTarget};
use crate::layout::{self, DayWindow};
use crate::model::{CalendarEvent, EventFilter};

pub const SLOT_MINUTES: u32 = 30;
const MONTH_GRID_WEEKS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Month,
    Week,
    Day,
}

impl ViewMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "month" | "m" => Some(ViewMode::Month),
            "week" | "w" => Some(ViewMode::Week),
            "day" | "d" => Some(ViewMode::Day),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Month => "Month",
            ViewMode::Week => "Week",
            ViewMode::Day => "Day",
        }
    }
}

/// Everything the calendar surface owns: what is on screen, where the cursor
/// is, and the single drag session.
#[derive(Debug, Clone)]
pub struct CalendarState {
    pub view: ViewMode,
    pub today: NaiveDate,
    pub cursor: NaiveDate,
    pub cursor_slot: u32,
    pub selected: usize,
    pub window: DayWindow,
    pub show_confirmation: bool,
    pub drag: DragContext,
}

impl CalendarState {
    pub fn new(today: NaiveDate, view: ViewMode, window: DayWindow, show_confirmation: bool) -> Self {
        let mut state = Self {
            view,
            today,
            cursor: today,
            cursor_slot: 0,
            selected: 0,
            window,
            show_confirmation,
            drag: DragContext::new(),
        };
        state.cursor_slot = state.first_slot() + (9u32.saturating_sub(window.start_hour)) * 2;
        state.cursor_slot = state.cursor_slot.min(state.last_slot());
        state
    }

    pub fn first_slot(&self) -> u32 {
        self.window.start_hour * 60 / SLOT_MINUTES
    }

    pub fn last_slot(&self) -> u32 {
        self.window.end_hour * 60 / SLOT_MINUTES - 1
    }

    pub fn slot_time(&self) -> NaiveTime {
        let minutes = self.cursor_slot * SLOT_MINUTES;
        NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0).unwrap_or(NaiveTime::MIN)
    }

    pub fn week_start(date: NaiveDate) -> NaiveDate {
        date - Duration::days(date.weekday().num_days_from_monday() as i64)
    }

    pub fn week_days(&self) -> [NaiveDate; 7] {
        let start = Self::week_start(self.cursor);
        std::array::from_fn(|i| start + Duration::days(i as i64))
    }

    /// Six Monday-first weeks covering the cursor's month.
    pub fn month_grid(&self) -> Vec<[NaiveDate; 7]> {
        let first = self.cursor.with_day(1).unwrap_or(self.cursor);
        let start = Self::week_start(first);
        (0..MONTH_GRID_WEEKS)
            .map(|week| {
                let week_start = start + Duration::weeks(week as i64);
                std::array::from_fn(|i| week_start + Duration::days(i as i64))
            })
            .collect()
    }

    pub fn visible_days(&self) -> Vec<NaiveDate> {
        match self.view {
            ViewMode::Month => self.month_grid().into_iter().flatten().collect(),
            ViewMode::Week => self.week_days().to_vec(),
            ViewMode::Day => vec![self.cursor],
        }
    }

    pub fn visible_range(&self) -> EventFilter {
        let days = self.visible_days();
        let from = days.first().copied().unwrap_or(self.cursor);
        let to = days.last().copied().unwrap_or(self.cursor);
        EventFilter::new(from, to)
    }

    pub fn in_current_month(&self, date: NaiveDate) -> bool {
        date.month() == self.cursor.month() && date.year() == self.cursor.year()
    }

    pub fn set_view(&mut self, view: ViewMode) {
        self.view = view;
        self.selected = 0;
    }

    pub fn cycle_view(&mut self) {
        self.set_view(match self.view {
            ViewMode::Month => ViewMode::Week,
            ViewMode::Week => ViewMode::Day,
            ViewMode::Day => ViewMode::Month,
        });
    }

    pub fn move_days(&mut self, days: i64) {
        self.cursor += Duration::days(days);
        self.selected = 0;
    }

    pub fn move_slot(&mut self, delta: i32) {
        let next = self.cursor_slot as i64 + delta as i64;
        self.cursor_slot = next.clamp(self.first_slot() as i64, self.last_slot() as i64) as u32;
    }

    pub fn next_period(&mut self) {
        self.shift_period(1);
    }

    pub fn prev_period(&mut self) {
        self.shift_period(-1);
    }

    fn shift_period(&mut self, dir: i32) {
        self.cursor = match (self.view, dir >= 0) {
            (ViewMode::Month, true) => self.cursor.checked_add_months(Months::new(1)),
            (ViewMode::Month, false) => self.cursor.checked_sub_months(Months::new(1)),
            (ViewMode::Week, _) => Some(self.cursor + Duration::weeks(dir as i64)),
            (ViewMode::Day, _) => Some(self.cursor + Duration::days(dir as i64)),
        }
        .unwrap_or(self.cursor);
        self.selected = 0;
    }

    pub fn go_today(&mut self) {
        self.cursor = self.today;
        self.selected = 0;
    }

    pub fn is_weekend(date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// `None` when `date` is not a day cell of the rendered grid. Month cells
    /// ignore the time.
    pub fn drop_target_at(&self, date: NaiveDate, time: Option<NaiveTime>) -> Option<DropTarget> {
        if !self.visible_days().contains(&date) {
            return None;
        }
        Some(match self.view {
            ViewMode::Month => DropTarget::day(date),
            ViewMode::Week | ViewMode::Day => {
                DropTarget::slot(date, time.unwrap_or_else(|| self.slot_time()))
            }
        })
    }

    pub fn drop_target(&self) -> Option<DropTarget> {
        self.drop_target_at(self.cursor, Some(self.slot_time()))
    }

    pub fn slot_for_time(&self, time: NaiveTime) -> u32 {
        let minutes = time.hour() * 60 + time.minute();
        (minutes / SLOT_MINUTES).clamp(self.first_slot(), self.last_slot())
    }

    pub fn events_on_cursor<'a>(&self, events: &'a [CalendarEvent]) -> Vec<&'a CalendarEvent> {
        layout::events_for_day(events, self.cursor)
    }

    pub fn selected_event<'a>(&self, events: &'a [CalendarEvent]) -> Option<&'a CalendarEvent> {
        let on_day = self.events_on_cursor(events);
        if on_day.is_empty() {
            return None;
        }
        on_day.get(self.selected.min(on_day.len() - 1)).copied()
    }

    pub fn select_next(&mut self, count: usize) {
        if count == 0 {
            self.selected = 0;
        } else {
            self.selected = (self.selected + 1) % count;
        }
    }

    pub fn select_prev(&mut self, count: usize) {
        if count == 0 {
            self.selected = 0;
        } else {
            self.selected = (self.selected + count - 1) % count;
        }
    }

    pub fn clamp_selection(&mut self, count: usize) {
        self.selected = self.selected.min(count.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(view: ViewMode, day: u32) -> CalendarState {
        let today = NaiveDate::from_ymd_opt(2026, 1, day).unwrap();
        CalendarState::new(today, view, DayWindow::new(7, 22), true)
    }

    #[test]
    fn month_grid_starts_on_monday_and_covers_the_month() {
        let cal = state(ViewMode::Month, 15);
        let grid = cal.month_grid();
        assert_eq!(grid.len(), MONTH_GRID_WEEKS);
        assert_eq!(grid[0][0].weekday(), Weekday::Mon);
        assert_eq!(grid[0][0], NaiveDate::from_ymd_opt(2025, 12, 29).unwrap());
        assert!(grid.iter().flatten().any(|d| *d == NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()));
    }

    #[test]
    fn month_navigation_clamps_to_short_months() {
        let mut cal = state(ViewMode::Month, 31);
        cal.next_period();
        assert_eq!(cal.cursor, NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
        cal.prev_period();
        assert_eq!(cal.cursor, NaiveDate::from_ymd_opt(2026, 1, 28).unwrap());
    }

    #[test]
    fn cursor_slot_stays_inside_the_window() {
        let mut cal = state(ViewMode::Day, 5);
        assert_eq!(cal.slot_time(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        cal.move_slot(-100);
        assert_eq!(cal.slot_time(), NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        cal.move_slot(100);
        assert_eq!(cal.slot_time(), NaiveTime::from_hms_opt(21, 30, 0).unwrap());
    }
}
