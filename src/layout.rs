//! Day-column layout for calendar events.
//!
//! Events that share time on a day are clustered into overlap groups (connected
//! components of the interval graph) and drawn side by side; everything else
//! spans the full column width. Rectangles are expressed in percent of the day
//! column so that any renderer can project them onto its own grid.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use ratatui::layout::Rect;

use crate::model::CalendarEvent;

/// Shortest span an event occupies for overlap and height purposes.
pub const MIN_EVENT_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for DayWindow {
    fn default() -> Self {
        Self::full_day()
    }
}

impl DayWindow {
    pub fn full_day() -> Self {
        Self {
            start_hour: 0,
            end_hour: 24,
        }
    }

    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        let start_hour = start_hour.min(23);
        let end_hour = end_hour.clamp(start_hour + 1, 24);
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn bounds(&self, date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        let midnight = date.and_time(NaiveTime::MIN);
        (
            midnight + Duration::hours(self.start_hour as i64),
            midnight + Duration::hours(self.end_hour as i64),
        )
    }

    pub fn total_minutes(&self) -> i64 {
        (self.end_hour - self.start_hour) as i64 * 60
    }
}

/// Placement in percent of the day column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventRect {
    pub top: f32,
    pub height: f32,
    pub left: f32,
    pub width: f32,
}

#[derive(Debug, Clone)]
pub struct PlacedEvent<'a> {
    pub event: &'a CalendarEvent,
    pub group: usize,
    pub column: usize,
    pub group_size: usize,
    pub rect: EventRect,
}

/// Minute offsets from the start of the visible window, `end > start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: i64,
    pub end: i64,
}

impl Span {
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

pub fn intersects_day(event: &CalendarEvent, date: NaiveDate) -> bool {
    let day_start = date.and_time(NaiveTime::MIN);
    let day_end = day_start + Duration::days(1);
    if event.start_date == event.end_date {
        return event.start_date >= day_start && event.start_date < day_end;
    }
    event.start_date < day_end && event.end_date > day_start
}

/// Events hosted by the day cell for `date`, in input order.
pub fn events_for_day<'a>(events: &'a [CalendarEvent], date: NaiveDate) -> Vec<&'a CalendarEvent> {
    events.iter().filter(|ev| intersects_day(ev, date)).collect()
}

/// Minutes the event occupies inside the visible window, or `None` when none
/// of it is visible. A zero-length event is visible when its instant is.
pub fn span_in_window(event: &CalendarEvent, date: NaiveDate, window: DayWindow) -> Option<Span> {
    let (win_start, win_end) = window.bounds(date);
    let visible = if event.start_date == event.end_date {
        event.start_date >= win_start && event.start_date < win_end
    } else {
        event.start_date < win_end && event.end_date > win_start
    };
    if !visible {
        return None;
    }
    let total = window.total_minutes();

    let start = event.start_date.clamp(win_start, win_end);
    let end = event.end_date.clamp(win_start, win_end);
    let mut s = (start - win_start).num_minutes();
    let mut e = (end - win_start).num_minutes().max(s);

    let min_len = MIN_EVENT_MINUTES.min(total);
    if e - s < min_len {
        e = s + min_len;
        if e > total {
            e = total;
            s = total - min_len;
        }
    }
    Some(Span { start: s, end: e })
}

/// Partition spans into overlap groups. Each group lists member indices in
/// input order; groups are ordered by their earliest start.
pub fn overlap_groups(spans: &[Span]) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..spans.len()).collect();
    order.sort_by_key(|&idx| (spans[idx].start, idx));

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut group_end = i64::MIN;
    for idx in order {
        let span = spans[idx];
        match groups.last_mut() {
            Some(group) if span.start < group_end => {
                group.push(idx);
                group_end = group_end.max(span.end);
            }
            _ => {
                groups.push(vec![idx]);
                group_end = span.end;
            }
        }
    }
    for group in &mut groups {
        group.sort_unstable();
    }
    groups
}

/// Lay out the events of one day. Output is in input order; events entirely
/// outside the window are left out.
pub fn layout_day<'a>(
    events: &[&'a CalendarEvent],
    date: NaiveDate,
    window: DayWindow,
) -> Vec<PlacedEvent<'a>> {
    let (visible, spans): (Vec<&'a CalendarEvent>, Vec<Span>) = events
        .iter()
        .filter_map(|&ev| span_in_window(ev, date, window).map(|span| (ev, span)))
        .unzip();
    let total = window.total_minutes() as f32;

    let mut slots: Vec<Option<(usize, usize, usize)>> = vec![None; visible.len()];
    for (group_idx, members) in overlap_groups(&spans).iter().enumerate() {
        for (column, &idx) in members.iter().enumerate() {
            slots[idx] = Some((group_idx, column, members.len()));
        }
    }

    visible
        .into_iter()
        .zip(spans.iter())
        .zip(slots)
        .filter_map(|((event, span), slot)| {
            let (group, column, group_size) = slot?;
            let width = 100.0 / group_size as f32;
            Some(PlacedEvent {
                event,
                group,
                column,
                group_size,
                rect: EventRect {
                    top: span.start as f32 / total * 100.0,
                    height: (span.end - span.start) as f32 / total * 100.0,
                    left: column as f32 * width,
                    width,
                },
            })
        })
        .collect()
}

/// Map a percent rectangle onto terminal cells inside `area`.
pub fn project(rect: EventRect, area: Rect) -> Rect {
    if area.width == 0 || area.height == 0 {
        return Rect::new(area.x, area.y, 0, 0);
    }
    let (x, width) = project_axis(rect.left, rect.width, area.x, area.width);
    let (y, height) = project_axis(rect.top, rect.height, area.y, area.height);
    Rect::new(x, y, width, height)
}

fn project_axis(offset_pct: f32, len_pct: f32, origin: u16, extent: u16) -> (u16, u16) {
    let scale = |pct: f32| -> u16 {
        let cells = (pct.clamp(0.0, 100.0) / 100.0 * extent as f32).round();
        cells as u16
    };
    let start = scale(offset_pct).min(extent - 1);
    let end = scale(offset_pct + len_pct).clamp(start + 1, extent);
    (origin + start, end - start)
}
