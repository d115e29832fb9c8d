use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

use crate::model::{CalendarEvent, EventPatch};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DragError {
    #[error("\"{title}\" is a {kind} and can't be moved")]
    NotDraggable { title: String, kind: &'static str },
    #[error("another move is already in progress")]
    Busy,
}

/// Mouse press on an event. It only turns into a drag once the pointer moves,
/// so a plain click selects without rescheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerGrab {
    pub event_id: String,
    /// Time under the pointer when pressed; `None` in the month grid.
    pub grabbed_at: Option<NaiveTime>,
    pub moved: bool,
}

impl PointerGrab {
    pub fn new(event_id: impl Into<String>, grabbed_at: Option<NaiveTime>) -> Self {
        Self {
            event_id: event_id.into(),
            grabbed_at,
            moved: false,
        }
    }

    /// Start time for a release with the pointer at `pointer`, keeping the
    /// distance between the pointer and the event start from the press.
    pub fn start_time(&self, event: &CalendarEvent, pointer: Option<NaiveTime>) -> NaiveTime {
        let start = event.start_date.time();
        let (Some(from), Some(to)) = (self.grabbed_at, pointer) else {
            return start;
        };
        let (shifted, wrapped) = start.overflowing_add_signed(to - from);
        match wrapped {
            0 => shifted,
            w if w < 0 => NaiveTime::MIN,
            _ => NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(start),
        }
    }
}

/// Day cell (and optionally time slot) an event is released on. Month cells
/// carry no time; the event keeps its time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropTarget {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

impl DropTarget {
    pub fn day(date: NaiveDate) -> Self {
        Self { date, time: None }
    }

    pub fn slot(date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            date,
            time: Some(time),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingDrop {
    pub event: CalendarEvent,
    pub new_start: NaiveDateTime,
    pub new_end: NaiveDateTime,
}

impl PendingDrop {
    pub fn propose(event: &CalendarEvent, target: DropTarget) -> Self {
        let time = target.time.unwrap_or_else(|| event.start_date.time());
        let new_start = target.date.and_time(time);
        Self {
            event: event.clone(),
            new_start,
            new_end: new_start + event.duration(),
        }
    }

    pub fn shift(&self) -> Duration {
        self.new_start - self.event.start_date
    }

    pub fn patch(&self) -> EventPatch {
        EventPatch::reschedule(self.new_start, self.new_end).in_offset(self.event.utc_offset)
    }

    pub fn is_noop(&self) -> bool {
        self.new_start == self.event.start_date && self.new_end == self.event.end_date
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragPhase {
    #[default]
    Idle,
    Dragging(CalendarEvent),
    PendingConfirmation(PendingDrop),
    Committing(PendingDrop),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    /// No valid day cell under the drop; back to idle.
    Cancelled,
    /// Released on the slot it came from; back to idle without a mutation.
    Unchanged,
    AwaitingConfirmation(PendingDrop),
    /// Caller must issue the update for this proposal.
    Commit(PendingDrop),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommitResult {
    Applied(CalendarEvent),
    Failed { event_id: String, error: String },
}

/// One reschedule gesture at a time, owned by the calendar that renders it.
#[derive(Debug, Clone, Default)]
pub struct DragContext {
    phase: DragPhase,
}

impl DragContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &DragPhase {
        &self.phase
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, DragPhase::Idle)
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.phase, DragPhase::Dragging(_))
    }

    pub fn pending(&self) -> Option<&PendingDrop> {
        match &self.phase {
            DragPhase::PendingConfirmation(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn active_event(&self) -> Option<&CalendarEvent> {
        match &self.phase {
            DragPhase::Idle => None,
            DragPhase::Dragging(event) => Some(event),
            DragPhase::PendingConfirmation(pending) | DragPhase::Committing(pending) => {
                Some(&pending.event)
            }
        }
    }

    pub fn begin(&mut self, event: &CalendarEvent) -> Result<(), DragError> {
        if !event.is_draggable() {
            return Err(DragError::NotDraggable {
                title: event.title.clone(),
                kind: event.kind.label(),
            });
        }
        if !self.is_idle() {
            return Err(DragError::Busy);
        }
        self.phase = DragPhase::Dragging(event.clone());
        Ok(())
    }

    pub fn drop_on(&mut self, target: Option<DropTarget>, show_confirmation: bool) -> DropOutcome {
        let event = match std::mem::take(&mut self.phase) {
            DragPhase::Dragging(event) => event,
            other => {
                self.phase = other;
                return DropOutcome::Cancelled;
            }
        };
        let Some(target) = target else {
            return DropOutcome::Cancelled;
        };

        let pending = PendingDrop::propose(&event, target);
        if pending.is_noop() {
            return DropOutcome::Unchanged;
        }
        if show_confirmation {
            self.phase = DragPhase::PendingConfirmation(pending.clone());
            DropOutcome::AwaitingConfirmation(pending)
        } else {
            self.phase = DragPhase::Committing(pending.clone());
            DropOutcome::Commit(pending)
        }
    }

    pub fn confirm(&mut self) -> Option<PendingDrop> {
        match std::mem::take(&mut self.phase) {
            DragPhase::PendingConfirmation(pending) => {
                self.phase = DragPhase::Committing(pending.clone());
                Some(pending)
            }
            other => {
                self.phase = other;
                None
            }
        }
    }

    /// Drop the gesture or the pending proposal. In-flight commits are not
    /// cancellable.
    pub fn cancel(&mut self) -> bool {
        match self.phase {
            DragPhase::Dragging(_) | DragPhase::PendingConfirmation(_) => {
                self.phase = DragPhase::Idle;
                true
            }
            DragPhase::Idle | DragPhase::Committing(_) => false,
        }
    }

    /// The gesture source went away mid-drag.
    pub fn abort(&mut self) {
        if self.is_dragging() {
            self.phase = DragPhase::Idle;
        }
    }

    pub fn finish_commit(
        &mut self,
        event_id: &str,
        result: Result<CalendarEvent, String>,
    ) -> CommitResult {
        if let DragPhase::Committing(pending) = &self.phase
            && pending.event.id == event_id
        {
            self.phase = DragPhase::Idle;
        }
        match result {
            Ok(event) => CommitResult::Applied(event),
            Err(error) => CommitResult::Failed {
                event_id: event_id.to_string(),
                error,
            },
        }
    }
}
