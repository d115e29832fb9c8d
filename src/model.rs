use chrono::{
    DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const WIRE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Tag carried in the `type` field of every calendar row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Event,
    Reservation,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub draggable: bool,
    pub editable: bool,
}

impl EntryKind {
    pub fn capabilities(self) -> Capabilities {
        match self {
            EntryKind::Event => Capabilities {
                draggable: true,
                editable: true,
            },
            // Reservations are shown for context; the facility desk owns them.
            EntryKind::Reservation | EntryKind::Other => Capabilities {
                draggable: false,
                editable: false,
            },
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntryKind::Event => "event",
            EntryKind::Reservation => "reservation",
            EntryKind::Other => "other",
        }
    }
}

/// One calendar row. Times are local wall-clock; `utc_offset` remembers the
/// offset the server wrote them with so updates go back in the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireEvent", into = "WireEvent")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub color: Option<String>,
    pub kind: EntryKind,
    pub attendees: Vec<u64>,
    pub utc_offset: Option<FixedOffset>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    #[serde(deserialize_with = "de_id")]
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    start_date: String,
    end_date: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(rename = "type")]
    kind: EntryKind,
    #[serde(default)]
    attendees: Vec<u64>,
}

impl TryFrom<WireEvent> for CalendarEvent {
    type Error = String;

    fn try_from(row: WireEvent) -> Result<Self, Self::Error> {
        let parse = |raw: &str| {
            WireTime::parse(raw).ok_or_else(|| format!("invalid date-time: {raw}"))
        };
        let start = parse(&row.start_date)?;
        let end = parse(&row.end_date)?;
        Ok(CalendarEvent {
            id: row.id,
            title: row.title,
            description: row.description,
            start_date: start.local,
            end_date: end.local,
            color: row.color,
            kind: row.kind,
            attendees: row.attendees,
            utc_offset: start.offset.or(end.offset),
        })
    }
}

impl From<CalendarEvent> for WireEvent {
    fn from(event: CalendarEvent) -> Self {
        WireEvent {
            id: event.id,
            title: event.title,
            description: event.description,
            start_date: WireTime::format(event.start_date, event.utc_offset),
            end_date: WireTime::format(event.end_date, event.utc_offset),
            color: event.color,
            kind: event.kind,
            attendees: event.attendees,
        }
    }
}

impl CalendarEvent {
    pub fn duration(&self) -> Duration {
        self.end_date - self.start_date
    }

    pub fn is_draggable(&self) -> bool {
        self.kind.capabilities().draggable
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("event without id".to_string());
        }
        if self.end_date < self.start_date {
            return Err(format!(
                "event {} ends before it starts ({} < {})",
                self.id, self.end_date, self.start_date
            ));
        }
        Ok(())
    }

    pub fn apply_patch(&mut self, patch: &EventPatch) {
        if let Some(title) = patch.title.as_ref() {
            self.title = title.clone();
        }
        if let Some(description) = patch.description.as_ref() {
            self.description = description.clone();
        }
        if let Some(color) = patch.color.as_ref() {
            self.color = Some(color.clone());
        }
        if let Some(start) = patch.start_date {
            self.start_date = start;
        }
        if let Some(end) = patch.end_date {
            self.end_date = end;
        }
    }

    pub fn time_label(&self) -> String {
        if self.start_date.date() == self.end_date.date() {
            format!(
                "{}-{}",
                self.start_date.format("%H:%M"),
                self.end_date.format("%H:%M")
            )
        } else {
            format!(
                "{} {} - {} {}",
                self.start_date.format("%d/%m"),
                self.start_date.format("%H:%M"),
                self.end_date.format("%d/%m"),
                self.end_date.format("%H:%M")
            )
        }
    }
}

/// Payload for `create`; the server assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    #[serde(with = "wire_time")]
    pub start_date: NaiveDateTime,
    #[serde(with = "wire_time")]
    pub end_date: NaiveDateTime,
    pub color: Option<String>,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub attendees: Vec<u64>,
}

impl NewEvent {
    pub fn into_event(self, id: String) -> CalendarEvent {
        CalendarEvent {
            id,
            title: self.title,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            color: self.color,
            kind: self.kind,
            attendees: self.attendees,
            utc_offset: None,
        }
    }
}

/// Partial update body; absent fields are left untouched server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(into = "WirePatch")]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    /// Offset to write the dates in; naive when `None`.
    pub utc_offset: Option<FixedOffset>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WirePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_date: Option<String>,
}

impl From<EventPatch> for WirePatch {
    fn from(patch: EventPatch) -> Self {
        let offset = patch.utc_offset;
        WirePatch {
            title: patch.title,
            description: patch.description,
            color: patch.color,
            start_date: patch.start_date.map(|t| WireTime::format(t, offset)),
            end_date: patch.end_date.map(|t| WireTime::format(t, offset)),
        }
    }
}

impl EventPatch {
    pub fn reschedule(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start_date: Some(start),
            end_date: Some(end),
            ..Self::default()
        }
    }

    pub fn in_offset(mut self, offset: Option<FixedOffset>) -> Self {
        self.utc_offset = offset;
        self
    }
}

fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Num(u64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Num(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

/// A timestamp as read from the wire: local wall-clock time plus the offset
/// it was written with, if it had one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireTime {
    pub local: NaiveDateTime,
    pub offset: Option<FixedOffset>,
}

impl WireTime {
    pub fn parse(raw: &str) -> Option<WireTime> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(WireTime {
                local: dt.with_timezone(&Local).naive_local(),
                offset: Some(*dt.offset()),
            });
        }
        let naive = |local: NaiveDateTime| WireTime {
            local,
            offset: None,
        };
        for fmt in [
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
        ] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Some(naive(dt));
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(naive)
    }

    /// Render a local time for the wire. With an offset this is RFC 3339 in
    /// that offset (`Z` for UTC); without one it is naive.
    pub fn format(local: NaiveDateTime, offset: Option<FixedOffset>) -> String {
        if let Some(offset) = offset
            && let Some(dt) = Local.from_local_datetime(&local).earliest()
        {
            return dt
                .with_timezone(&offset)
                .to_rfc3339_opts(SecondsFormat::Secs, true);
        }
        local.format(WIRE_TIME_FORMAT).to_string()
    }
}

pub fn parse_wire_time(raw: &str) -> Option<NaiveDateTime> {
    WireTime::parse(raw).map(|t| t.local)
}

pub mod wire_time {
    use super::*;

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(WIRE_TIME_FORMAT).to_string())
    }
}
