use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime};
use rand::Rng;

use crate::api::CalendarBackend;
use crate::calendar::CalendarState;
use crate::model::{CalendarEvent, EntryKind, EventFilter, EventPatch, NewEvent, User};

/// In-process stand-in for the club API, used when no server is configured.
pub struct DemoBackend {
    events: Mutex<Vec<CalendarEvent>>,
    users: Vec<User>,
    next_id: AtomicU64,
    fail_rate: f64,
    latency: Duration,
}

impl DemoBackend {
    pub fn new(events: Vec<CalendarEvent>, users: Vec<User>) -> Self {
        let next_id = events
            .iter()
            .filter_map(|e| e.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        Self {
            events: Mutex::new(events),
            users,
            next_id: AtomicU64::new(next_id),
            fail_rate: 0.0,
            latency: Duration::ZERO,
        }
    }

    /// A week of club activity around `today`.
    pub fn seeded(today: NaiveDate) -> Self {
        Self::new(seed_events(today), seed_users())
    }

    /// Mutations fail with probability `rate`.
    pub fn with_fail_rate(mut self, rate: f64) -> Self {
        self.fail_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn snapshot(&self) -> Vec<CalendarEvent> {
        self.events.lock().expect("demo events lock poisoned").clone()
    }

    fn simulate_network(&self, what: &str) -> Result<()> {
        if !self.latency.is_zero() {
            let jitter = rand::thread_rng().gen_range(0..=self.latency.as_millis() as u64 / 2);
            thread::sleep(self.latency + Duration::from_millis(jitter));
        }
        if self.fail_rate > 0.0 && rand::thread_rng().gen_bool(self.fail_rate) {
            return Err(anyhow!("{what}: http 503 Service Unavailable: simulated outage"));
        }
        Ok(())
    }
}

impl CalendarBackend for DemoBackend {
    fn label(&self) -> String {
        "demo".to_string()
    }

    fn list_events(&self, filter: &EventFilter) -> Result<Vec<CalendarEvent>> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        let events = self.events.lock().expect("demo events lock poisoned");
        Ok(events.iter().filter(|e| filter.matches(e)).cloned().collect())
    }

    fn create_event(&self, event: &NewEvent) -> Result<CalendarEvent> {
        self.simulate_network("create event")?;
        if event.end_date < event.start_date {
            return Err(anyhow!("create event: http 422 Unprocessable Entity: end before start"));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let created = event.clone().into_event(id);
        let mut events = self.events.lock().expect("demo events lock poisoned");
        events.push(created.clone());
        Ok(created)
    }

    fn update_event(&self, id: &str, patch: &EventPatch) -> Result<CalendarEvent> {
        self.simulate_network("update event")?;
        let mut events = self.events.lock().expect("demo events lock poisoned");
        let Some(event) = events.iter_mut().find(|e| e.id == id) else {
            return Err(anyhow!("update event: http 404 Not Found: event {id}"));
        };
        if !event.kind.capabilities().editable {
            return Err(anyhow!("update event: http 403 Forbidden: {} is read-only", event.kind.label()));
        }
        let mut updated = event.clone();
        updated.apply_patch(patch);
        updated
            .validate()
            .map_err(|err| anyhow!("update event: http 422 Unprocessable Entity: {err}"))?;
        *event = updated.clone();
        Ok(updated)
    }

    fn delete_event(&self, id: &str) -> Result<()> {
        self.simulate_network("delete event")?;
        let mut events = self.events.lock().expect("demo events lock poisoned");
        let before = events.len();
        events.retain(|e| e.id != id);
        if events.len() == before {
            return Err(anyhow!("delete event: http 404 Not Found: event {id}"));
        }
        Ok(())
    }

    fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.users.clone())
    }
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN))
}

struct Seed {
    day: i64,
    start: (u32, u32),
    end: (u32, u32),
    title: &'static str,
    description: &'static str,
    color: &'static str,
    kind: EntryKind,
    attendees: &'static [u64],
}

const SEEDS: &[Seed] = &[
    Seed {
        day: 0,
        start: (17, 30),
        end: (19, 0),
        title: "U12 Training",
        description: "Passing drills, small-sided games",
        color: "green",
        kind: EntryKind::Event,
        attendees: &[1, 3],
    },
    Seed {
        day: 0,
        start: (18, 0),
        end: (19, 30),
        title: "U14 Training",
        description: "Pressing shape",
        color: "blue",
        kind: EntryKind::Event,
        attendees: &[2],
    },
    Seed {
        day: 0,
        start: (20, 0),
        end: (21, 0),
        title: "Senior Fitness",
        description: "",
        color: "yellow",
        kind: EntryKind::Event,
        attendees: &[4],
    },
    Seed {
        day: 1,
        start: (19, 0),
        end: (20, 0),
        title: "Coaches Meeting",
        description: "Season planning, clubhouse room 2",
        color: "magenta",
        kind: EntryKind::Event,
        attendees: &[1, 2, 3, 4],
    },
    Seed {
        day: 2,
        start: (17, 30),
        end: (19, 0),
        title: "U12 Training",
        description: "Finishing",
        color: "green",
        kind: EntryKind::Event,
        attendees: &[1, 3],
    },
    Seed {
        day: 2,
        start: (17, 0),
        end: (21, 0),
        title: "Pitch 1 reserved",
        description: "Facility booking",
        color: "gray",
        kind: EntryKind::Reservation,
        attendees: &[],
    },
    Seed {
        day: 4,
        start: (18, 0),
        end: (19, 30),
        title: "U14 Training",
        description: "Set pieces",
        color: "blue",
        kind: EntryKind::Event,
        attendees: &[2],
    },
    Seed {
        day: 5,
        start: (9, 30),
        end: (12, 30),
        title: "Main pitch reserved",
        description: "League match day booking",
        color: "gray",
        kind: EntryKind::Reservation,
        attendees: &[],
    },
    Seed {
        day: 5,
        start: (10, 0),
        end: (12, 0),
        title: "U14 vs Riverside FC",
        description: "League game, home",
        color: "red",
        kind: EntryKind::Event,
        attendees: &[2, 4],
    },
    Seed {
        day: 5,
        start: (13, 0),
        end: (14, 30),
        title: "U12 vs Northside",
        description: "Friendly, away",
        color: "red",
        kind: EntryKind::Event,
        attendees: &[1, 3],
    },
];

pub fn seed_events(today: NaiveDate) -> Vec<CalendarEvent> {
    let monday = CalendarState::week_start(today);
    let mut events: Vec<CalendarEvent> = SEEDS
        .iter()
        .enumerate()
        .map(|(idx, seed)| {
            let date = monday + ChronoDuration::days(seed.day);
            CalendarEvent {
                id: (idx + 1).to_string(),
                title: seed.title.to_string(),
                description: seed.description.to_string(),
                start_date: at(date, seed.start.0, seed.start.1),
                end_date: at(date, seed.end.0, seed.end.1),
                color: Some(seed.color.to_string()),
                kind: seed.kind,
                attendees: seed.attendees.to_vec(),
                utc_offset: None,
            }
        })
        .collect();

    // Weekend tournament spanning two days.
    let saturday = monday + ChronoDuration::days(12);
    events.push(CalendarEvent {
        id: (events.len() + 1).to_string(),
        title: "Spring Cup (U10-U14)".to_string(),
        description: "Regional youth tournament".to_string(),
        start_date: at(saturday, 8, 0),
        end_date: at(saturday + ChronoDuration::days(1), 18, 0),
        color: Some("cyan".to_string()),
        kind: EntryKind::Event,
        attendees: vec![1, 2, 3],
        utc_offset: None,
    });
    events
}

pub fn seed_users() -> Vec<User> {
    [
        (1, "Maria", "Lopez", "head coach"),
        (2, "Tom", "Becker", "coach"),
        (3, "Aisha", "Khan", "assistant coach"),
        (4, "Jonas", "Berg", "fitness coach"),
    ]
    .into_iter()
    .map(|(id, first, last, role)| User {
        id,
        first_name: first.to_string(),
        last_name: last.to_string(),
        role: Some(role.to_string()),
        avatar_url: None,
    })
    .collect()
}
