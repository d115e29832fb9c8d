use std::collections::{HashMap, HashSet};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::model::{CalendarEvent, EventFilter, User};

/// Event ranges kept at once. Navigating further evicts the ones fetched
/// longest ago.
pub const MAX_EVENT_QUERIES: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryKey {
    Events(EventFilter),
    Users,
}

impl QueryKey {
    pub fn label(&self) -> String {
        match self {
            QueryKey::Events(filter) => format!("events {}..{}", filter.from, filter.to),
            QueryKey::Users => "users".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryData {
    Events(Vec<CalendarEvent>),
    Users(Vec<User>),
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: QueryData,
    pub fetched_at: SystemTime,
    pub invalidated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Missing,
    Fresh,
    Stale,
}

/// Client-side copy of server state, keyed by logical query.
#[derive(Debug, Clone)]
pub struct QueryCache {
    entries: HashMap<QueryKey, CacheEntry>,
    /// In-flight requests, stamped with the mutation count when they went out.
    inflight: HashMap<QueryKey, u64>,
    mutations: u64,
    stale_after: Duration,
}

impl QueryCache {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            entries: HashMap::with_capacity(16),
            inflight: HashMap::new(),
            mutations: 0,
            stale_after,
        }
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    pub fn freshness(&self, key: &QueryKey, now: SystemTime) -> Freshness {
        let Some(entry) = self.entries.get(key) else {
            return Freshness::Missing;
        };
        if entry.invalidated {
            return Freshness::Stale;
        }
        let age = now.duration_since(entry.fetched_at).unwrap_or(Duration::ZERO);
        if age >= self.stale_after {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }

    /// Claim `key` for fetching. False when a request for it is already out.
    pub fn begin_fetch(&mut self, key: QueryKey) -> bool {
        if self.inflight.contains_key(&key) {
            return false;
        }
        self.inflight.insert(key, self.mutations);
        true
    }

    pub fn finish_fetch(&mut self, key: &QueryKey) {
        self.inflight.remove(key);
    }

    pub fn is_inflight(&self, key: &QueryKey) -> bool {
        self.inflight.contains_key(key)
    }

    /// Number of server-confirmed mutations applied so far.
    pub fn mutations(&self) -> u64 {
        self.mutations
    }

    /// Store the answer to an events fetch. A response whose request went out
    /// before the latest applied mutation may predate it, so it is dropped and
    /// the range stays stale for the next refresh. Returns whether it was kept.
    pub fn finish_events_fetch(
        &mut self,
        filter: EventFilter,
        events: Vec<CalendarEvent>,
        now: SystemTime,
    ) -> bool {
        let key = QueryKey::Events(filter);
        let started = self.inflight.remove(&key);
        if started.is_some_and(|count| count < self.mutations) {
            self.invalidate(&key);
            return false;
        }
        self.put_events(filter, events, now);
        true
    }

    /// Whether `key` should be (re)fetched now.
    pub fn needs_fetch(&self, key: &QueryKey, now: SystemTime) -> bool {
        !self.is_inflight(key) && self.freshness(key, now) != Freshness::Fresh
    }

    pub fn put_events(&mut self, filter: EventFilter, events: Vec<CalendarEvent>, now: SystemTime) {
        self.entries.insert(
            QueryKey::Events(filter),
            CacheEntry {
                data: QueryData::Events(events),
                fetched_at: now,
                invalidated: false,
            },
        );
        self.evict_events();
    }

    pub fn put_users(&mut self, users: Vec<User>, now: SystemTime) {
        self.entries.insert(
            QueryKey::Users,
            CacheEntry {
                data: QueryData::Users(users),
                fetched_at: now,
                invalidated: false,
            },
        );
    }

    pub fn users(&self) -> &[User] {
        match self.entries.get(&QueryKey::Users).map(|e| &e.data) {
            Some(QueryData::Users(users)) => users,
            _ => &[],
        }
    }

    pub fn user(&self, id: u64) -> Option<&User> {
        self.users().iter().find(|u| u.id == id)
    }

    /// Every cached event intersecting `filter`, ordered by start time.
    ///
    /// Entries are read newest first. A row from an older entry is skipped when
    /// a newer entry's range includes it, since that fetch would have returned
    /// it if it still existed. The newest entry covering the whole filter ends
    /// the scan.
    pub fn events_in(&self, filter: &EventFilter) -> Vec<CalendarEvent> {
        let mut sources: Vec<(&EventFilter, &CacheEntry)> = self
            .entries
            .iter()
            .filter_map(|(key, entry)| match key {
                QueryKey::Events(range) => Some((range, entry)),
                QueryKey::Users => None,
            })
            .collect();
        sources.sort_by_key(|(_, entry)| std::cmp::Reverse(entry.fetched_at));

        let mut newer: Vec<&EventFilter> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();
        for (range, entry) in sources {
            let QueryData::Events(events) = &entry.data else {
                continue;
            };
            for event in events {
                if !filter.matches(event) || newer.iter().any(|r| r.matches(event)) {
                    continue;
                }
                if seen.insert(event.id.as_str()) {
                    out.push(event.clone());
                }
            }
            if range.covers(filter) {
                break;
            }
            newer.push(range);
        }
        out.sort_by(|a, b| {
            a.start_date
                .cmp(&b.start_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }

    pub fn find_event(&self, id: &str) -> Option<&CalendarEvent> {
        self.entries.values().find_map(|entry| match &entry.data {
            QueryData::Events(events) => events.iter().find(|e| e.id == id),
            QueryData::Users(_) => None,
        })
    }

    pub fn invalidate(&mut self, key: &QueryKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.invalidated = true;
        }
    }

    pub fn invalidate_events(&mut self) {
        for (key, entry) in self.entries.iter_mut() {
            if matches!(key, QueryKey::Events(_)) {
                entry.invalidated = true;
            }
        }
    }

    /// Write a server-confirmed event into every cached list it belongs to,
    /// then mark event queries stale so they get refetched.
    pub fn apply_event(&mut self, event: &CalendarEvent) {
        for (key, entry) in self.entries.iter_mut() {
            let (QueryKey::Events(filter), QueryData::Events(events)) = (key, &mut entry.data)
            else {
                continue;
            };
            let belongs = filter.matches(event);
            match events.iter().position(|e| e.id == event.id) {
                Some(idx) if belongs => events[idx] = event.clone(),
                Some(idx) => {
                    events.remove(idx);
                }
                None if belongs => events.push(event.clone()),
                None => {}
            }
        }
        self.mutations += 1;
        self.invalidate_events();
    }

    pub fn remove_event(&mut self, id: &str) {
        for entry in self.entries.values_mut() {
            if let QueryData::Events(events) = &mut entry.data {
                events.retain(|e| e.id != id);
            }
        }
        self.mutations += 1;
        self.invalidate_events();
    }

    pub fn entries(&self) -> impl Iterator<Item = (&QueryKey, &CacheEntry)> {
        self.entries.iter()
    }

    pub fn restore(&mut self, key: QueryKey, entry: CacheEntry) {
        self.entries.insert(key, entry);
        self.evict_events();
    }

    /// Drop the least recently fetched event ranges beyond [`MAX_EVENT_QUERIES`].
    fn evict_events(&mut self) {
        let mut ranges: Vec<(QueryKey, SystemTime)> = self
            .entries
            .iter()
            .filter(|(key, _)| matches!(key, QueryKey::Events(_)))
            .map(|(key, entry)| (*key, entry.fetched_at))
            .collect();
        if ranges.len() <= MAX_EVENT_QUERIES {
            return;
        }
        ranges.sort_by_key(|(_, fetched_at)| *fetched_at);
        let excess = ranges.len() - MAX_EVENT_QUERIES;
        for (key, _) in ranges.into_iter().take(excess) {
            log::debug!("evicting cached {}", key.label());
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
