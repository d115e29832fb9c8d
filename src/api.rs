use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::RequestBuilder;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::http_client::http_client;
use crate::model::{CalendarEvent, EventFilter, EventPatch, NewEvent, User};

const MAX_ERROR_BODY: usize = 200;

/// Events and roster collaborators the calendar talks to. Every call either
/// returns the server's view of the data or an error for non-2xx responses.
pub trait CalendarBackend: Send + Sync {
    fn label(&self) -> String;
    fn list_events(&self, filter: &EventFilter) -> Result<Vec<CalendarEvent>>;
    fn create_event(&self, event: &NewEvent) -> Result<CalendarEvent>;
    fn update_event(&self, id: &str, patch: &EventPatch) -> Result<CalendarEvent>;
    fn delete_event(&self, id: &str) -> Result<()>;
    fn list_users(&self) -> Result<Vec<User>>;
}

pub struct RestBackend {
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl RestBackend {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.token.as_deref() {
            Some(token) => req.header(AUTHORIZATION, format!("Bearer {token}")),
            None => req,
        }
    }

    fn send(&self, req: RequestBuilder, what: &str) -> Result<String> {
        let resp = self
            .authorize(req)
            .send()
            .with_context(|| format!("{what} request failed"))?;
        let status = resp.status();
        let body = resp.text().context("failed reading body")?;
        if !status.is_success() {
            return Err(anyhow!("{what}: http {}: {}", status, truncate(&body)));
        }
        Ok(body)
    }

    fn fetch_event(&self, id: &str) -> Result<CalendarEvent> {
        let client = http_client(self.timeout)?;
        let body = self.send(client.get(self.url(&format!("events/{id}"))), "get event")?;
        parse_event_json(&body)
    }
}

impl CalendarBackend for RestBackend {
    fn label(&self) -> String {
        self.base_url.clone()
    }

    fn list_events(&self, filter: &EventFilter) -> Result<Vec<CalendarEvent>> {
        let client = http_client(self.timeout)?;
        let url = format!("{}?{}", self.url("events"), filter.query_string());
        let body = self.send(client.get(url), "list events")?;
        parse_events_json(&body)
    }

    fn create_event(&self, event: &NewEvent) -> Result<CalendarEvent> {
        let client = http_client(self.timeout)?;
        let body = self.send(client.post(self.url("events")).json(event), "create event")?;
        parse_event_json(&body)
    }

    fn update_event(&self, id: &str, patch: &EventPatch) -> Result<CalendarEvent> {
        let client = http_client(self.timeout)?;
        let body = self.send(
            client.patch(self.url(&format!("events/{id}"))).json(patch),
            "update event",
        )?;
        if body.trim().is_empty() {
            // 204 No Content: read back the stored version.
            return self.fetch_event(id);
        }
        parse_event_json(&body)
    }

    fn delete_event(&self, id: &str) -> Result<()> {
        let client = http_client(self.timeout)?;
        self.send(client.delete(self.url(&format!("events/{id}"))), "delete event")?;
        Ok(())
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let client = http_client(self.timeout)?;
        let body = self.send(client.get(self.url("users")), "list users")?;
        parse_users_json(&body)
    }
}

/// Parse a list response. Accepts a bare array or an object wrapping it in
/// `data`, `events` or `results`; rows that don't describe a valid event are
/// skipped.
pub fn parse_events_json(raw: &str) -> Result<Vec<CalendarEvent>> {
    let rows = parse_rows(raw, &["data", "events", "results"])?;
    let mut events = Vec::with_capacity(rows.len());
    let mut dropped = 0usize;
    for row in rows {
        match serde_json::from_value::<CalendarEvent>(row) {
            Ok(event) if event.validate().is_ok() => events.push(event),
            Ok(event) => {
                if let Err(err) = event.validate() {
                    log::warn!("skipping event row: {err}");
                }
                dropped += 1;
            }
            Err(err) => {
                log::warn!("skipping malformed event row: {err}");
                dropped += 1;
            }
        }
    }
    if dropped > 0 {
        log::info!("events response: kept {}, dropped {dropped}", events.len());
    }
    Ok(events)
}

pub fn parse_event_json(raw: &str) -> Result<CalendarEvent> {
    let root: Value = serde_json::from_str(raw.trim()).context("invalid event json")?;
    let row = unwrap_envelope(root, &["data", "event"]);
    let event: CalendarEvent = serde_json::from_value(row).context("unexpected event shape")?;
    event.validate().map_err(|err| anyhow!(err))?;
    Ok(event)
}

pub fn parse_users_json(raw: &str) -> Result<Vec<User>> {
    let rows = parse_rows(raw, &["data", "users", "results"])?;
    Ok(rows
        .into_iter()
        .filter_map(|row| parse_row::<User>(row, "user"))
        .collect())
}

fn parse_rows(raw: &str, envelope_keys: &[&str]) -> Result<Vec<Value>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let root: Value = serde_json::from_str(trimmed).context("invalid list json")?;
    match unwrap_envelope(root, envelope_keys) {
        Value::Array(rows) => Ok(rows),
        Value::Null => Ok(Vec::new()),
        other => Err(anyhow!("expected a list, got {}", kind_of(&other))),
    }
}

fn unwrap_envelope(root: Value, keys: &[&str]) -> Value {
    if let Value::Object(mut map) = root {
        for key in keys {
            if let Some(inner) = map.remove(*key) {
                return inner;
            }
        }
        return Value::Object(map);
    }
    root
}

fn parse_row<T: DeserializeOwned>(row: Value, what: &str) -> Option<T> {
    match serde_json::from_value(row) {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("skipping malformed {what} row: {err}");
            None
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let cut: String = body.chars().take(MAX_ERROR_BODY).collect();
    format!("{cut}…")
}
