use std::env;
use std::time::Duration;

use crate::calendar::ViewMode;
use crate::layout::DayWindow;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Unset means the built-in demo schedule.
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub show_confirmation: bool,
    pub view: ViewMode,
    pub window: DayWindow,
    pub stale_after: Duration,
    pub http_timeout: Duration,
    pub fetch_parallelism: usize,
    pub demo_fail_rate: f64,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_token: None,
            show_confirmation: true,
            view: ViewMode::Week,
            window: DayWindow::new(7, 22),
            stale_after: Duration::from_secs(60),
            http_timeout: Duration::from_secs(10),
            fetch_parallelism: 4,
            demo_fail_rate: 0.0,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Read settings from the process environment. `.env` files are loaded by
    /// the binary before this runs.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_url = non_empty("CLUBHOUSE_API_URL").map(|url| url.trim_end_matches('/').to_string());
        let api_token = non_empty("CLUBHOUSE_API_TOKEN");
        let show_confirmation = non_empty("CALENDAR_SHOW_CONFIRMATION")
            .and_then(|val| parse_bool(&val))
            .unwrap_or(defaults.show_confirmation);
        let view = non_empty("CALENDAR_VIEW")
            .and_then(|val| ViewMode::parse(&val))
            .unwrap_or(defaults.view);
        let day_start = non_empty("CALENDAR_DAY_START")
            .and_then(|val| val.parse::<u32>().ok())
            .unwrap_or(defaults.window.start_hour);
        let day_end = non_empty("CALENDAR_DAY_END")
            .and_then(|val| val.parse::<u32>().ok())
            .unwrap_or(defaults.window.end_hour);
        let stale_secs = non_empty("EVENTS_STALE_SECS")
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(defaults.stale_after.as_secs())
            .clamp(5, 3600);
        let timeout_secs = non_empty("HTTP_TIMEOUT_SECS")
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(defaults.http_timeout.as_secs())
            .clamp(1, 120);
        let fetch_parallelism = non_empty("FETCH_PARALLELISM")
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(defaults.fetch_parallelism)
            .clamp(1, 16);
        let demo_fail_rate = non_empty("DEMO_FAIL_RATE")
            .and_then(|val| val.parse::<f64>().ok())
            .filter(|rate| rate.is_finite())
            .unwrap_or(defaults.demo_fail_rate)
            .clamp(0.0, 1.0);
        let log_level = non_empty("CLUBHOUSE_LOG").unwrap_or(defaults.log_level);

        Self {
            api_url,
            api_token,
            show_confirmation,
            view,
            window: DayWindow::new(day_start, day_end),
            stale_after: Duration::from_secs(stale_secs),
            http_timeout: Duration::from_secs(timeout_secs),
            fetch_parallelism,
            demo_fail_rate,
            log_level,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
