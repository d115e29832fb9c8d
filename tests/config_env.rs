use std::collections::HashMap;
use std::time::Duration;

use clubhouse_terminal::calendar::ViewMode;
use clubhouse_terminal::config::AppConfig;
use clubhouse_terminal::layout::DayWindow;
use clubhouse_terminal::logging::parse_level;
use log::LevelFilter;

fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AppConfig::from_lookup(|key| vars.get(key).cloned())
}

#[test]
fn empty_environment_uses_defaults() {
    let config = config_from(&[]);
    assert_eq!(config, AppConfig::default());
    assert!(config.api_url.is_none());
    assert!(config.show_confirmation);
    assert_eq!(config.view, ViewMode::Week);
}

#[test]
fn reads_every_setting() {
    let config = config_from(&[
        ("CLUBHOUSE_API_URL", "https://club.example.org/api/"),
        ("CLUBHOUSE_API_TOKEN", "secret"),
        ("CALENDAR_SHOW_CONFIRMATION", "off"),
        ("CALENDAR_VIEW", "month"),
        ("CALENDAR_DAY_START", "6"),
        ("CALENDAR_DAY_END", "23"),
        ("EVENTS_STALE_SECS", "120"),
        ("HTTP_TIMEOUT_SECS", "30"),
        ("FETCH_PARALLELISM", "2"),
        ("DEMO_FAIL_RATE", "0.25"),
        ("CLUBHOUSE_LOG", "debug"),
    ]);
    assert_eq!(config.api_url.as_deref(), Some("https://club.example.org/api"));
    assert_eq!(config.api_token.as_deref(), Some("secret"));
    assert!(!config.show_confirmation);
    assert_eq!(config.view, ViewMode::Month);
    assert_eq!(config.window, DayWindow::new(6, 23));
    assert_eq!(config.stale_after, Duration::from_secs(120));
    assert_eq!(config.http_timeout, Duration::from_secs(30));
    assert_eq!(config.fetch_parallelism, 2);
    assert!((config.demo_fail_rate - 0.25).abs() < f64::EPSILON);
    assert_eq!(parse_level(&config.log_level), LevelFilter::Debug);
}

#[test]
fn out_of_range_values_are_clamped_or_ignored() {
    let config = config_from(&[
        ("CLUBHOUSE_API_URL", "   "),
        ("CALENDAR_SHOW_CONFIRMATION", "maybe"),
        ("CALENDAR_VIEW", "agenda"),
        ("CALENDAR_DAY_START", "20"),
        ("CALENDAR_DAY_END", "8"),
        ("EVENTS_STALE_SECS", "1"),
        ("HTTP_TIMEOUT_SECS", "900"),
        ("FETCH_PARALLELISM", "64"),
        ("DEMO_FAIL_RATE", "NaN"),
    ]);
    assert!(config.api_url.is_none());
    assert!(config.show_confirmation);
    assert_eq!(config.view, ViewMode::Week);
    assert_eq!(config.window, DayWindow::new(20, 21));
    assert_eq!(config.stale_after, Duration::from_secs(5));
    assert_eq!(config.http_timeout, Duration::from_secs(120));
    assert_eq!(config.fetch_parallelism, 16);
    assert_eq!(config.demo_fail_rate, 0.0);
}

#[test]
fn http_timeout_defaults_and_rejects_garbage() {
    assert_eq!(config_from(&[]).http_timeout, Duration::from_secs(10));
    let config = config_from(&[("HTTP_TIMEOUT_SECS", "soon")]);
    assert_eq!(config.http_timeout, Duration::from_secs(10));
    let config = config_from(&[("HTTP_TIMEOUT_SECS", "0")]);
    assert_eq!(config.http_timeout, Duration::from_secs(1));
}

#[test]
fn unknown_log_level_falls_back_to_info() {
    assert_eq!(parse_level("WARNING"), LevelFilter::Warn);
    assert_eq!(parse_level("chatty"), LevelFilter::Info);
}
