use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::LevelFilter;
use simplelog::{ConfigBuilder, WriteLogger};

use crate::persist::cache_dir;

const LOG_FILE: &str = "clubhouse.log";

/// Route `log` records to a file next to the cache; the terminal is owned by
/// the UI so nothing may go to stderr.
pub fn init_file_logger(level: &str) -> Result<PathBuf> {
    let dir = cache_dir().context("no cache directory for log file")?;
    fs::create_dir_all(&dir).context("create log dir")?;
    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    let config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();
    WriteLogger::init(parse_level(level), config, file).context("logger already set")?;
    Ok(path)
}

pub fn parse_level(raw: &str) -> LevelFilter {
    match raw.trim().to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}
