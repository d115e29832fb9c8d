use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::query_cache::{CacheEntry, QueryCache, QueryData, QueryKey};

pub const CACHE_DIR: &str = "clubhouse_terminal";
const CACHE_FILE: &str = "cache.json";
const CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CacheFile {
    version: u32,
    #[serde(default)]
    queries: Vec<StoredQuery>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredQuery {
    key: QueryKey,
    data: QueryData,
    fetched_at: u64,
}

/// Seed the cache from the last session. Restored entries come back stale so
/// the first tick revalidates them.
pub fn load_into_cache(cache: &mut QueryCache) -> usize {
    let Some(path) = cache_path() else {
        return 0;
    };
    load_cache_from(&path, cache)
}

pub fn save_from_cache(cache: &QueryCache) -> Result<()> {
    let Some(path) = cache_path() else {
        return Ok(());
    };
    save_cache_to(&path, cache)
}

pub fn load_cache_from(path: &Path, cache: &mut QueryCache) -> usize {
    let Ok(raw) = fs::read_to_string(path) else {
        return 0;
    };
    let Ok(file) = serde_json::from_str::<CacheFile>(&raw) else {
        log::warn!("discarding unreadable cache file {}", path.display());
        return 0;
    };
    if file.version != CACHE_VERSION {
        return 0;
    }

    let mut restored = 0;
    for stored in file.queries {
        let Some(fetched_at) = system_time_from_secs(stored.fetched_at) else {
            continue;
        };
        cache.restore(
            stored.key,
            CacheEntry {
                data: stored.data,
                fetched_at,
                invalidated: true,
            },
        );
        restored += 1;
    }
    restored
}

pub fn save_cache_to(path: &Path, cache: &QueryCache) -> Result<()> {
    let Some(dir) = path.parent() else {
        return Ok(());
    };
    fs::create_dir_all(dir).context("create cache dir")?;

    let file = CacheFile {
        version: CACHE_VERSION,
        queries: cache
            .entries()
            .filter_map(|(key, entry)| {
                Some(StoredQuery {
                    key: *key,
                    data: entry.data.clone(),
                    fetched_at: system_time_to_secs(entry.fetched_at)?,
                })
            })
            .collect(),
    };

    let json = serde_json::to_string(&file).context("serialize query cache")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).context("write query cache")?;
    fs::rename(&tmp, path).context("swap query cache")?;
    Ok(())
}

pub fn cache_dir() -> Option<PathBuf> {
    // Prefer XDG cache.
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn cache_path() -> Option<PathBuf> {
    cache_dir().map(|dir| dir.join(CACHE_FILE))
}

fn system_time_to_secs(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

fn system_time_from_secs(secs: u64) -> Option<SystemTime> {
    UNIX_EPOCH.checked_add(std::time::Duration::from_secs(secs))
}
