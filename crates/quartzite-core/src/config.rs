//! Layered `SchedulerOptions` configuration (spec §3a, §4.8).
//!
//! Loading order mirrors the teacher's `config::loader` module: parse a TOML
//! file if present, fall back to [`SchedulerOptions::default()`] if it is
//! missing, hard error on malformed TOML. Builder overrides made by the
//! embedding application after loading take final precedence.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};

fn default_instance_name() -> String {
    "QuartziteScheduler".to_owned()
}

fn default_instance_id() -> String {
    "NON_CLUSTERED".to_owned()
}

fn default_thread_count() -> usize {
    4
}

fn default_thread_priority() -> u8 {
    5
}

fn default_batch_time_window_ms() -> i64 {
    0
}

fn default_max_batch_size() -> usize {
    1
}

fn default_idle_wait_time_ms() -> i64 {
    30_000
}

fn default_misfire_threshold_ms() -> i64 {
    60_000
}

/// Scheduler-wide tuning knobs (spec §3a, §4.8).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerOptions {
    pub instance_name: String,
    pub instance_id: String,
    pub thread_count: usize,
    /// Best-effort OS thread priority (0-10); not every platform honors it.
    pub thread_priority: u8,
    pub make_scheduler_thread_daemon: bool,
    pub batch_time_window_ms: i64,
    pub max_batch_size: usize,
    pub idle_wait_time_ms: i64,
    pub misfire_threshold_ms: i64,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            instance_id: default_instance_id(),
            thread_count: default_thread_count(),
            thread_priority: default_thread_priority(),
            make_scheduler_thread_daemon: true,
            batch_time_window_ms: default_batch_time_window_ms(),
            max_batch_size: default_max_batch_size(),
            idle_wait_time_ms: default_idle_wait_time_ms(),
            misfire_threshold_ms: default_misfire_threshold_ms(),
        }
    }
}

impl SchedulerOptions {
    pub fn idle_wait_time(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.idle_wait_time_ms)
    }

    pub fn batch_time_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.batch_time_window_ms)
    }

    pub fn misfire_threshold(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.misfire_threshold_ms)
    }
}

/// `~/.quartzite/quartzite.toml`, overridable by `QUARTZITE_CONFIG`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".quartzite").join("quartzite.toml"))
}

/// Parses `content` as a `SchedulerOptions` TOML document.
pub fn load_from_str(content: &str) -> Result<SchedulerOptions> {
    toml::from_str(content).map_err(SchedulerError::from)
}

/// Loads from `path`, falling back to [`SchedulerOptions::default()`] if the
/// file does not exist. A malformed file is a hard error.
pub fn load_from_path(path: &Path) -> Result<SchedulerOptions> {
    match std::fs::read_to_string(path) {
        Ok(content) => load_from_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SchedulerOptions::default()),
        Err(e) => Err(SchedulerError::from(e)),
    }
}

/// Loads from `QUARTZITE_CONFIG` or [`default_config_path`], falling back to
/// [`SchedulerOptions::default()`] if neither resolves to a readable file.
pub fn load_default() -> SchedulerOptions {
    let path = env::var("QUARTZITE_CONFIG")
        .map(PathBuf::from)
        .ok()
        .or_else(default_config_path);

    match path {
        Some(path) => load_from_path(&path).unwrap_or_default(),
        None => SchedulerOptions::default(),
    }
}
