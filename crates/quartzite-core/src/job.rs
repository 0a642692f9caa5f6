//! Job definitions and the executable `Job` trait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::JobExecutionError;
use crate::key::Key;

/// A string-keyed data bag attached to jobs and triggers.
///
/// Trigger data overrides job data of the same name when merged for a fire
/// (spec §4.2 step 6, "merged data map ... trigger overrides").
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobDataMap(pub HashMap<String, Value>);

impl JobDataMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    /// Overlay `other` on top of `self`: values present in `other` win.
    pub fn merged_with(&self, other: &JobDataMap) -> JobDataMap {
        let mut merged = self.0.clone();
        for (k, v) in &other.0 {
            merged.insert(k.clone(), v.clone());
        }
        JobDataMap(merged)
    }
}

/// A stored job definition (spec §3 `JobDetail`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDetail {
    pub key: Key,
    /// Identifier resolved through a [`crate::registry::JobRegistry`] — the
    /// systems-language replacement for class-by-name loading (spec §9).
    pub job_class: String,
    pub description: Option<String>,
    pub data: JobDataMap,
    /// A durable job with no triggers is not removed automatically.
    pub durable: bool,
    pub concurrent_execution_disallowed: bool,
    pub persist_job_data_after_execution: bool,
    pub requests_recovery: bool,
}

impl JobDetail {
    pub fn new(key: Key, job_class: impl Into<String>) -> Self {
        Self {
            key,
            job_class: job_class.into(),
            description: None,
            data: JobDataMap::default(),
            durable: false,
            concurrent_execution_disallowed: false,
            persist_job_data_after_execution: false,
            requests_recovery: false,
        }
    }

    pub fn durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    pub fn concurrent_execution_disallowed(mut self, disallowed: bool) -> Self {
        self.concurrent_execution_disallowed = disallowed;
        self
    }

    pub fn persist_job_data_after_execution(mut self, persist: bool) -> Self {
        self.persist_job_data_after_execution = persist;
        self
    }

    pub fn with_data(mut self, data: JobDataMap) -> Self {
        self.data = data;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A cooperative cancellation flag handed to interruptible jobs.
///
/// Mirrors the `CancellationToken` shape used by thread-pool job executors
/// (see DESIGN.md) without depending on an async runtime: it is a thin
/// `Arc<AtomicBool>`, cheap to clone and check from a tight loop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a `Job::execute` call needs: identity, merged data, timing, and
/// a way to observe cancellation.
pub struct JobExecutionContext {
    pub fire_instance_id: String,
    pub job_key: Key,
    pub trigger_key: Key,
    pub scheduled_fire_time: DateTime<Utc>,
    pub actual_fire_time: DateTime<Utc>,
    pub previous_fire_time: Option<DateTime<Utc>>,
    pub next_fire_time: Option<DateTime<Utc>>,
    /// Job data merged with trigger data (trigger wins on conflicts).
    pub merged_data: JobDataMap,
    pub cancellation: CancellationToken,
    /// Jobs that opt into cooperative cancellation set this on completion so
    /// callers (and tests) can observe that the signal was honored.
    pub was_interrupted: bool,
}

impl JobExecutionContext {
    pub fn merged_data(&self) -> &JobDataMap {
        &self.merged_data
    }
}

/// Executable unit of work resolved from [`JobDetail::job_class`] through a
/// [`crate::registry::JobRegistry`].
pub trait Job: Send + Sync {
    /// Run the job. Interruptible jobs should poll
    /// `ctx.cancellation.is_cancelled()` periodically and return promptly
    /// (setting `ctx.was_interrupted = true` is the caller's job, done by the
    /// worker pool once it observes the cancellation was requested).
    fn execute(&self, ctx: &mut JobExecutionContext) -> Result<(), JobExecutionError>;

    /// Whether this job honors [`CancellationToken`] at all. Non-interruptible
    /// jobs run to completion even if `interrupt` is called (spec §4.4).
    fn is_interruptible(&self) -> bool {
        false
    }
}
