//! In-memory job store: the ordered, mutex-protected index of jobs and
//! triggers (spec §4.1 "Job Store (in-memory)", §5 concurrency model).

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::calendar::Calendar;
use crate::error::{Result, SchedulerError};
use crate::job::JobDetail;
use crate::key::Key;
use crate::matcher::Matcher;
use crate::trigger::{CompletionInstruction, Trigger, TriggerState};

/// A snapshot of an in-flight execution: created at acquisition, removed at
/// completion (spec §3 `FiredTrigger record`).
#[derive(Debug, Clone)]
pub struct FiredTrigger {
    pub fire_instance_id: String,
    pub trigger: Trigger,
    pub job: JobDetail,
    pub scheduled_fire_time: DateTime<Utc>,
    pub actual_fire_time: DateTime<Utc>,
}

/// What `triggersFired` hands back for one acquired trigger.
#[derive(Debug, Clone)]
pub struct TriggerFiredResult {
    pub fire_instance_id: String,
    pub trigger: Trigger,
    pub job: JobDetail,
    pub scheduled_fire_time: DateTime<Utc>,
    pub actual_fire_time: DateTime<Utc>,
    pub previous_fire_time: Option<DateTime<Utc>>,
    pub misfired: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TimeIndexEntry {
    next_fire_time: DateTime<Utc>,
    priority: i32,
    key: Key,
}

impl Ord for TimeIndexEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.next_fire_time
            .cmp(&other.next_fire_time)
            .then_with(|| other.priority.cmp(&self.priority)) // priority desc
            .then_with(|| self.key.cmp(&other.key))
    }
}

impl PartialOrd for TimeIndexEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Inner {
    jobs: HashMap<Key, JobDetail>,
    triggers: HashMap<Key, Trigger>,
    job_to_triggers: HashMap<Key, HashSet<Key>>,
    job_groups: HashMap<String, HashSet<Key>>,
    trigger_groups: HashMap<String, HashSet<Key>>,
    time_index: BTreeSet<TimeIndexEntry>,
    paused_trigger_keys: HashSet<Key>,
    paused_job_keys: HashSet<Key>,
    paused_trigger_groups: HashSet<String>,
    paused_job_groups: HashSet<String>,
    blocked_jobs: HashSet<Key>,
    fired: HashMap<String, FiredTrigger>,
    calendars: HashMap<String, Arc<dyn Calendar>>,
}

impl Inner {
    fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            triggers: HashMap::new(),
            job_to_triggers: HashMap::new(),
            job_groups: HashMap::new(),
            trigger_groups: HashMap::new(),
            time_index: BTreeSet::new(),
            paused_trigger_keys: HashSet::new(),
            paused_job_keys: HashSet::new(),
            paused_trigger_groups: HashSet::new(),
            paused_job_groups: HashSet::new(),
            blocked_jobs: HashSet::new(),
            fired: HashMap::new(),
            calendars: HashMap::new(),
        }
    }

    fn is_effectively_paused(&self, trigger: &Trigger) -> bool {
        self.paused_trigger_keys.contains(&trigger.key)
            || self.paused_trigger_groups.contains(&trigger.key.group)
            || self.paused_job_keys.contains(&trigger.job_key)
            || self.paused_job_groups.contains(&trigger.job_key.group)
    }

    /// `getNextFireTime()` is the minimum `nextFireTime` over every
    /// non-paused, non-complete trigger — `Blocked` triggers still count,
    /// they're just not currently acquirable (spec §4.1).
    fn reindex(&mut self, trigger: &Trigger) {
        self.time_index.retain(|e| e.key != trigger.key);
        if matches!(trigger.state, TriggerState::Waiting | TriggerState::Blocked) {
            if let Some(next) = trigger.next_fire_time {
                self.time_index.insert(TimeIndexEntry {
                    next_fire_time: next,
                    priority: trigger.priority,
                    key: trigger.key.clone(),
                });
            }
        }
    }

    /// Skips any `nextFireTime` excluded by the trigger's named calendar,
    /// advancing through the trigger's own schedule until an included time is
    /// found or the schedule is exhausted (spec §3 "chained calendars
    /// intersect").
    fn apply_calendar_exclusion(&self, trigger: &mut Trigger) {
        let Some(name) = trigger.calendar_name.clone() else { return };
        let Some(calendar) = self.calendars.get(&name) else { return };

        let mut guard = 0;
        while let Some(candidate) = trigger.next_fire_time {
            if calendar.is_time_included(candidate) {
                return;
            }
            guard += 1;
            if guard > 1000 {
                trigger.next_fire_time = None;
                return;
            }
            let next = trigger.schedule.next_fire_time(candidate);
            trigger.next_fire_time = match (next, trigger.end_time) {
                (Some(n), Some(end)) if n > end => None,
                (n, _) => n,
            };
        }
    }

    fn insert_trigger(&mut self, mut trigger: Trigger) {
        self.apply_calendar_exclusion(&mut trigger);
        if self.is_effectively_paused(&trigger) {
            trigger.state = if self.blocked_jobs.contains(&trigger.job_key) {
                TriggerState::PausedBlocked
            } else {
                TriggerState::Paused
            };
        } else if trigger.next_fire_time.is_none() {
            trigger.state = TriggerState::Complete;
        } else if self.blocked_jobs.contains(&trigger.job_key) {
            trigger.state = TriggerState::Blocked;
        } else {
            trigger.state = TriggerState::Waiting;
        }

        self.job_to_triggers.entry(trigger.job_key.clone()).or_default().insert(trigger.key.clone());
        self.trigger_groups.entry(trigger.key.group.clone()).or_default().insert(trigger.key.clone());
        self.reindex(&trigger);
        self.triggers.insert(trigger.key.clone(), trigger);
    }

    fn remove_trigger_internal(&mut self, key: &Key) -> Option<Trigger> {
        let trigger = self.triggers.remove(key)?;
        self.time_index.retain(|e| &e.key != key);
        if let Some(group) = self.trigger_groups.get_mut(&key.group) {
            group.remove(key);
        }
        if let Some(siblings) = self.job_to_triggers.get_mut(&trigger.job_key) {
            siblings.remove(key);
            if siblings.is_empty() {
                self.job_to_triggers.remove(&trigger.job_key);
                if let Some(job) = self.jobs.get(&trigger.job_key) {
                    if !job.durable {
                        self.remove_job_internal(&trigger.job_key);
                    }
                }
            }
        }
        Some(trigger)
    }

    fn remove_job_internal(&mut self, key: &Key) -> Option<JobDetail> {
        let job = self.jobs.remove(key)?;
        if let Some(group) = self.job_groups.get_mut(&key.group) {
            group.remove(key);
        }
        if let Some(trigger_keys) = self.job_to_triggers.remove(key) {
            for trigger_key in trigger_keys {
                self.triggers.remove(&trigger_key);
                self.time_index.retain(|e| e.key != trigger_key);
                if let Some(group) = self.trigger_groups.get_mut(&trigger_key.group) {
                    group.remove(&trigger_key);
                }
            }
        }
        Some(job)
    }
}

/// The in-memory job/trigger store (spec §4.1). A single mutex guards the
/// whole critical section, per spec §5 — mutating operations and the
/// acquisition read all take the same lock and complete without blocking on
/// job execution.
pub struct RamJobStore {
    inner: Mutex<Inner>,
}

impl Default for RamJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RamJobStore {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::new()) }
    }

    pub fn store_job_and_trigger(&self, job: JobDetail, trigger: Trigger, replace: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        if !replace && inner.jobs.contains_key(&job.key) {
            return Err(SchedulerError::ObjectAlreadyExists(job.key));
        }
        if !replace && inner.triggers.contains_key(&trigger.key) {
            return Err(SchedulerError::ObjectAlreadyExists(trigger.key));
        }
        if trigger.job_key != job.key {
            return Err(SchedulerError::JobNotFound(trigger.job_key));
        }
        inner.job_groups.entry(job.key.group.clone()).or_default().insert(job.key.clone());
        inner.jobs.insert(job.key.clone(), job);
        inner.insert_trigger(trigger);
        Ok(())
    }

    /// Store a trigger for a job that must already exist (`scheduleJob(trigger)`).
    pub fn store_trigger(&self, trigger: Trigger, replace: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.jobs.contains_key(&trigger.job_key) {
            return Err(SchedulerError::JobNotFound(trigger.job_key));
        }
        if !replace && inner.triggers.contains_key(&trigger.key) {
            return Err(SchedulerError::ObjectAlreadyExists(trigger.key));
        }
        inner.insert_trigger(trigger);
        Ok(())
    }

    pub fn add_job(&self, job: JobDetail, replace: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        if !replace && inner.jobs.contains_key(&job.key) {
            return Err(SchedulerError::ObjectAlreadyExists(job.key));
        }
        inner.job_groups.entry(job.key.group.clone()).or_default().insert(job.key.clone());
        inner.jobs.insert(job.key.clone(), job);
        Ok(())
    }

    pub fn get_job(&self, key: &Key) -> Option<JobDetail> {
        self.inner.lock().jobs.get(key).cloned()
    }

    pub fn get_trigger(&self, key: &Key) -> Option<Trigger> {
        self.inner.lock().triggers.get(key).cloned()
    }

    pub fn remove_job(&self, key: &Key) -> bool {
        self.inner.lock().remove_job_internal(key).is_some()
    }

    pub fn remove_trigger(&self, key: &Key) -> bool {
        self.inner.lock().remove_trigger_internal(key).is_some()
    }

    pub fn reschedule_trigger(&self, key: &Key, mut new_trigger: Trigger) -> Result<Option<DateTime<Utc>>> {
        let mut inner = self.inner.lock();
        let old = inner.triggers.get(key).ok_or_else(|| SchedulerError::TriggerNotFound(key.clone()))?;
        let job_key = old.job_key.clone();
        new_trigger.job_key = job_key.clone();

        // This was the job's only trigger, removing it would delete a
        // non-durable job — keep the job alive across the swap, the caller
        // is replacing the trigger, not unscheduling the job.
        let job = inner.jobs.get(&job_key).cloned();
        inner.remove_trigger_internal(key);
        if let Some(job) = job {
            inner.jobs.entry(job_key).or_insert(job);
        }

        let next = new_trigger.next_fire_time;
        inner.insert_trigger(new_trigger);
        Ok(next)
    }

    /// Returns up to `max_count` due triggers, transitioning WAITING → ACQUIRED.
    /// Batching: once the first trigger's fire time `t0` is chosen, later
    /// triggers are only included if their fire time is `<= t0 + time_window`.
    pub fn acquire_next_triggers(
        &self,
        no_later_than: DateTime<Utc>,
        max_count: usize,
        time_window: Duration,
    ) -> Vec<Trigger> {
        let mut inner = self.inner.lock();
        let mut acquired = Vec::new();
        let mut batch_cutoff: Option<DateTime<Utc>> = None;
        let mut skip_once: HashSet<Key> = HashSet::new();

        loop {
            if acquired.len() >= max_count {
                break;
            }
            let candidate = inner
                .time_index
                .iter()
                .find(|e| e.next_fire_time <= no_later_than && !skip_once.contains(&e.key))
                .cloned();
            let Some(entry) = candidate else { break };
            if let Some(cutoff) = batch_cutoff {
                if entry.next_fire_time > cutoff {
                    break;
                }
            }
            let job_key = inner.triggers.get(&entry.key).map(|t| t.job_key.clone());
            if let Some(job_key) = job_key {
                if inner.blocked_jobs.contains(&job_key) {
                    skip_once.insert(entry.key.clone());
                    continue;
                }
            }
            if batch_cutoff.is_none() {
                batch_cutoff = Some(entry.next_fire_time + time_window);
            }
            inner.time_index.remove(&entry);
            if let Some(trigger) = inner.triggers.get_mut(&entry.key) {
                trigger.state = TriggerState::Acquired;
                acquired.push(trigger.clone());
            }
        }
        acquired
    }

    pub fn release_acquired_trigger(&self, key: &Key) {
        let mut inner = self.inner.lock();
        if let Some(trigger) = inner.triggers.get_mut(key) {
            trigger.state = TriggerState::Waiting;
            let clone = trigger.clone();
            inner.reindex(&clone);
        }
    }

    /// Fires a batch of acquired triggers: advances each, applies misfire
    /// recovery, records a `FiredTrigger`, and marks concurrent-disallowed
    /// jobs/sibling triggers blocked (spec §4.1, §4.3).
    pub fn triggers_fired(&self, keys: &[Key], misfire_threshold: Duration) -> Vec<TriggerFiredResult> {
        let mut inner = self.inner.lock();
        let now = Utc::now();
        let mut results = Vec::new();

        for key in keys {
            let Some(mut trigger) = inner.triggers.remove(key) else { continue };
            let Some(job) = inner.jobs.get(&trigger.job_key).cloned() else {
                continue;
            };

            let misfired = trigger.is_misfired(now, misfire_threshold);
            if misfired {
                trigger.apply_misfire_policy(now);
            }
            let scheduled_fire_time = trigger.next_fire_time.unwrap_or(now);
            let previous_fire_time = trigger.previous_fire_time;
            trigger.advance();
            inner.apply_calendar_exclusion(&mut trigger);
            if trigger.next_fire_time.is_none() && trigger.state != TriggerState::Error {
                trigger.state = TriggerState::Complete;
            }

            if job.concurrent_execution_disallowed {
                inner.blocked_jobs.insert(job.key.clone());
                if let Some(siblings) = inner.job_to_triggers.get(&job.key).cloned() {
                    for sibling_key in siblings {
                        if &sibling_key == key {
                            continue;
                        }
                        if let Some(sibling) = inner.triggers.get_mut(&sibling_key) {
                            if sibling.state == TriggerState::Waiting {
                                // Blocked triggers stay in the time index (see `reindex`) —
                                // only their acquirability changes, not their nextFireTime.
                                sibling.state = TriggerState::Blocked;
                            } else if sibling.state == TriggerState::Paused {
                                sibling.state = TriggerState::PausedBlocked;
                            }
                        }
                    }
                }
            }

            trigger.state = TriggerState::Executing;
            let fire_instance_id = Uuid::new_v4().to_string();
            inner.fired.insert(
                fire_instance_id.clone(),
                FiredTrigger {
                    fire_instance_id: fire_instance_id.clone(),
                    trigger: trigger.clone(),
                    job: job.clone(),
                    scheduled_fire_time,
                    actual_fire_time: now,
                },
            );
            inner.triggers.insert(key.clone(), trigger.clone());

            results.push(TriggerFiredResult {
                fire_instance_id,
                trigger,
                job,
                scheduled_fire_time,
                actual_fire_time: now,
                previous_fire_time,
                misfired,
            });
        }
        results
    }

    /// Completes one fired trigger: removes the `FiredTrigger` record,
    /// unblocks sibling triggers, applies `instruction`, and re-indexes
    /// whatever state the trigger ends up in (spec §4.1).
    pub fn triggered_job_complete(
        &self,
        fire_instance_id: &str,
        trigger_key: &Key,
        instruction: CompletionInstruction,
        updated_job_data: Option<crate::job::JobDataMap>,
    ) {
        let mut inner = self.inner.lock();
        inner.fired.remove(fire_instance_id);

        let job_key = inner.triggers.get(trigger_key).map(|t| t.job_key.clone());

        match instruction {
            CompletionInstruction::NoOp => {}
            CompletionInstruction::DeleteTrigger => {
                inner.remove_trigger_internal(trigger_key);
            }
            CompletionInstruction::SetTriggerComplete => {
                if let Some(trigger) = inner.triggers.get_mut(trigger_key) {
                    trigger.state = TriggerState::Complete;
                    let clone = trigger.clone();
                    inner.reindex(&clone);
                }
            }
            CompletionInstruction::SetTriggerError => {
                if let Some(trigger) = inner.triggers.get_mut(trigger_key) {
                    trigger.state = TriggerState::Error;
                    let clone = trigger.clone();
                    inner.reindex(&clone);
                }
            }
            CompletionInstruction::SetAllJobTriggersComplete => {
                if let Some(job_key) = &job_key {
                    if let Some(siblings) = inner.job_to_triggers.get(job_key).cloned() {
                        for k in siblings {
                            if let Some(trigger) = inner.triggers.get_mut(&k) {
                                trigger.state = TriggerState::Complete;
                                let clone = trigger.clone();
                                inner.reindex(&clone);
                            }
                        }
                    }
                }
            }
            CompletionInstruction::SetAllJobTriggersError => {
                if let Some(job_key) = &job_key {
                    if let Some(siblings) = inner.job_to_triggers.get(job_key).cloned() {
                        for k in siblings {
                            if let Some(trigger) = inner.triggers.get_mut(&k) {
                                trigger.state = TriggerState::Error;
                                let clone = trigger.clone();
                                inner.reindex(&clone);
                            }
                        }
                    }
                }
            }
            CompletionInstruction::ReExecuteJob => {
                if let Some(trigger) = inner.triggers.get_mut(trigger_key) {
                    trigger.next_fire_time = Some(Utc::now());
                    trigger.state = TriggerState::Waiting;
                    let clone = trigger.clone();
                    inner.reindex(&clone);
                }
            }
        }

        if let Some(job_key) = job_key {
            if let Some(data) = updated_job_data {
                if let Some(job) = inner.jobs.get(&job_key) {
                    if job.persist_job_data_after_execution {
                        inner.jobs.get_mut(&job_key).expect("checked above").data = data;
                    }
                }
            }
            inner.blocked_jobs.remove(&job_key);
            if let Some(siblings) = inner.job_to_triggers.get(&job_key).cloned() {
                for k in siblings {
                    if let Some(sibling) = inner.triggers.get_mut(&k) {
                        let unblocked_state = match sibling.state {
                            TriggerState::Blocked => Some(TriggerState::Waiting),
                            TriggerState::PausedBlocked => Some(TriggerState::Paused),
                            _ => None,
                        };
                        if let Some(state) = unblocked_state {
                            sibling.state = state;
                            let clone = sibling.clone();
                            inner.reindex(&clone);
                        }
                    }
                }
            }
        }
    }

    pub fn get_next_fire_time(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().time_index.iter().next().map(|e| e.next_fire_time)
    }

    /// Adds or replaces a calendar. If `update_triggers` is set, every
    /// trigger currently referencing `name` has its `nextFireTime`
    /// recomputed against the new calendar (spec §6 `addCalendar`).
    pub fn add_calendar(
        &self,
        name: impl Into<String>,
        calendar: Arc<dyn Calendar>,
        replace: bool,
        update_triggers: bool,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let name = name.into();
        if !replace && inner.calendars.contains_key(&name) {
            return Err(SchedulerError::SchedulerConfig(format!("calendar {name:?} already exists")));
        }
        inner.calendars.insert(name.clone(), calendar);

        if update_triggers {
            let affected: Vec<Key> = inner
                .triggers
                .values()
                .filter(|t| t.calendar_name.as_deref() == Some(name.as_str()))
                .map(|t| t.key.clone())
                .collect();
            for key in affected {
                if let Some(mut trigger) = inner.triggers.remove(&key) {
                    inner.apply_calendar_exclusion(&mut trigger);
                    if trigger.next_fire_time.is_none() && trigger.state == TriggerState::Waiting {
                        trigger.state = TriggerState::Complete;
                    }
                    inner.reindex(&trigger);
                    inner.triggers.insert(key, trigger);
                }
            }
        }
        Ok(())
    }

    pub fn get_calendar(&self, name: &str) -> Option<Arc<dyn Calendar>> {
        self.inner.lock().calendars.get(name).cloned()
    }

    pub fn delete_calendar(&self, name: &str) -> bool {
        self.inner.lock().calendars.remove(name).is_some()
    }

    pub fn pause_trigger(&self, key: &Key) {
        let mut inner = self.inner.lock();
        inner.paused_trigger_keys.insert(key.clone());
        if let Some(trigger) = inner.triggers.get_mut(key) {
            if trigger.state == TriggerState::Blocked {
                trigger.state = TriggerState::PausedBlocked;
            } else if trigger.state == TriggerState::Waiting {
                trigger.state = TriggerState::Paused;
            }
            let clone = trigger.clone();
            inner.reindex(&clone);
        }
    }

    pub fn resume_trigger(&self, key: &Key) {
        let mut inner = self.inner.lock();
        inner.paused_trigger_keys.remove(key);
        if let Some(trigger) = inner.triggers.get_mut(key) {
            if !inner.paused_trigger_groups.contains(&key.group)
                && !inner.paused_job_keys.contains(&trigger.job_key)
                && !inner.paused_job_groups.contains(&trigger.job_key.group)
            {
                trigger.state = if trigger.state == TriggerState::PausedBlocked {
                    TriggerState::Blocked
                } else {
                    TriggerState::Waiting
                };
                let clone = trigger.clone();
                inner.reindex(&clone);
            }
        }
    }

    pub fn pause_triggers(&self, matcher: &Matcher) -> Vec<String> {
        let mut inner = self.inner.lock();
        let keys: Vec<Key> = inner.triggers.keys().filter(|k| matcher.is_match(k)).cloned().collect();
        let mut groups = HashSet::new();
        for key in &keys {
            groups.insert(key.group.clone());
        }
        for group in &groups {
            inner.paused_trigger_groups.insert(group.clone());
        }
        for key in keys {
            if let Some(trigger) = inner.triggers.get_mut(&key) {
                if trigger.state == TriggerState::Blocked {
                    trigger.state = TriggerState::PausedBlocked;
                } else if trigger.state == TriggerState::Waiting {
                    trigger.state = TriggerState::Paused;
                }
                let clone = trigger.clone();
                inner.reindex(&clone);
            }
        }
        groups.into_iter().collect()
    }

    pub fn resume_triggers(&self, matcher: &Matcher) -> Vec<String> {
        let mut inner = self.inner.lock();
        let groups: Vec<String> = inner.trigger_groups.keys().filter(|g| matcher.is_match(&Key::with_group("", (*g).clone()))).cloned().collect();
        for group in &groups {
            inner.paused_trigger_groups.remove(group);
        }
        let keys: Vec<Key> = inner.triggers.keys().filter(|k| groups.contains(&k.group)).cloned().collect();
        for key in keys {
            if let Some(trigger) = inner.triggers.get_mut(&key) {
                if !inner.paused_job_keys.contains(&trigger.job_key) && !inner.paused_job_groups.contains(&trigger.job_key.group) {
                    trigger.state = if trigger.state == TriggerState::PausedBlocked {
                        TriggerState::Blocked
                    } else {
                        TriggerState::Waiting
                    };
                    let clone = trigger.clone();
                    inner.reindex(&clone);
                }
            }
        }
        groups
    }

    pub fn pause_job(&self, key: &Key) {
        let mut inner = self.inner.lock();
        inner.paused_job_keys.insert(key.clone());
        if let Some(trigger_keys) = inner.job_to_triggers.get(key).cloned() {
            for trigger_key in trigger_keys {
                if let Some(trigger) = inner.triggers.get_mut(&trigger_key) {
                    if trigger.state == TriggerState::Blocked {
                        trigger.state = TriggerState::PausedBlocked;
                    } else if trigger.state == TriggerState::Waiting {
                        trigger.state = TriggerState::Paused;
                    }
                    let clone = trigger.clone();
                    inner.reindex(&clone);
                }
            }
        }
    }

    pub fn resume_job(&self, key: &Key) {
        let mut inner = self.inner.lock();
        inner.paused_job_keys.remove(key);
        if let Some(trigger_keys) = inner.job_to_triggers.get(key).cloned() {
            for trigger_key in trigger_keys {
                if let Some(trigger) = inner.triggers.get_mut(&trigger_key) {
                    if !inner.paused_trigger_keys.contains(&trigger_key) && !inner.paused_trigger_groups.contains(&trigger_key.group) {
                        trigger.state = if trigger.state == TriggerState::PausedBlocked {
                            TriggerState::Blocked
                        } else {
                            TriggerState::Waiting
                        };
                        let clone = trigger.clone();
                        inner.reindex(&clone);
                    }
                }
            }
        }
    }

    pub fn get_job_group_names(&self) -> Vec<String> {
        self.inner.lock().job_groups.keys().cloned().collect()
    }

    pub fn get_trigger_group_names(&self) -> Vec<String> {
        self.inner.lock().trigger_groups.keys().cloned().collect()
    }

    pub fn get_job_keys(&self, matcher: &Matcher) -> Vec<Key> {
        self.inner.lock().jobs.keys().filter(|k| matcher.is_match(k)).cloned().collect()
    }

    pub fn get_trigger_keys(&self, matcher: &Matcher) -> Vec<Key> {
        self.inner.lock().triggers.keys().filter(|k| matcher.is_match(k)).cloned().collect()
    }

    pub fn get_triggers_of_job(&self, job_key: &Key) -> Vec<Trigger> {
        let inner = self.inner.lock();
        inner
            .job_to_triggers
            .get(job_key)
            .into_iter()
            .flatten()
            .filter_map(|k| inner.triggers.get(k).cloned())
            .collect()
    }

    pub fn get_trigger_state(&self, key: &Key) -> Option<TriggerState> {
        self.inner.lock().triggers.get(key).map(|t| t.state)
    }

    pub fn currently_executing(&self) -> Vec<FiredTrigger> {
        self.inner.lock().fired.values().cloned().collect()
    }

    pub fn get_fired_trigger(&self, fire_instance_id: &str) -> Option<FiredTrigger> {
        self.inner.lock().fired.get(fire_instance_id).cloned()
    }

    /// Deletes all jobs, triggers, and calendars (`Facade::clear`).
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        *inner = Inner::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::{SimpleTrigger, TriggerSchedule};

    fn job(key: Key) -> JobDetail {
        JobDetail::new(key, "demo.Noop")
    }

    fn trigger(key: Key, job_key: Key, start: DateTime<Utc>) -> Trigger {
        Trigger::new(key, job_key, TriggerSchedule::Simple(SimpleTrigger::repeat_forever(1_000))).with_start_time(start)
    }

    #[test]
    fn store_and_acquire_respects_no_later_than() {
        let store = RamJobStore::new();
        let now = Utc::now();
        store
            .store_job_and_trigger(job(Key::new("j1")), trigger(Key::new("t1"), Key::new("j1"), now), false)
            .expect("store succeeds");

        let acquired = store.acquire_next_triggers(now - Duration::seconds(1), 10, Duration::zero());
        assert!(acquired.is_empty());

        let acquired = store.acquire_next_triggers(now, 10, Duration::zero());
        assert_eq!(acquired.len(), 1);
        assert_eq!(store.get_trigger(&Key::new("t1")).unwrap().state, TriggerState::Acquired);
    }

    #[test]
    fn duplicate_store_without_replace_errors() {
        let store = RamJobStore::new();
        let now = Utc::now();
        store
            .store_job_and_trigger(job(Key::new("j1")), trigger(Key::new("t1"), Key::new("j1"), now), false)
            .expect("first store succeeds");
        let err = store
            .store_job_and_trigger(job(Key::new("j1")), trigger(Key::new("t2"), Key::new("j1"), now), false)
            .unwrap_err();
        assert!(matches!(err, SchedulerError::ObjectAlreadyExists(_)));
    }

    #[test]
    fn non_durable_job_removed_when_last_trigger_removed() {
        let store = RamJobStore::new();
        let now = Utc::now();
        store
            .store_job_and_trigger(job(Key::new("j1")), trigger(Key::new("t1"), Key::new("j1"), now), false)
            .expect("store succeeds");
        assert!(store.remove_trigger(&Key::new("t1")));
        assert!(store.get_job(&Key::new("j1")).is_none());
    }

    #[test]
    fn concurrent_execution_disallowed_blocks_sibling_trigger() {
        let store = RamJobStore::new();
        let now = Utc::now();
        let mut blocking_job = job(Key::new("j1"));
        blocking_job.concurrent_execution_disallowed = true;
        store.store_job_and_trigger(blocking_job, trigger(Key::new("t1"), Key::new("j1"), now), false).expect("store t1");
        store
            .store_trigger(trigger(Key::new("t2"), Key::new("j1"), now + Duration::seconds(1)), false)
            .expect("store t2");

        let acquired = store.acquire_next_triggers(now, 10, Duration::zero());
        assert_eq!(acquired.len(), 1);
        let fired = store.triggers_fired(&[acquired[0].key.clone()], Duration::seconds(60));
        assert_eq!(fired.len(), 1);

        assert_eq!(store.get_trigger_state(&Key::new("t2")), Some(TriggerState::Blocked));

        store.triggered_job_complete(&fired[0].fire_instance_id, &fired[0].trigger.key, CompletionInstruction::NoOp, None);
        assert_eq!(store.get_trigger_state(&Key::new("t2")), Some(TriggerState::Waiting));
    }

    #[test]
    fn get_next_fire_time_is_the_minimum() {
        let store = RamJobStore::new();
        let now = Utc::now();
        store.store_job_and_trigger(job(Key::new("j1")), trigger(Key::new("t1"), Key::new("j1"), now + Duration::seconds(10)), false).expect("store t1");
        store.add_job(job(Key::new("j2")), false).expect("add j2");
        store.store_trigger(trigger(Key::new("t2"), Key::new("j2"), now + Duration::seconds(1)), false).expect("store t2");
        assert_eq!(store.get_next_fire_time(), Some(now + Duration::seconds(1)));
    }

    #[test]
    fn reschedule_trigger_preserves_non_durable_job_when_it_is_the_only_trigger() {
        let store = RamJobStore::new();
        let now = Utc::now();
        store
            .store_job_and_trigger(job(Key::new("j1")), trigger(Key::new("t1"), Key::new("j1"), now + Duration::seconds(10)), false)
            .expect("store t1");

        store
            .reschedule_trigger(&Key::new("t1"), trigger(Key::new("t1"), Key::new("j1"), now + Duration::seconds(20)))
            .expect("reschedule succeeds");

        assert!(store.get_job(&Key::new("j1")).is_some(), "rescheduling a trigger must not delete its non-durable job");
        assert_eq!(
            store.get_trigger(&Key::new("t1")).and_then(|t| t.next_fire_time),
            Some(now + Duration::seconds(20))
        );
    }

    #[test]
    fn get_next_fire_time_counts_blocked_triggers() {
        let mut disallowed = job(Key::new("j1"));
        disallowed.concurrent_execution_disallowed = true;
        let store = RamJobStore::new();
        let now = Utc::now();
        store
            .store_job_and_trigger(disallowed, trigger(Key::new("t1"), Key::new("j1"), now), false)
            .expect("store t1");
        store
            .store_trigger(trigger(Key::new("t2"), Key::new("j1"), now + Duration::seconds(1)), false)
            .expect("store t2");
        store
            .store_job_and_trigger(job(Key::new("j2")), trigger(Key::new("t3"), Key::new("j2"), now + Duration::seconds(30)), false)
            .expect("store t3");

        let acquired = store.acquire_next_triggers(now, 10, Duration::zero());
        assert_eq!(acquired.len(), 1);
        store.triggers_fired(&[acquired[0].key.clone()], Duration::seconds(60));
        assert_eq!(store.get_trigger_state(&Key::new("t2")), Some(TriggerState::Blocked));

        assert_eq!(store.get_next_fire_time(), Some(now + Duration::seconds(1)));
    }
}
