//! The public scheduler facade: lifecycle plus every operation in spec §6.
//!
//! Grounded on the teacher's `Scheduler` trait (`scheduler/traits.rs`) and
//! its `TokioScheduler::{start, stop}` pair, resynchronized from an
//! async/`watch`-channel signal to the `SchedulerThread`'s
//! `parking_lot::Condvar` per spec §5's OS-thread concurrency model.

use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::calendar::Calendar;
use crate::config::SchedulerOptions;
use crate::error::{Result, SchedulerError};
use crate::job::{JobDataMap, JobDetail, JobExecutionContext};
use crate::key::Key;
use crate::listener::{JobListener, ListenerManager, SchedulerListener, TriggerListener};
use crate::matcher::Matcher;
use crate::pool::WorkerPool;
use crate::registry::JobRegistry;
use crate::scheduler_thread::SchedulerThread;
use crate::store::{FiredTrigger, RamJobStore};
use crate::trigger::{SimpleTrigger, Trigger, TriggerSchedule, TriggerState};

/// Scheduler lifecycle (spec §4.6): `Created → Starting → Started ⇄ Standby
/// → ShuttingDown → Shutdown` (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Starting,
    Started,
    Standby,
    ShuttingDown,
    Shutdown,
}

/// The public entry point: stores jobs/triggers, owns a worker pool and a
/// scheduler thread, and fans events out through a [`ListenerManager`].
pub struct Scheduler {
    store: Arc<RamJobStore>,
    pool: Arc<WorkerPool>,
    registry: Arc<JobRegistry>,
    listeners: Arc<ListenerManager>,
    scheduler_thread: Arc<SchedulerThread>,
    options: SchedulerOptions,
    state: Mutex<LifecycleState>,
    thread_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(options: SchedulerOptions, registry: Arc<JobRegistry>) -> Arc<Self> {
        let store = Arc::new(RamJobStore::new());
        let pool = Arc::new(WorkerPool::new(options.thread_count.max(1), options.instance_name.clone()));
        let listeners = Arc::new(ListenerManager::new());
        let scheduler_thread = SchedulerThread::new(
            Arc::clone(&store),
            Arc::clone(&pool),
            Arc::clone(&registry),
            Arc::clone(&listeners),
            options.clone(),
        );
        Arc::new(Self {
            store,
            pool,
            registry,
            listeners,
            scheduler_thread,
            options,
            state: Mutex::new(LifecycleState::Created),
            thread_handle: Mutex::new(None),
        })
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    fn ensure_not_shutdown(&self) -> Result<()> {
        match *self.state.lock() {
            LifecycleState::ShuttingDown | LifecycleState::Shutdown => Err(SchedulerError::SchedulerShutdown),
            _ => Ok(()),
        }
    }

    // ---- Lifecycle (spec §4.6) ----------------------------------------

    pub fn start(&self) -> Result<()> {
        self.ensure_not_shutdown()?;
        {
            let mut state = self.state.lock();
            if matches!(*state, LifecycleState::Starting | LifecycleState::Started) {
                return Ok(());
            }
            *state = LifecycleState::Starting;
        }
        self.listeners.notify_scheduler_starting();

        let mut handle_guard = self.thread_handle.lock();
        if handle_guard.is_none() {
            let runner = Arc::clone(&self.scheduler_thread);
            let name = format!("{}-thread", self.options.instance_name);
            let handle = thread::Builder::new()
                .name(name)
                .spawn(move || runner.run_loop())
                .map_err(|e| SchedulerError::SchedulerConfig(format!("failed to spawn scheduler thread: {e}")))?;
            *handle_guard = Some(handle);
        }
        drop(handle_guard);

        self.scheduler_thread.set_standby(false);
        *self.state.lock() = LifecycleState::Started;
        self.listeners.notify_scheduler_started();
        info!(instance = %self.options.instance_name, "scheduler started");
        Ok(())
    }

    /// Starts after `delay`, on a detached thread, matching §6's
    /// `startDelayed(delayMs)`. Requires the scheduler to be held behind an
    /// `Arc` (as returned by [`Scheduler::new`]).
    pub fn start_delayed(self: &Arc<Self>, delay: StdDuration) {
        let scheduler = Arc::clone(self);
        thread::spawn(move || {
            thread::sleep(delay);
            let _ = scheduler.start();
        });
    }

    pub fn standby(&self) -> Result<()> {
        self.ensure_not_shutdown()?;
        self.scheduler_thread.set_standby(true);
        *self.state.lock() = LifecycleState::Standby;
        self.listeners.notify_scheduler_in_standby_mode();
        Ok(())
    }

    pub fn shutdown(&self, wait_for_jobs_to_complete: bool) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state == LifecycleState::Shutdown {
                return Ok(());
            }
            *state = LifecycleState::ShuttingDown;
        }
        self.listeners.notify_scheduler_shutting_down();

        self.scheduler_thread.request_shutdown();
        self.pool.shutdown(wait_for_jobs_to_complete);

        if let Some(handle) = self.thread_handle.lock().take() {
            let _ = handle.join();
        }

        *self.state.lock() = LifecycleState::Shutdown;
        self.listeners.notify_scheduler_shutdown();
        info!(instance = %self.options.instance_name, "scheduler shut down");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.ensure_not_shutdown()?;
        self.store.clear();
        self.listeners.notify_scheduling_data_cleared();
        Ok(())
    }

    // ---- Scheduling operations (spec §6) -------------------------------

    pub fn schedule_job(&self, job: JobDetail, trigger: Trigger) -> Result<DateTime<Utc>> {
        self.ensure_not_shutdown()?;
        let job_key = job.key.clone();
        let trigger_key = trigger.key.clone();
        self.store.store_job_and_trigger(job, trigger, false)?;
        self.listeners.notify_job_added(&job_key);
        self.scheduler_thread.signal();
        self.next_fire_time_of(&trigger_key)
    }

    /// `trigger` must reference an already-stored job.
    pub fn schedule_trigger(&self, trigger: Trigger) -> Result<DateTime<Utc>> {
        self.ensure_not_shutdown()?;
        let trigger_key = trigger.key.clone();
        self.store.store_trigger(trigger, false)?;
        self.scheduler_thread.signal();
        self.next_fire_time_of(&trigger_key)
    }

    /// Reads back the actual stored `nextFireTime`, which may differ from
    /// what the caller computed if a named calendar excluded it (spec §3
    /// "chained calendars intersect").
    fn next_fire_time_of(&self, trigger_key: &Key) -> Result<DateTime<Utc>> {
        self.store
            .get_trigger(trigger_key)
            .and_then(|t| t.next_fire_time)
            .ok_or_else(|| SchedulerError::SchedulerConfig("trigger has no fire times".into()))
    }

    pub fn add_job(&self, job: JobDetail, replace: bool) -> Result<()> {
        self.ensure_not_shutdown()?;
        let job_key = job.key.clone();
        self.store.add_job(job, replace)?;
        self.listeners.notify_job_added(&job_key);
        Ok(())
    }

    pub fn delete_job(&self, job_key: &Key) -> Result<bool> {
        self.ensure_not_shutdown()?;
        let removed = self.store.remove_job(job_key);
        if removed {
            self.listeners.notify_job_deleted(job_key);
        }
        Ok(removed)
    }

    pub fn delete_jobs(&self, job_keys: &[Key]) -> Result<bool> {
        let mut all = true;
        for key in job_keys {
            all &= self.delete_job(key)?;
        }
        Ok(all)
    }

    pub fn unschedule_job(&self, trigger_key: &Key) -> Result<bool> {
        self.ensure_not_shutdown()?;
        Ok(self.store.remove_trigger(trigger_key))
    }

    pub fn reschedule_job(&self, trigger_key: &Key, new_trigger: Trigger) -> Result<Option<DateTime<Utc>>> {
        self.ensure_not_shutdown()?;
        let next = self.store.reschedule_trigger(trigger_key, new_trigger)?;
        self.scheduler_thread.signal();
        Ok(next)
    }

    /// Immediately fires a one-off execution of `job_key`'s job, outside its
    /// regular trigger schedule (spec §6 `triggerJob`).
    pub fn trigger_job(&self, job_key: &Key, data_override: Option<JobDataMap>) -> Result<()> {
        self.ensure_not_shutdown()?;
        if self.store.get_job(job_key).is_none() {
            return Err(SchedulerError::JobNotFound(job_key.clone()));
        }
        let trigger_key = Key::with_group(format!("manual-{}", Uuid::new_v4()), job_key.group.clone());
        let mut trigger = Trigger::new(trigger_key, job_key.clone(), TriggerSchedule::Simple(SimpleTrigger::new(0, 0)))
            .with_start_time(Utc::now());
        if let Some(data) = data_override {
            trigger = trigger.with_data(data);
        }
        self.store.store_trigger(trigger, false)?;
        self.scheduler_thread.signal();
        Ok(())
    }

    // ---- Pause / resume (spec §6) ---------------------------------------

    pub fn pause_job(&self, job_key: &Key) -> Result<()> {
        self.ensure_not_shutdown()?;
        self.store.pause_job(job_key);
        self.listeners.notify_job_paused(job_key);
        Ok(())
    }

    pub fn pause_jobs(&self, matcher: &Matcher) -> Result<()> {
        self.ensure_not_shutdown()?;
        for key in self.store.get_job_keys(matcher) {
            self.store.pause_job(&key);
            self.listeners.notify_job_paused(&key);
        }
        Ok(())
    }

    pub fn resume_job(&self, job_key: &Key) -> Result<()> {
        self.ensure_not_shutdown()?;
        self.store.resume_job(job_key);
        self.listeners.notify_job_resumed(job_key);
        self.scheduler_thread.signal();
        Ok(())
    }

    pub fn resume_jobs(&self, matcher: &Matcher) -> Result<()> {
        self.ensure_not_shutdown()?;
        for key in self.store.get_job_keys(matcher) {
            self.store.resume_job(&key);
            self.listeners.notify_job_resumed(&key);
        }
        self.scheduler_thread.signal();
        Ok(())
    }

    pub fn pause_trigger(&self, trigger_key: &Key) -> Result<()> {
        self.ensure_not_shutdown()?;
        self.store.pause_trigger(trigger_key);
        self.listeners.notify_trigger_paused(trigger_key);
        Ok(())
    }

    pub fn pause_triggers(&self, matcher: &Matcher) -> Result<Vec<String>> {
        self.ensure_not_shutdown()?;
        let groups = self.store.pause_triggers(matcher);
        for key in self.store.get_trigger_keys(matcher) {
            self.listeners.notify_trigger_paused(&key);
        }
        Ok(groups)
    }

    pub fn resume_trigger(&self, trigger_key: &Key) -> Result<()> {
        self.ensure_not_shutdown()?;
        self.store.resume_trigger(trigger_key);
        self.listeners.notify_trigger_resumed(trigger_key);
        self.scheduler_thread.signal();
        Ok(())
    }

    pub fn resume_triggers(&self, matcher: &Matcher) -> Result<Vec<String>> {
        self.ensure_not_shutdown()?;
        let groups = self.store.resume_triggers(matcher);
        for key in self.store.get_trigger_keys(matcher) {
            self.listeners.notify_trigger_resumed(&key);
        }
        self.scheduler_thread.signal();
        Ok(groups)
    }

    // ---- Execution introspection / cancellation ------------------------

    pub fn currently_executing_jobs(&self) -> Vec<FiredTrigger> {
        self.store.currently_executing()
    }

    /// Interrupts every currently-executing instance of `job_key`'s job.
    pub fn interrupt_job(&self, job_key: &Key) -> bool {
        let mut interrupted = false;
        for fired in self.store.currently_executing() {
            if &fired.job.key == job_key {
                interrupted |= self.pool.interrupt(&fired.fire_instance_id);
            }
        }
        interrupted
    }

    pub fn interrupt_fire_instance(&self, fire_instance_id: &str) -> bool {
        self.pool.interrupt(fire_instance_id)
    }

    // ---- Calendars (spec §6) --------------------------------------------

    pub fn add_calendar(
        &self,
        name: impl Into<String>,
        calendar: Arc<dyn Calendar>,
        replace: bool,
        update_triggers: bool,
    ) -> Result<()> {
        self.ensure_not_shutdown()?;
        self.store.add_calendar(name, calendar, replace, update_triggers)
    }

    pub fn delete_calendar(&self, name: &str) -> Result<bool> {
        self.ensure_not_shutdown()?;
        Ok(self.store.delete_calendar(name))
    }

    // ---- Listing / introspection (spec §6) ------------------------------

    pub fn job_group_names(&self) -> Vec<String> {
        self.store.get_job_group_names()
    }

    pub fn trigger_group_names(&self) -> Vec<String> {
        self.store.get_trigger_group_names()
    }

    pub fn job_keys(&self, matcher: &Matcher) -> Vec<Key> {
        self.store.get_job_keys(matcher)
    }

    pub fn trigger_keys(&self, matcher: &Matcher) -> Vec<Key> {
        self.store.get_trigger_keys(matcher)
    }

    pub fn triggers_of_job(&self, job_key: &Key) -> Vec<Trigger> {
        self.store.get_triggers_of_job(job_key)
    }

    pub fn trigger_state(&self, trigger_key: &Key) -> Option<TriggerState> {
        self.store.get_trigger_state(trigger_key)
    }

    // ---- Listener registration -------------------------------------------

    pub fn add_job_listener(&self, listener: Arc<dyn JobListener>, matchers: Vec<Matcher>) {
        self.listeners.add_job_listener(listener, matchers);
    }

    pub fn add_trigger_listener(&self, listener: Arc<dyn TriggerListener>, matchers: Vec<Matcher>) {
        self.listeners.add_trigger_listener(listener, matchers);
    }

    pub fn add_scheduler_listener(&self, listener: Arc<dyn SchedulerListener>) {
        self.listeners.add_scheduler_listener(listener);
    }

    /// The registry the embedding application should populate with job
    /// factories before calling [`Scheduler::start`] (spec §4.7).
    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }
}
