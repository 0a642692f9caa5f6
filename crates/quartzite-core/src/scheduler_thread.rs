//! The scheduler thread: acquire → fire → hand off → signal (spec §4.2).
//!
//! Grounded on the teacher's `TokioScheduler` tick loop
//! (`tokio_scheduler.rs::compute_next_run`/`run`), translated from a
//! 1-second-poll tokio task driven by `watch::Sender<bool>` into a
//! condvar-driven OS thread that sleeps precisely until the next fire time
//! and wakes early on signal, per spec §4.2/§5.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::config::SchedulerOptions;
use crate::job::{CancellationToken, JobExecutionContext};
use crate::listener::ListenerManager;
use crate::registry::JobRegistry;
use crate::store::{RamJobStore, TriggerFiredResult};
use crate::trigger::CompletionInstruction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Standby,
    Running,
}

fn clamp_to_std(duration: chrono::Duration) -> StdDuration {
    duration.to_std().unwrap_or(StdDuration::ZERO)
}

/// Owns the acquire/fire/hand-off loop. Spawned on its own `std::thread` by
/// the facade; `signal`/`set_standby`/`request_shutdown` are the only
/// cross-thread entry points.
pub struct SchedulerThread {
    store: Arc<RamJobStore>,
    pool: Arc<crate::pool::WorkerPool>,
    registry: Arc<JobRegistry>,
    listeners: Arc<ListenerManager>,
    options: SchedulerOptions,
    run_state: Mutex<RunState>,
    wake: Condvar,
    shutdown: AtomicBool,
}

impl SchedulerThread {
    pub fn new(
        store: Arc<RamJobStore>,
        pool: Arc<crate::pool::WorkerPool>,
        registry: Arc<JobRegistry>,
        listeners: Arc<ListenerManager>,
        options: SchedulerOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            pool,
            registry,
            listeners,
            options,
            run_state: Mutex::new(RunState::Standby),
            wake: Condvar::new(),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Wakes the loop so it re-evaluates the store's next fire time (spec
    /// §4.2 "signalling"). Called after any mutation that might produce an
    /// earlier `nextFireTime`.
    pub fn signal(&self) {
        self.wake.notify_all();
    }

    pub fn set_standby(&self, standby: bool) {
        *self.run_state.lock() = if standby { RunState::Standby } else { RunState::Running };
        self.wake.notify_all();
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_all();
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// The loop body. Run this on a dedicated thread.
    pub fn run_loop(&self) {
        info!("scheduler thread starting loop");
        loop {
            if self.is_shutdown_requested() {
                break;
            }

            {
                let mut state = self.run_state.lock();
                while *state == RunState::Standby && !self.is_shutdown_requested() {
                    self.wake.wait(&mut state);
                }
            }
            if self.is_shutdown_requested() {
                break;
            }

            let available = self.pool.block_for_available_threads();
            if self.is_shutdown_requested() {
                break;
            }
            if available == 0 {
                continue;
            }

            let now = Utc::now();
            let max_count = available.min(self.options.max_batch_size.max(1));
            let batch = self.store.acquire_next_triggers(
                now + self.options.idle_wait_time(),
                max_count,
                self.options.batch_time_window(),
            );

            if batch.is_empty() {
                let mut state = self.run_state.lock();
                self.wake.wait_for(&mut state, clamp_to_std(self.options.idle_wait_time()));
                continue;
            }

            let first_fire = batch[0].next_fire_time.unwrap_or(now);
            let time_until_fire = first_fire - Utc::now();
            if time_until_fire > chrono::Duration::milliseconds(2) {
                {
                    let mut state = self.run_state.lock();
                    self.wake.wait_for(&mut state, clamp_to_std(time_until_fire));
                }
                let fresher = self.store.get_next_fire_time();
                if fresher.is_some_and(|t| t < first_fire) {
                    debug!("an earlier trigger was scheduled; releasing acquired batch");
                    for trigger in &batch {
                        self.store.release_acquired_trigger(&trigger.key);
                    }
                    continue;
                }
            }

            let keys: Vec<_> = batch.iter().map(|t| t.key.clone()).collect();
            let results = self.store.triggers_fired(&keys, self.options.misfire_threshold());
            for result in results {
                self.handle_fired(result);
            }
        }
        info!("scheduler thread loop exiting");
    }

    fn handle_fired(&self, result: TriggerFiredResult) {
        if result.misfired {
            warn!(trigger = %result.trigger.key, "trigger misfired");
            self.listeners.notify_trigger_misfired(&result.trigger.key);
        }

        let merged_data = result.job.data.merged_with(&result.trigger.data);
        let ctx = JobExecutionContext {
            fire_instance_id: result.fire_instance_id.clone(),
            job_key: result.job.key.clone(),
            trigger_key: result.trigger.key.clone(),
            scheduled_fire_time: result.scheduled_fire_time,
            actual_fire_time: result.actual_fire_time,
            previous_fire_time: result.previous_fire_time,
            next_fire_time: result.trigger.next_fire_time,
            merged_data,
            cancellation: CancellationToken::new(),
            was_interrupted: false,
        };

        if self.listeners.notify_trigger_fired(&ctx) {
            self.listeners.notify_trigger_misfired(&ctx.trigger_key);
            self.store
                .triggered_job_complete(&ctx.fire_instance_id, &ctx.trigger_key, CompletionInstruction::NoOp, None);
            return;
        }

        self.listeners.notify_job_to_be_executed(&ctx);

        let Some(job) = self.registry.build(&result.job.job_class) else {
            warn!(job_class = %result.job.job_class, "no factory registered for job class");
            let error = crate::error::JobExecutionError::new(format!(
                "no factory registered for job class {:?}",
                result.job.job_class
            ));
            self.listeners.notify_job_was_executed(&ctx, Some(&error));
            self.store.triggered_job_complete(
                &ctx.fire_instance_id,
                &ctx.trigger_key,
                CompletionInstruction::SetTriggerError,
                None,
            );
            return;
        };

        let store = Arc::clone(&self.store);
        let listeners = Arc::clone(&self.listeners);
        let cancellation = ctx.cancellation.clone();
        let fire_instance_id = ctx.fire_instance_id.clone();
        let trigger_key = ctx.trigger_key.clone();
        let job_class = result.job.job_class.clone();

        let store_on_panic = Arc::clone(&self.store);
        let listeners_on_panic = Arc::clone(&self.listeners);
        let fire_instance_id_on_panic = fire_instance_id.clone();
        let trigger_key_on_panic = trigger_key.clone();

        let started = self.pool.run_in_thread(
            fire_instance_id.clone(),
            cancellation.clone(),
            move || {
                let mut ctx = ctx;
                let outcome = job.execute(&mut ctx);
                if cancellation.is_cancelled() {
                    ctx.was_interrupted = true;
                }
                let error = outcome.as_ref().err().cloned();
                listeners.notify_job_was_executed(&ctx, error.as_ref());

                let (instruction, updated_data) = match &outcome {
                    Ok(()) => (CompletionInstruction::NoOp, Some(ctx.merged_data.clone())),
                    Err(e) if e.refire_immediately => (CompletionInstruction::ReExecuteJob, None),
                    Err(e) if e.unschedule_firing_trigger => (CompletionInstruction::DeleteTrigger, None),
                    Err(_) => (CompletionInstruction::SetTriggerError, None),
                };
                store.triggered_job_complete(&fire_instance_id, &trigger_key, instruction, updated_data);
            },
            move || {
                listeners_on_panic.notify_scheduler_error(&format!(
                    "job class {job_class:?} (fire_instance_id={fire_instance_id_on_panic}) panicked during execution"
                ));
                store_on_panic.triggered_job_complete(
                    &fire_instance_id_on_panic,
                    &trigger_key_on_panic,
                    CompletionInstruction::SetTriggerError,
                    None,
                );
            },
        );

        if !started {
            self.store.triggered_job_complete(
                &ctx.fire_instance_id,
                &ctx.trigger_key,
                CompletionInstruction::NoOp,
                None,
            );
        }
    }
}
