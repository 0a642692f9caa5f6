//! Bounded-concurrency OS-thread worker pool (spec §4.4, §5).
//!
//! Grounded on a `std::thread`-based render worker pool (see DESIGN.md): an
//! `AtomicBool` shutdown flag, `thread::Builder`-named threads, and
//! per-execution cooperative cancellation, adapted to a slot-counted model so
//! the scheduler thread can ask "how many can I hand off right now".

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};
use tracing::error;

use crate::job::CancellationToken;

struct Slots {
    available: Mutex<usize>,
    condvar: Condvar,
}

struct ExecutionHandle {
    cancellation: CancellationToken,
    handle: Option<thread::JoinHandle<()>>,
}

/// Executes jobs on a fixed number of OS threads (spec §4.4
/// "Configuration: fixed threadCount >= 1").
pub struct WorkerPool {
    name_prefix: String,
    slots: Arc<Slots>,
    shutdown: Arc<AtomicBool>,
    executing: Arc<Mutex<HashMap<String, ExecutionHandle>>>,
}

impl WorkerPool {
    pub fn new(thread_count: usize, name_prefix: impl Into<String>) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            slots: Arc::new(Slots {
                available: Mutex::new(thread_count.max(1)),
                condvar: Condvar::new(),
            }),
            shutdown: Arc::new(AtomicBool::new(false)),
            executing: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Blocks until at least one thread is free, returning the current free
    /// count. Returns immediately with `0` once shutdown has started.
    pub fn block_for_available_threads(&self) -> usize {
        let mut available = self.slots.available.lock();
        while *available == 0 && !self.shutdown.load(Ordering::Acquire) {
            self.slots.condvar.wait(&mut available);
        }
        *available
    }

    /// Runs `work` on a fresh thread, tracked under `fire_instance_id` for
    /// later interruption. Returns `false` only when no slot is free or the
    /// pool has begun shutting down — callers should re-acquire a slot and
    /// retry in that case (spec §4.4 `runInThread`).
    ///
    /// `work` runs behind `catch_unwind`: a panicking job never leaks its
    /// slot or leaves a stale `executing` entry behind. If it panics,
    /// `on_panic` runs instead of whatever cleanup `work` would otherwise
    /// have performed on a normal return — callers use it to notify
    /// listeners and settle the store's bookkeeping for this execution.
    pub fn run_in_thread(
        &self,
        fire_instance_id: String,
        cancellation: CancellationToken,
        work: impl FnOnce() + Send + 'static,
        on_panic: impl FnOnce() + Send + 'static,
    ) -> bool {
        if self.shutdown.load(Ordering::Acquire) {
            return false;
        }
        {
            let mut available = self.slots.available.lock();
            if *available == 0 {
                return false;
            }
            *available -= 1;
        }

        let slots = Arc::clone(&self.slots);
        let executing = Arc::clone(&self.executing);
        let fid = fire_instance_id.clone();
        let thread_name = format!("{}-{}", self.name_prefix, fire_instance_id);

        // Register the execution before spawning: otherwise a fast job can
        // finish and remove itself from `executing` before we get a chance
        // to insert, leaving a stale entry behind forever.
        self.executing.lock().insert(
            fire_instance_id.clone(),
            ExecutionHandle { cancellation, handle: None },
        );

        let handle = thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(work));

                // Slot release and entry removal happen unconditionally — a
                // panicking job must not shrink the pool's effective thread
                // count.
                executing.lock().remove(&fid);
                let mut available = slots.available.lock();
                *available += 1;
                slots.condvar.notify_all();
                drop(available);

                if outcome.is_err() {
                    error!(fire_instance_id = %fid, "job panicked during execution");
                    on_panic();
                }
            })
            .expect("failed to spawn worker thread");

        if let Some(exec) = self.executing.lock().get_mut(&fire_instance_id) {
            exec.handle = Some(handle);
        }
        true
    }

    /// Requests cooperative cancellation of the execution identified by
    /// `fire_instance_id`. Returns `false` if no such execution is tracked.
    pub fn interrupt(&self, fire_instance_id: &str) -> bool {
        match self.executing.lock().get(fire_instance_id) {
            Some(exec) => {
                exec.cancellation.cancel();
                true
            }
            None => false,
        }
    }

    pub fn currently_executing_ids(&self) -> Vec<String> {
        self.executing.lock().keys().cloned().collect()
    }

    /// Stops accepting new work. If `wait_for_jobs_to_complete`, joins every
    /// still-running thread; otherwise requests cancellation of all of them
    /// and returns immediately (spec §4.4 `shutdown`).
    pub fn shutdown(&self, wait_for_jobs_to_complete: bool) {
        self.shutdown.store(true, Ordering::Release);
        self.slots.condvar.notify_all();

        if wait_for_jobs_to_complete {
            let handles: Vec<_> = {
                let mut executing = self.executing.lock();
                executing.values_mut().filter_map(|e| e.handle.take()).collect()
            };
            for handle in handles {
                let _ = handle.join();
            }
        } else {
            let executing = self.executing.lock();
            for exec in executing.values() {
                exec.cancellation.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn runs_work_and_frees_slot_on_completion() {
        let pool = WorkerPool::new(1, "test");
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        let started = pool.run_in_thread(
            "fid-1".to_string(),
            CancellationToken::new(),
            move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            },
            || {},
        );
        assert!(started);
        // Give the thread a moment; in production code the pool would be
        // driven by the scheduler thread's own wait loop instead of sleeping.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn refuses_work_once_shut_down() {
        let pool = WorkerPool::new(1, "test");
        pool.shutdown(true);
        let started = pool.run_in_thread("fid-2".to_string(), CancellationToken::new(), || {}, || {});
        assert!(!started);
    }

    #[test]
    fn interrupt_cancels_tracked_token() {
        let pool = WorkerPool::new(2, "test");
        let token = CancellationToken::new();
        let token_clone = token.clone();
        pool.run_in_thread(
            "fid-3".to_string(),
            token_clone,
            || {
                thread::sleep(Duration::from_millis(100));
            },
            || {},
        );
        assert!(pool.interrupt("fid-3"));
        assert!(token.is_cancelled());
        assert!(!pool.interrupt("unknown-fid"));
    }

    #[test]
    fn panicking_job_still_frees_its_slot_and_executing_entry() {
        let pool = WorkerPool::new(1, "test");
        let panicked = Arc::new(AtomicUsize::new(0));
        let panicked_clone = Arc::clone(&panicked);
        let started = pool.run_in_thread(
            "fid-4".to_string(),
            CancellationToken::new(),
            || panic!("boom"),
            move || {
                panicked_clone.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert!(started);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(panicked.load(Ordering::SeqCst), 1);
        assert!(pool.currently_executing_ids().is_empty());

        let recovered = pool.run_in_thread("fid-5".to_string(), CancellationToken::new(), || {}, || {});
        assert!(recovered, "slot must be available again after the panic");
    }
}
