//! Listener registries and matcher-scoped delivery (spec §4.5), grounded on
//! the teacher's event bus (`EventType::matches`, insertion-ordered
//! subscriber lists) generalized from a flat enum filter to the matcher
//! combinator algebra.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::error::JobExecutionError;
use crate::job::JobExecutionContext;
use crate::key::Key;
use crate::matcher::Matcher;

pub trait JobListener: Send + Sync {
    fn name(&self) -> &str;
    fn job_to_be_executed(&self, _ctx: &JobExecutionContext) {}
    fn job_execution_vetoed(&self, _ctx: &JobExecutionContext) {}
    fn job_was_executed(&self, _ctx: &JobExecutionContext, _error: Option<&JobExecutionError>) {}
}

pub trait TriggerListener: Send + Sync {
    fn name(&self) -> &str;
    fn trigger_fired(&self, _ctx: &JobExecutionContext) {}
    /// Return `true` to veto the job execution this trigger fire would
    /// otherwise start.
    fn vetoes_execution(&self, _ctx: &JobExecutionContext) -> bool {
        false
    }
    fn trigger_misfired(&self, _trigger_key: &Key) {}
    fn trigger_complete(&self, _ctx: &JobExecutionContext) {}
}

pub trait SchedulerListener: Send + Sync {
    fn scheduler_starting(&self) {}
    fn scheduler_started(&self) {}
    fn scheduler_in_standby_mode(&self) {}
    fn scheduler_shutting_down(&self) {}
    fn scheduler_shutdown(&self) {}
    fn scheduling_data_cleared(&self) {}
    fn job_added(&self, _job_key: &Key) {}
    fn job_deleted(&self, _job_key: &Key) {}
    fn trigger_paused(&self, _trigger_key: &Key) {}
    fn trigger_resumed(&self, _trigger_key: &Key) {}
    fn job_paused(&self, _job_key: &Key) {}
    fn job_resumed(&self, _job_key: &Key) {}
    fn scheduler_error(&self, _message: &str) {}
}

struct Registered<T: ?Sized> {
    listener: Arc<T>,
    matchers: Vec<Matcher>,
}

impl<T: ?Sized> Registered<T> {
    /// No matchers means "receives every event"; otherwise at least one must
    /// match (spec §4.5).
    fn accepts(&self, key: &Key) -> bool {
        self.matchers.is_empty() || self.matchers.iter().any(|m| m.is_match(key))
    }
}

/// Insertion-ordered listener registries plus matcher-scoped, panic-isolated
/// delivery (spec §4.5's event-to-hook table).
#[derive(Default)]
pub struct ListenerManager {
    job_listeners: Mutex<Vec<Registered<dyn JobListener>>>,
    trigger_listeners: Mutex<Vec<Registered<dyn TriggerListener>>>,
    scheduler_listeners: Mutex<Vec<Arc<dyn SchedulerListener>>>,
}

impl ListenerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_job_listener(&self, listener: Arc<dyn JobListener>, matchers: Vec<Matcher>) {
        self.job_listeners.lock().push(Registered { listener, matchers });
    }

    pub fn add_trigger_listener(&self, listener: Arc<dyn TriggerListener>, matchers: Vec<Matcher>) {
        self.trigger_listeners.lock().push(Registered { listener, matchers });
    }

    pub fn add_scheduler_listener(&self, listener: Arc<dyn SchedulerListener>) {
        self.scheduler_listeners.lock().push(listener);
    }

    /// Listeners in insertion order (spec §8 scenario 2).
    pub fn job_listener_names(&self) -> Vec<String> {
        self.job_listeners.lock().iter().map(|r| r.listener.name().to_string()).collect()
    }

    pub fn trigger_listener_names(&self) -> Vec<String> {
        self.trigger_listeners.lock().iter().map(|r| r.listener.name().to_string()).collect()
    }

    fn deliver<T: ?Sized>(name: &str, f: impl FnOnce()) {
        let result = panic::catch_unwind(AssertUnwindSafe(f));
        if result.is_err() {
            warn!(listener = name, "listener callback panicked; delivery continues to remaining listeners");
        }
    }

    /// Delivers `triggerFired`; returns `true` if any trigger listener
    /// vetoed execution (in which case the caller must call
    /// [`ListenerManager::notify_trigger_misfired`]-equivalent `triggerMisfired`
    /// itself, per spec §4.5, and must not deliver `JobListener` hooks).
    pub fn notify_trigger_fired(&self, ctx: &JobExecutionContext) -> bool {
        let mut vetoed = false;
        for registered in self.trigger_listeners.lock().iter() {
            if !registered.accepts(&ctx.trigger_key) {
                continue;
            }
            let name = registered.listener.name().to_string();
            let listener = Arc::clone(&registered.listener);
            Self::deliver::<dyn TriggerListener>(&name, || listener.trigger_fired(ctx));
            if listener.vetoes_execution(ctx) {
                vetoed = true;
            }
        }
        vetoed
    }

    pub fn notify_trigger_misfired(&self, trigger_key: &Key) {
        for registered in self.trigger_listeners.lock().iter() {
            if !registered.accepts(trigger_key) {
                continue;
            }
            let name = registered.listener.name().to_string();
            let listener = Arc::clone(&registered.listener);
            Self::deliver::<dyn TriggerListener>(&name, || listener.trigger_misfired(trigger_key));
        }
    }

    pub fn notify_job_to_be_executed(&self, ctx: &JobExecutionContext) {
        for registered in self.job_listeners.lock().iter() {
            if !registered.accepts(&ctx.job_key) {
                continue;
            }
            let name = registered.listener.name().to_string();
            let listener = Arc::clone(&registered.listener);
            Self::deliver::<dyn JobListener>(&name, || listener.job_to_be_executed(ctx));
        }
    }

    pub fn notify_job_was_executed(&self, ctx: &JobExecutionContext, error: Option<&JobExecutionError>) {
        for registered in self.job_listeners.lock().iter() {
            if !registered.accepts(&ctx.job_key) {
                continue;
            }
            let name = registered.listener.name().to_string();
            let listener = Arc::clone(&registered.listener);
            Self::deliver::<dyn JobListener>(&name, || listener.job_was_executed(ctx, error));
        }
        for registered in self.trigger_listeners.lock().iter() {
            if !registered.accepts(&ctx.trigger_key) {
                continue;
            }
            let name = registered.listener.name().to_string();
            let listener = Arc::clone(&registered.listener);
            Self::deliver::<dyn TriggerListener>(&name, || listener.trigger_complete(ctx));
        }
    }

    fn notify_scheduler(&self, f: impl Fn(&dyn SchedulerListener)) {
        for listener in self.scheduler_listeners.lock().iter() {
            let listener = Arc::clone(listener);
            panic::catch_unwind(AssertUnwindSafe(|| f(listener.as_ref()))).unwrap_or_else(|_| {
                warn!("scheduler listener callback panicked; delivery continues");
            });
        }
    }

    pub fn notify_scheduler_starting(&self) {
        self.notify_scheduler(|l| l.scheduler_starting());
    }
    pub fn notify_scheduler_started(&self) {
        self.notify_scheduler(|l| l.scheduler_started());
    }
    pub fn notify_scheduler_in_standby_mode(&self) {
        self.notify_scheduler(|l| l.scheduler_in_standby_mode());
    }
    pub fn notify_scheduler_shutting_down(&self) {
        self.notify_scheduler(|l| l.scheduler_shutting_down());
    }
    pub fn notify_scheduler_shutdown(&self) {
        self.notify_scheduler(|l| l.scheduler_shutdown());
    }
    pub fn notify_scheduling_data_cleared(&self) {
        self.notify_scheduler(|l| l.scheduling_data_cleared());
    }
    pub fn notify_job_added(&self, job_key: &Key) {
        self.notify_scheduler(|l| l.job_added(job_key));
    }
    pub fn notify_job_deleted(&self, job_key: &Key) {
        self.notify_scheduler(|l| l.job_deleted(job_key));
    }
    pub fn notify_trigger_paused(&self, trigger_key: &Key) {
        self.notify_scheduler(|l| l.trigger_paused(trigger_key));
    }
    pub fn notify_trigger_resumed(&self, trigger_key: &Key) {
        self.notify_scheduler(|l| l.trigger_resumed(trigger_key));
    }
    pub fn notify_job_paused(&self, job_key: &Key) {
        self.notify_scheduler(|l| l.job_paused(job_key));
    }
    pub fn notify_job_resumed(&self, job_key: &Key) {
        self.notify_scheduler(|l| l.job_resumed(job_key));
    }
    pub fn notify_scheduler_error(&self, message: &str) {
        self.notify_scheduler(|l| l.scheduler_error(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSchedulerListener {
        starting: AtomicUsize,
        started: AtomicUsize,
    }

    impl SchedulerListener for CountingSchedulerListener {
        fn scheduler_starting(&self) {
            self.starting.fetch_add(1, Ordering::SeqCst);
        }
        fn scheduler_started(&self) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn starting_is_observed_before_started() {
        let manager = ListenerManager::new();
        let listener = Arc::new(CountingSchedulerListener {
            starting: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
        });
        manager.add_scheduler_listener(listener.clone());

        manager.notify_scheduler_starting();
        assert_eq!(listener.starting.load(Ordering::SeqCst), 1);
        assert_eq!(listener.started.load(Ordering::SeqCst), 0);

        manager.notify_scheduler_started();
        assert_eq!(listener.started.load(Ordering::SeqCst), 1);
    }

    struct NamedJobListener(String);
    impl JobListener for NamedJobListener {
        fn name(&self) -> &str {
            &self.0
        }
    }

    #[test]
    fn job_listeners_report_in_insertion_order() {
        let manager = ListenerManager::new();
        for i in 0..15 {
            manager.add_job_listener(Arc::new(NamedJobListener(format!("listener-{i}"))), Vec::new());
        }
        let names = manager.job_listener_names();
        let expected: Vec<String> = (0..15).map(|i| format!("listener-{i}")).collect();
        assert_eq!(names, expected);
    }
}
