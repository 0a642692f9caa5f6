//! String identifier → job factory registry.
//!
//! Replaces SPI class-by-name loading (spec §9 Design Notes): the embedding
//! application registers a factory for each `job_class` identifier it uses
//! before calling `Facade::start`.

use std::sync::Arc;

use dashmap::DashMap;

use crate::job::Job;

type Factory = Arc<dyn Fn() -> Box<dyn Job> + Send + Sync>;

/// Maps a `JobDetail::job_class` string to a factory that builds a fresh
/// [`Job`] instance for each fire.
#[derive(Default)]
pub struct JobRegistry {
    factories: DashMap<String, Factory>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `job_class`. Replaces any existing factory
    /// registered under the same name.
    pub fn register<F>(&self, job_class: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Job> + Send + Sync + 'static,
    {
        self.factories.insert(job_class.into(), Arc::new(factory));
    }

    /// Build a fresh job instance, or `None` if `job_class` was never
    /// registered.
    pub fn build(&self, job_class: &str) -> Option<Box<dyn Job>> {
        self.factories.get(job_class).map(|f| (f.value())())
    }

    pub fn is_registered(&self, job_class: &str) -> bool {
        self.factories.contains_key(job_class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobExecutionError;
    use crate::job::JobExecutionContext;

    struct Noop;
    impl Job for Noop {
        fn execute(&self, _ctx: &mut JobExecutionContext) -> Result<(), JobExecutionError> {
            Ok(())
        }
    }

    #[test]
    fn unregistered_class_returns_none() {
        let registry = JobRegistry::new();
        assert!(registry.build("nope").is_none());
        assert!(!registry.is_registered("nope"));
    }

    #[test]
    fn registered_class_builds_fresh_instance_each_time() {
        let registry = JobRegistry::new();
        registry.register("demo.Noop", || Box::new(Noop));
        assert!(registry.is_registered("demo.Noop"));
        assert!(registry.build("demo.Noop").is_some());
        assert!(registry.build("demo.Noop").is_some());
    }

    #[test]
    fn re_registering_replaces_factory() {
        let registry = JobRegistry::new();
        registry.register("x", || Box::new(Noop));
        registry.register("x", || Box::new(Noop));
        assert!(registry.build("x").is_some());
    }
}
