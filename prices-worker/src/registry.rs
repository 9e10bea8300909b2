//! Task name → executor lookup used by the worker pool

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use prices_common::TaskOutcome;

/// A named unit of work the worker pool can run.
///
/// Implementations report every failure through the returned outcome; the
/// pool additionally turns panics into failure outcomes.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, args: &[String]) -> TaskOutcome;
}

#[derive(Default, Clone)]
pub struct TaskRegistry {
    executors: HashMap<String, Arc<dyn TaskExecutor>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor, replacing any previous one under `name`
    pub fn register(&mut self, name: impl Into<String>, executor: Arc<dyn TaskExecutor>) {
        self.executors.insert(name.into(), executor);
    }

    pub fn with(mut self, name: impl Into<String>, executor: Arc<dyn TaskExecutor>) -> Self {
        self.register(name, executor);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskExecutor>> {
        self.executors.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.executors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.names())
            .finish()
    }
}
