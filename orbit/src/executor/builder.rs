use super::Executor;
use super::profiler::{NoopProfiler, Profiler};

use std::sync::Arc;

/// Builder for configuring and creating an [`Executor`].
///
/// # Examples
///
/// ```rust,ignore
/// let executor = ExecutorBuilder::new()
///     .profiler(TracingProfiler)
///     .min_iterations(16)
///     .build();
/// ```
pub struct ExecutorBuilder {
    /// Observer of scheduling transitions.
    profiler: Arc<dyn Profiler>,

    /// Loop iterations a draining run performs before it may return.
    min_iterations: u64,
}

impl ExecutorBuilder {
    /// Creates a builder with a no-op profiler and no minimum iteration count.
    pub fn new() -> Self {
        Self {
            profiler: Arc::new(NoopProfiler),
            min_iterations: 0,
        }
    }

    /// Injects the profiler notified of scheduling transitions.
    pub fn profiler(self, profiler: impl Profiler + 'static) -> Self {
        self.shared_profiler(Arc::new(profiler))
    }

    /// Injects a profiler shared with the caller.
    ///
    /// Useful when the caller wants to inspect the profiler afterwards.
    pub fn shared_profiler(mut self, profiler: Arc<dyn Profiler>) -> Self {
        self.profiler = profiler;
        self
    }

    /// Keeps [`Executor::run`] looping for at least `n` iterations, even when
    /// no workload is pending.
    ///
    /// Services admitted with [`Executor::enqueue_service`] get that many
    /// chances to run before a draining run returns.
    pub fn min_iterations(mut self, n: u64) -> Self {
        self.min_iterations = n;
        self
    }

    pub fn build(self) -> Executor {
        Executor::with_config(self.profiler, self.min_iterations)
    }
}

impl Default for ExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
