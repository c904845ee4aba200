use super::Executor;
use crate::error::CoreError;
use crate::platform::{Core, CoreId, StackSize, ThreadCore, Workload};

use std::array;
use std::sync::Arc;

/// Binds one [`Executor`] to a fixed set of cores.
///
/// Once started, every core runs the executor's loop, so all of them drain
/// the same ready queue concurrently.
///
/// # Examples
///
/// ```rust,ignore
/// let executor = Executor::new();
/// let cores = MultiCoreExecutor::<4>::with_threads(executor.clone());
///
/// cores.start()?;
/// executor.enqueue(&task);
/// // ...
/// cores.stop()?;
/// ```
pub struct MultiCoreExecutor<const N: usize> {
    executor: Executor,
    cores: [Box<dyn Core>; N],
}

impl<const N: usize> MultiCoreExecutor<N> {
    /// # Panics
    ///
    /// Panics if `N == 0`.
    pub fn new(executor: Executor, cores: [Box<dyn Core>; N]) -> Self {
        assert!(N > 0, "a multi-core executor needs at least one core");

        Self { executor, cores }
    }

    /// Builds `N` [`ThreadCore`]s with default settings.
    pub fn with_threads(executor: Executor) -> Self {
        let cores = array::from_fn(|index| {
            Box::new(ThreadCore::new(CoreId(index as u32))) as Box<dyn Core>
        });

        Self::new(executor, cores)
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Starts the executor's loop on every core.
    ///
    /// Stops at the first core that fails to start and returns its error.
    /// Cores started before it keep running until [`stop`](Self::stop).
    pub fn start(&self) -> Result<(), CoreError> {
        self.executor.clear_stop();

        let executor = self.executor.clone();
        let workload: Workload = Arc::new(move |core: CoreId| executor.run_core(core));

        for core in &self.cores {
            core.start(workload.clone())?;
            tracing::debug!(core = %core.id(), "core started");
        }

        Ok(())
    }

    /// Stops every core, blocking until each workload returned.
    ///
    /// Every core is asked to stop even if an earlier one failed; the first
    /// failure is returned.
    pub fn stop(&self) -> Result<(), CoreError> {
        self.executor.request_stop();

        let mut failure = None;
        for core in &self.cores {
            match core.stop() {
                Ok(()) => tracing::debug!(core = %core.id(), "core stopped"),
                Err(error) => {
                    tracing::warn!(core = %core.id(), %error, "core failed to stop");
                    failure.get_or_insert(error);
                }
            }
        }

        self.executor.clear_stop();

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Stack usage reported by each core.
    pub fn stack_usage(&self) -> [StackSize; N] {
        array::from_fn(|index| self.cores[index].stack_usage())
    }
}
