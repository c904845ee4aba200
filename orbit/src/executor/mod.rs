//! Scheduling loop.
//!
//! An [`Executor`] owns a lock-free ready queue of executables. Any number
//! of cores may run its loop concurrently: each one pops the next ready
//! executable, resumes it (or finalizes it if its cancellation token fired)
//! until it suspends or completes, then schedules whatever continuation the
//! executable left in the core's [`ExecutorContext`](context::ExecutorContext).
//!
//! - [`ExecutorBuilder`]: configuration (profiler, minimum iterations)
//! - [`MultiCoreExecutor`]: binds one executor to several [`Core`](crate::platform::Core)s
//! - [`Profiler`]: optional observer of scheduling transitions

mod builder;
pub(crate) mod context;
mod multicore;
mod profiler;

pub use builder::ExecutorBuilder;
pub use multicore::MultiCoreExecutor;
pub use profiler::{NoopProfiler, Profiler, ProfilerEvent, TracingProfiler};

use crate::cancellation::CancellationToken;
use crate::coroutine::Async;
use crate::executable::{Executable, Header, schedule};
use crate::platform::CoreId;
use crate::threadsafe::{NonOwningQueue, NonOwningRingSpin, RingElement, RingLink};
use context::{Callback, Continuation, ExecutorContext, OnTerminate};

use std::hint;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;

/// How an admitted executable relates to the lifetime of a draining run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutableKind {
    /// [`Executor::run`] does not return before it completes.
    Workload,
    /// Runs alongside workloads without keeping the executor alive.
    Service,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    /// Return once no workload is pending.
    Drain,
    /// Return only once a stop is requested.
    UntilStopped,
}

/// Registration of a running loop in the executor's context ring.
struct ContextEntry {
    uid: u32,
    tick: AtomicU64,
    link: RingLink<ContextEntry>,
}

unsafe impl RingElement for ContextEntry {
    fn ring_link(&self) -> &RingLink<Self> {
        &self.link
    }
}

/// Number of admitted workloads that have not terminated yet.
struct Workloads {
    pending: AtomicUsize,
}

impl OnTerminate for Workloads {
    fn on_terminate(&self, _slot: usize, canceled: bool) -> Option<Arc<dyn Executable>> {
        let remaining = self.pending.fetch_sub(1, Ordering::AcqRel) - 1;
        tracing::trace!(remaining, canceled, "workload terminated");
        None
    }
}

pub(crate) struct Shared {
    queue: NonOwningQueue<'static, Header>,
    contexts: NonOwningRingSpin<'static, ContextEntry>,
    workloads: Arc<Workloads>,
    stop_requested: AtomicBool,
    max_running: AtomicUsize,
    min_iterations: u64,
    profiler: Arc<dyn Profiler>,
}

impl Shared {
    /// Links a `QUEUED` executable into the ready queue.
    fn push(&self, executable: Arc<dyn Executable>) {
        let header: *const Header = executable.header();

        // Safety: the header lives inside the executable's allocation, which
        // the queue keeps alive through `park` until the header is popped.
        let header: &'static Header = unsafe { &*header };

        header.park(executable);
        self.queue.push_front(header);
        self.profiler.event(ProfilerEvent::ExecutableScheduled);
    }

    fn pop(&self) -> Option<Arc<dyn Executable>> {
        let header = self.queue.pop_back()?;

        // Safety: the header was just popped by this thread.
        let executable = unsafe { header.unpark() };
        self.profiler.event(ProfilerEvent::ExecutableUnscheduled);

        executable
    }

    fn run(&self, mode: RunMode) {
        let mut context = ExecutorContext::new();
        let entry = ContextEntry {
            uid: context.uid(),
            tick: AtomicU64::new(0),
            link: RingLink::new(),
        };
        let registration = Registration::new(self, &entry);

        tracing::debug!(uid = context.uid(), ?mode, "entering run loop");

        loop {
            if self.stop_requested.load(Ordering::Acquire) {
                break;
            }

            if mode == RunMode::Drain
                && context.tick() >= self.min_iterations
                && self.workloads.pending.load(Ordering::Acquire) == 0
            {
                break;
            }

            match self.pop() {
                Some(executable) => self.execute(executable, &mut context),
                None => {
                    hint::spin_loop();
                    thread::yield_now();
                }
            }

            context.advance();
            entry.tick.store(context.tick(), Ordering::Relaxed);
        }

        tracing::debug!(uid = context.uid(), tick = context.tick(), "leaving run loop");
        drop(registration);
    }

    fn execute(&self, executable: Arc<dyn Executable>, context: &mut ExecutorContext) {
        if executable.header().is_canceled() {
            self.profiler.event(ProfilerEvent::ExecutableCanceled);
            tracing::trace!(uid = context.uid(), "canceling executable");
            executable.cancel(context);
        } else {
            executable.resume(context);
        }

        if let Some(next) = context.pop_continuation() {
            schedule(next);
        }
    }

    /// Releases every queued executable without running it.
    fn drain(&self) -> usize {
        let mut released = 0;
        while let Some(executable) = self.pop() {
            executable.release();
            released += 1;
        }
        released
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.drain();
    }
}

/// Keeps a run loop's entry linked in the context ring.
struct Registration<'a> {
    shared: &'a Shared,
    entry: &'a ContextEntry,
}

impl<'a> Registration<'a> {
    fn new(shared: &'a Shared, entry: &'a ContextEntry) -> Self {
        // Safety: the registration borrows the entry and unlinks it on drop,
        // so the ring never observes a dangling entry.
        let linked: &'static ContextEntry = unsafe { &*(entry as *const ContextEntry) };
        shared.contexts.push_back(linked);

        shared
            .max_running
            .fetch_max(shared.contexts.len(), Ordering::Relaxed);
        shared
            .profiler
            .event(ProfilerEvent::NewCore { uid: entry.uid });

        Self { shared, entry }
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let entry = self.entry;
        self.shared
            .contexts
            .pop_front_if(|candidate| ptr::eq(candidate, entry));
        self.shared
            .profiler
            .event(ProfilerEvent::DeleteCore { uid: entry.uid });
    }
}

/// Handle to a shared ready queue and its run loop.
///
/// Cloning the handle shares the executor.
///
/// # Examples
///
/// ```rust,ignore
/// let executor = Executor::new();
/// let task = Async::<u32>::new(async { Ok(42) });
///
/// executor.enqueue(&task);
/// executor.run();
/// ```
#[derive(Clone)]
pub struct Executor {
    shared: Arc<Shared>,
}

/// Non-owning reference held by frames, so queued frames do not keep their
/// executor alive.
#[derive(Clone)]
pub(crate) struct WeakExecutor(Weak<Shared>);

impl WeakExecutor {
    pub(crate) fn upgrade(&self) -> Option<Executor> {
        self.0.upgrade().map(|shared| Executor { shared })
    }
}

impl Executor {
    /// Creates an executor with the default configuration.
    pub fn new() -> Self {
        ExecutorBuilder::new().build()
    }

    pub fn builder() -> ExecutorBuilder {
        ExecutorBuilder::new()
    }

    pub(crate) fn with_config(profiler: Arc<dyn Profiler>, min_iterations: u64) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: NonOwningQueue::new(),
                contexts: NonOwningRingSpin::new(),
                workloads: Arc::new(Workloads {
                    pending: AtomicUsize::new(0),
                }),
                stop_requested: AtomicBool::new(false),
                max_running: AtomicUsize::new(0),
                min_iterations,
                profiler,
            }),
        }
    }

    /// Admits a top-level invocation as a workload.
    ///
    /// The invocation gets its own cancellation token unless one was
    /// installed with [`Async::set_cancellation_token`].
    pub fn enqueue<V, E>(&self, task: &Async<V, E>)
    where
        V: Send + 'static,
        E: Send + 'static,
    {
        self.admit(task.executable(), ExecutableKind::Workload);
    }

    /// Admits a top-level invocation as a service.
    pub fn enqueue_service<V, E>(&self, task: &Async<V, E>)
    where
        V: Send + 'static,
        E: Send + 'static,
    {
        self.admit(task.executable(), ExecutableKind::Service);
    }

    fn admit(&self, executable: Arc<dyn Executable>, kind: ExecutableKind) {
        let header = executable.header();
        header.bind_executor(self.downgrade());
        header.ensure_token(CancellationToken::new);

        if kind == ExecutableKind::Workload {
            let workloads = &self.shared.workloads;
            workloads.pending.fetch_add(1, Ordering::AcqRel);

            let callback = Continuation::Callback(Callback::new(workloads.clone(), 0));
            if header.set_continuation(callback).is_err() {
                workloads.pending.fetch_sub(1, Ordering::AcqRel);
                return;
            }
        }

        schedule(executable);
    }

    /// Runs the loop on the calling thread until every workload terminated.
    ///
    /// Also returns early when a stop is requested.
    pub fn run(&self) {
        self.shared.run(RunMode::Drain);
    }

    /// Runs the loop on the calling thread until a stop is requested.
    pub fn run_until_stopped(&self) {
        self.shared.run(RunMode::UntilStopped);
    }

    pub(crate) fn run_core(&self, core: CoreId) {
        tracing::debug!(%core, "core workload started");
        self.run_until_stopped();
        tracing::debug!(%core, "core workload returned");
    }

    /// Asks every run loop to return at its next iteration.
    pub fn request_stop(&self) {
        self.shared.stop_requested.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.shared.stop_requested.load(Ordering::Acquire)
    }

    pub(crate) fn clear_stop(&self) {
        self.shared.stop_requested.store(false, Ordering::Release);
    }

    /// Releases every still-queued executable without running it.
    ///
    /// Must only be called while no core runs the loop.
    pub fn shutdown(&self) {
        let released = self.shared.drain();
        tracing::debug!(released, "executor shut down");
    }

    /// Approximate number of ready executables.
    pub fn queue_count(&self) -> usize {
        self.shared.queue.len()
    }

    /// Number of admitted workloads that have not terminated yet.
    pub fn workload_count(&self) -> usize {
        self.shared.workloads.pending.load(Ordering::Acquire)
    }

    /// Number of cores currently inside a run loop.
    pub fn running_count(&self) -> usize {
        self.shared.contexts.len()
    }

    /// Highest number of cores ever observed inside a run loop at once.
    pub fn max_running_count(&self) -> usize {
        self.shared.max_running.load(Ordering::Relaxed)
    }

    /// Sum of the iterations performed by the loops currently running.
    pub fn running_ticks(&self) -> u64 {
        let mut ticks = 0;
        self.shared
            .contexts
            .for_each(|entry| ticks += entry.tick.load(Ordering::Relaxed));
        ticks
    }

    pub(crate) fn push(&self, executable: Arc<dyn Executable>) {
        self.shared.push(executable);
    }

    pub(crate) fn downgrade(&self) -> WeakExecutor {
        WeakExecutor(Arc::downgrade(&self.shared))
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}
