/// Scheduling transitions reported to a [`Profiler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfilerEvent {
    /// A core entered the run loop with the given context uid.
    NewCore { uid: u32 },
    /// A core left the run loop.
    DeleteCore { uid: u32 },
    /// An executable was pushed onto the ready queue.
    ExecutableScheduled,
    /// An executable was popped from the ready queue.
    ExecutableUnscheduled,
    /// A popped executable was canceled instead of resumed.
    ExecutableCanceled,
}

/// Observer of executor transitions.
///
/// Implementations are called synchronously from the run loop and the
/// scheduling path, on any core. They must not block, and must not rely on
/// being called in a particular order across cores.
pub trait Profiler: Send + Sync {
    fn event(&self, event: ProfilerEvent);
}

/// Profiler that ignores every event. This is the default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProfiler;

impl Profiler for NoopProfiler {
    fn event(&self, _event: ProfilerEvent) {}
}

/// Profiler forwarding every event to `tracing` at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProfiler;

impl Profiler for TracingProfiler {
    fn event(&self, event: ProfilerEvent) {
        tracing::trace!(?event, "executor event");
    }
}
