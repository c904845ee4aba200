use crate::executable::{Executable, schedule};

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_UID: AtomicU32 = AtomicU32::new(1);

/// Receives the termination of an executable registered through a
/// [`Callback`] continuation.
pub(crate) trait OnTerminate: Send + Sync {
    /// Called once per registration when the executable completes.
    ///
    /// `slot` is the value given at registration, and `canceled` tells
    /// whether the executable completed through cancellation. The returned
    /// executable, if any, is scheduled next.
    fn on_terminate(&self, slot: usize, canceled: bool) -> Option<Arc<dyn Executable>>;
}

/// Lazily evaluated continuation.
pub(crate) struct Callback {
    handler: Arc<dyn OnTerminate>,
    slot: usize,
    canceled: bool,
}

impl Callback {
    pub(crate) fn new(handler: Arc<dyn OnTerminate>, slot: usize) -> Self {
        Self {
            handler,
            slot,
            canceled: false,
        }
    }

    fn call(self) -> Option<Arc<dyn Executable>> {
        self.handler.on_terminate(self.slot, self.canceled)
    }
}

/// Who to resume once an executable terminates.
pub(crate) enum Continuation {
    Executable(Arc<dyn Executable>),
    Callback(Callback),
}

impl Continuation {
    /// Records the termination outcome on callback continuations.
    pub(crate) fn with_outcome(mut self, canceled: bool) -> Self {
        if let Continuation::Callback(callback) = &mut self {
            callback.canceled = canceled;
        }
        self
    }

    /// Resolves the continuation into the executable it names, if any.
    pub(crate) fn resolve(self) -> Option<Arc<dyn Executable>> {
        match self {
            Continuation::Executable(executable) => Some(executable),
            Continuation::Callback(callback) => callback.call(),
        }
    }
}

/// Per-core bookkeeping of the run loop.
///
/// Holds at most one continuation: what the run loop schedules once the
/// executable it just resumed returns control.
pub(crate) struct ExecutorContext {
    uid: u32,
    tick: u64,
    continuation: Option<Continuation>,
}

impl ExecutorContext {
    pub(crate) fn new() -> Self {
        Self {
            uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
            tick: 0,
            continuation: None,
        }
    }

    pub(crate) fn uid(&self) -> u32 {
        self.uid
    }

    pub(crate) fn tick(&self) -> u64 {
        self.tick
    }

    pub(crate) fn advance(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    /// # Panics
    ///
    /// Panics if a continuation is already pending.
    pub(crate) fn set_continuation(&mut self, continuation: Continuation) {
        assert!(
            self.continuation.is_none(),
            "executor context already holds a continuation"
        );
        self.continuation = Some(continuation);
    }

    pub(crate) fn has_continuation(&self) -> bool {
        self.continuation.is_some()
    }

    /// Hands `continuation` to the run loop, or schedules it right away if
    /// the single slot is taken.
    pub(crate) fn defer(&mut self, continuation: Continuation) {
        if self.has_continuation() {
            if let Some(executable) = continuation.resolve() {
                schedule(executable);
            }
        } else {
            self.set_continuation(continuation);
        }
    }

    /// Schedules `executable` once the current one yields control.
    pub(crate) fn then_enqueue_executable(&mut self, executable: Arc<dyn Executable>) {
        self.defer(Continuation::Executable(executable));
    }

    /// Takes the pending continuation, invoking it if it is a callback.
    pub(crate) fn pop_continuation(&mut self) -> Option<Arc<dyn Executable>> {
        self.continuation.take().and_then(Continuation::resolve)
    }
}
