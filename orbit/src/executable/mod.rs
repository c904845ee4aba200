//! Schedulable units of work.
//!
//! An [`Executable`] is anything the executor can resume or cancel. Every
//! executable embeds a [`Header`] holding the scheduling state machine, the
//! intrusive queue link, the single continuation slot and the execution
//! binding (executor and cancellation token) inherited from its caller.

pub(crate) mod state;

use crate::cancellation::CancellationToken;
use crate::executor::context::{Continuation, ExecutorContext};
use crate::executor::WeakExecutor;
use crate::threadsafe::{QueueElement, QueueLink};
use state::{COMPLETED, CREATED, NOTIFIED, QUEUED, RUNNING, SUSPENDED};

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// A unit of work that can be scheduled onto an executor.
pub(crate) trait Executable: Send + Sync + 'static {
    fn header(&self) -> &Header;

    /// Runs the executable until its next suspension point or completion.
    fn resume(self: Arc<Self>, context: &mut ExecutorContext);

    /// Finalizes the executable as canceled without running user code.
    fn cancel(self: Arc<Self>, context: &mut ExecutorContext);

    /// Drops user state and the continuation without notifying anyone.
    ///
    /// Used when an executor shuts down with work still queued.
    fn release(&self);
}

#[derive(Default)]
struct Binding {
    executor: Option<WeakExecutor>,
    token: Option<CancellationToken>,
}

/// Scheduling state shared by every executable.
pub(crate) struct Header {
    link: QueueLink<Header>,

    /// Strong reference owned by the ready queue while linked.
    parked: UnsafeCell<Option<Arc<dyn Executable>>>,
    queued: AtomicBool,

    state: AtomicU8,
    cancel_requested: AtomicBool,
    canceled: AtomicBool,
    stepped: AtomicBool,

    continuation: Mutex<Option<Continuation>>,
    binding: Mutex<Binding>,
}

// Safety: `parked` is written only by the thread that won the `queued` flag
// and read only by the consumer that popped the header from the queue.
unsafe impl Send for Header {}
unsafe impl Sync for Header {}

unsafe impl QueueElement for Header {
    fn queue_link(&self) -> &QueueLink<Self> {
        &self.link
    }
}

impl Header {
    pub(crate) fn new() -> Self {
        Self {
            link: QueueLink::new(),
            parked: UnsafeCell::new(None),
            queued: AtomicBool::new(false),
            state: AtomicU8::new(CREATED),
            cancel_requested: AtomicBool::new(false),
            canceled: AtomicBool::new(false),
            stepped: AtomicBool::new(false),
            continuation: Mutex::new(None),
            binding: Mutex::new(Binding::default()),
        }
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.state.load(Ordering::Acquire) == COMPLETED
    }

    /// Returns `true` once the executable completed through cancellation.
    pub(crate) fn completed_canceled(&self) -> bool {
        self.is_completed() && self.canceled.load(Ordering::Acquire)
    }

    /// Returns `true` if the executable must be canceled instead of resumed.
    pub(crate) fn is_canceled(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
            || self
                .binding
                .lock()
                .unwrap()
                .token
                .as_ref()
                .is_some_and(CancellationToken::is_canceled)
    }

    pub(crate) fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::Release);
    }

    pub(crate) fn take_cancel_request(&self) -> bool {
        self.cancel_requested.swap(false, Ordering::AcqRel)
    }

    /// Flags that the current poll produced a generator item.
    pub(crate) fn mark_step(&self) {
        self.stepped.store(true, Ordering::Release);
    }

    pub(crate) fn take_step(&self) -> bool {
        self.stepped.swap(false, Ordering::AcqRel)
    }

    /// Binds the executable to `executor` unless it already has one.
    pub(crate) fn bind_executor(&self, executor: WeakExecutor) {
        let mut binding = self.binding.lock().unwrap();
        if binding.executor.is_none() {
            binding.executor = Some(executor);
        }
    }

    pub(crate) fn executor(&self) -> Option<WeakExecutor> {
        self.binding.lock().unwrap().executor.clone()
    }

    pub(crate) fn token(&self) -> Option<CancellationToken> {
        self.binding.lock().unwrap().token.clone()
    }

    /// Installs the cancellation token.
    ///
    /// # Panics
    ///
    /// Panics if a token is already installed.
    pub(crate) fn set_token(&self, token: CancellationToken) {
        let mut binding = self.binding.lock().unwrap();
        assert!(
            binding.token.is_none(),
            "executable already has a cancellation token"
        );
        binding.token = Some(token);
    }

    /// Installs `token` only if none is present.
    pub(crate) fn ensure_token(&self, token: impl FnOnce() -> CancellationToken) {
        let mut binding = self.binding.lock().unwrap();
        if binding.token.is_none() {
            binding.token = Some(token());
        }
    }

    /// Inherits the executor and the cancellation token from `caller`.
    ///
    /// The executor is always taken from the caller; an explicitly installed
    /// token is kept.
    pub(crate) fn propagate_from(&self, caller: &Header) {
        let (executor, token) = {
            let binding = caller.binding.lock().unwrap();
            (binding.executor.clone(), binding.token.clone())
        };

        let mut binding = self.binding.lock().unwrap();
        if executor.is_some() {
            binding.executor = executor;
        }
        if binding.token.is_none() {
            binding.token = token;
        }
    }

    /// Records who to notify once this executable completes.
    ///
    /// Returns the continuation back if the executable already completed.
    ///
    /// # Panics
    ///
    /// Panics if a continuation is already pending.
    pub(crate) fn set_continuation(&self, continuation: Continuation) -> Result<(), Continuation> {
        let mut slot = self.continuation.lock().unwrap();

        // Completion publishes its state before taking the slot, so either
        // we observe COMPLETED here or it observes our continuation.
        if self.is_completed() {
            return Err(continuation);
        }

        assert!(
            slot.is_none(),
            "executable already has a pending continuation"
        );
        *slot = Some(continuation);

        Ok(())
    }

    pub(crate) fn take_continuation(&self) -> Option<Continuation> {
        self.continuation.lock().unwrap().take()
    }

    /// Moves `QUEUED` to `RUNNING`, granting exclusive access to user state.
    pub(crate) fn claim(&self) -> bool {
        self.state
            .compare_exchange(QUEUED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Parks a running executable.
    ///
    /// Returns `false` if it was notified meanwhile; the caller then owns a
    /// `QUEUED` executable and must push it back onto the ready queue.
    pub(crate) fn suspend(&self) -> bool {
        if self
            .state
            .compare_exchange(RUNNING, SUSPENDED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return true;
        }

        self.state.store(QUEUED, Ordering::Release);
        false
    }

    /// Marks the executable completed and hands its continuation to `context`.
    pub(crate) fn complete(&self, context: &mut ExecutorContext, canceled: bool) {
        if let Some(continuation) = self.finish(canceled) {
            context.defer(continuation);
        }
    }

    /// Publishes completion and returns the pending continuation, if any.
    pub(crate) fn finish(&self, canceled: bool) -> Option<Continuation> {
        self.canceled.store(canceled, Ordering::Release);
        self.state.store(COMPLETED, Ordering::Release);

        self.take_continuation().map(|continuation| continuation.with_outcome(canceled))
    }

    /// Transfers the queue's strong reference into the header.
    ///
    /// # Panics
    ///
    /// Panics if the executable is already queued.
    pub(crate) fn park(&self, executable: Arc<dyn Executable>) {
        assert!(
            !self.queued.swap(true, Ordering::AcqRel),
            "executable is already queued"
        );

        // Safety: winning the `queued` flag grants exclusive access.
        unsafe { *self.parked.get() = Some(executable) };
    }

    /// Takes back the queue's strong reference after a pop.
    ///
    /// # Safety
    ///
    /// The header must have just been popped from the ready queue by the
    /// calling thread.
    pub(crate) unsafe fn unpark(&self) -> Option<Arc<dyn Executable>> {
        let executable = unsafe { (*self.parked.get()).take() };
        self.queued.store(false, Ordering::Release);
        executable
    }
}

/// Makes `executable` runnable.
///
/// A dormant executable is pushed onto its executor's ready queue; a running
/// one is flagged so it gets re-queued when its poll returns. Scheduling a
/// queued or completed executable is a no-op.
///
/// # Panics
///
/// Panics if the executable was never bound to an executor.
pub(crate) fn schedule(executable: Arc<dyn Executable>) {
    let header = executable.header();

    loop {
        match header.state.load(Ordering::Acquire) {
            current @ (CREATED | SUSPENDED) => {
                if header
                    .state
                    .compare_exchange(current, QUEUED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    let executor = header
                        .executor()
                        .unwrap_or_else(|| panic!("executable scheduled without an executor"));

                    match executor.upgrade() {
                        Some(executor) => executor.push(executable),
                        None => tracing::trace!("dropping wake-up for a shut down executor"),
                    }
                    return;
                }
            }
            RUNNING => {
                if header
                    .state
                    .compare_exchange(RUNNING, NOTIFIED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    return;
                }
            }
            _ => return,
        }
    }
}

/// Re-queues an executable whose [`Header::suspend`] returned `false`.
pub(crate) fn requeue(executable: Arc<dyn Executable>) {
    if let Some(executor) = executable.header().executor().and_then(|e| e.upgrade()) {
        executor.push(executable);
    }
}

