use crate::cancellation::CancellationToken;
use crate::executable::Executable;
use crate::executor::context::ExecutorContext;

use std::cell::RefCell;
use std::ptr::NonNull;
use std::sync::Arc;

/// The frame being polled on this thread, and the context of the core
/// polling it.
struct Scope {
    executable: Arc<dyn Executable>,
    context: NonNull<ExecutorContext>,
}

thread_local! {
    /// Set by the run loop for the duration of a single poll.
    ///
    /// Awaiters use it to reach the awaiting frame and the per-core
    /// continuation slot without threading them through `Future::poll`.
    static CURRENT_FRAME: RefCell<Option<Scope>> = const { RefCell::new(None) };
}

/// Restores the previous scope, even when the poll unwinds.
struct Restore(Option<Scope>);

impl Drop for Restore {
    fn drop(&mut self) {
        let previous = self.0.take();
        let _ = CURRENT_FRAME.try_with(|cell| cell.replace(previous));
    }
}

/// Installs `executable` as the current frame while `f` runs.
///
/// The previous scope is restored afterwards, so nested run loops (an
/// executor driven from inside a frame) see their own frames.
pub(crate) fn enter<R>(
    executable: Arc<dyn Executable>,
    context: &mut ExecutorContext,
    f: impl FnOnce() -> R,
) -> R {
    let scope = Scope {
        executable,
        context: NonNull::from(context),
    };

    let _restore = Restore(CURRENT_FRAME.with(|cell| cell.replace(Some(scope))));

    f()
}

/// Runs `f` with the current frame and its core's context.
///
/// Returns `None` when called outside of a frame poll. `f` must not call
/// back into this function.
pub(crate) fn with_current<R>(
    f: impl FnOnce(&Arc<dyn Executable>, &mut ExecutorContext) -> R,
) -> Option<R> {
    CURRENT_FRAME.with(|cell| {
        let scope = cell.borrow();
        let scope = scope.as_ref()?;

        // Safety: the context outlives `enter`, and the run loop does not
        // touch it while the frame is polled.
        let context = unsafe { &mut *scope.context.as_ptr() };

        Some(f(&scope.executable, context))
    })
}

/// Requests cancellation of the frame being polled.
///
/// The executor finalizes the frame as canceled once its poll returns.
pub(crate) fn cancel_current() {
    let canceled = with_current(|executable, _| executable.header().request_cancel());
    assert!(canceled.is_some(), "cancellation requested outside of a frame");
}

/// Flags that the frame being polled produced a generator item.
pub(crate) fn mark_step() {
    let marked = with_current(|executable, _| executable.header().mark_step());
    assert!(marked.is_some(), "generator item emitted outside of its frame");
}

/// Returns the cancellation token of the frame being polled.
///
/// Returns `None` outside of a frame, or when the frame has no token.
pub fn current_token() -> Option<CancellationToken> {
    with_current(|executable, _| executable.header().token()).flatten()
}
