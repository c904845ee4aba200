use super::waker::make_waker;
use crate::context;
use crate::executable::{Executable, Header, requeue};
use crate::executor::context::ExecutorContext;

use std::cell::UnsafeCell;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// Typed access to a frame's result, independent of its future type.
pub(crate) trait Promise<T>: Send + Sync {
    fn header(&self) -> &Header;

    fn executable(self: Arc<Self>) -> Arc<dyn Executable>;

    /// Moves the result out.
    ///
    /// Returns `None` if the frame was canceled or the result was already
    /// taken. Callers must have observed completion first.
    fn take_result(&self) -> Option<T>;
}

/// Invocation frame of an asynchronous function.
///
/// Owns the future and, once it completes, its output. The future is polled
/// in place and never moves: the frame only lives behind an `Arc`.
pub(crate) struct Frame<F: Future> {
    header: Header,

    /// `None` once the future completed or was canceled.
    future: UnsafeCell<Option<F>>,

    result: UnsafeCell<Option<F::Output>>,
}

// Safety: `future` is only touched by the core that moved the frame to
// RUNNING, and `result` is written before COMPLETED is published and read by
// the single handle owner after observing it.
unsafe impl<F: Future + Send> Send for Frame<F> where F::Output: Send {}
unsafe impl<F: Future + Send> Sync for Frame<F> where F::Output: Send {}

impl<F> Frame<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    pub(crate) fn new(future: F) -> Arc<Self> {
        Arc::new(Self {
            header: Header::new(),
            future: UnsafeCell::new(Some(future)),
            result: UnsafeCell::new(None),
        })
    }

    fn poll_future(
        self: &Arc<Self>,
        context: &mut ExecutorContext,
        waker: &Waker,
    ) -> Poll<F::Output> {
        let mut cx = Context::from_waker(waker);

        context::enter(self.clone(), context, || {
            // Safety: RUNNING grants exclusive access, and the future is
            // pinned by the `Arc` allocation.
            match unsafe { &mut *self.future.get() } {
                Some(future) => unsafe { Pin::new_unchecked(future) }.poll(&mut cx),
                None => Poll::Pending,
            }
        })
    }

    /// Lets a trigger of the frame's token reschedule it while it is parked,
    /// so the executor gets to finalize it.
    fn watch_token(&self, waker: &Waker) {
        if let Some(token) = self.header.token() {
            token.register_waker(waker);
        }
    }

    /// Drops the registration made by [`watch_token`](Self::watch_token).
    fn unwatch_token(&self) {
        if let Some(token) = self.header.token() {
            token.forget_waker((self as *const Self).cast());
        }
    }

    /// Drops the future in place.
    ///
    /// # Safety
    ///
    /// The caller must hold the RUNNING claim.
    unsafe fn drop_future(&self) {
        unsafe { *self.future.get() = None };
    }
}

impl<F> Executable for Frame<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    fn header(&self) -> &Header {
        &self.header
    }

    fn resume(self: Arc<Self>, context: &mut ExecutorContext) {
        if !self.header.claim() {
            return;
        }

        self.unwatch_token();
        let waker = make_waker(self.clone());

        match self.poll_future(context, &waker) {
            Poll::Ready(output) => {
                unsafe {
                    self.drop_future();
                    *self.result.get() = Some(output);
                }
                self.header.complete(context, false);
            }
            Poll::Pending => {
                if self.header.take_cancel_request() {
                    tracing::trace!("frame canceled at its suspension point");
                    unsafe { self.drop_future() };
                    self.header.complete(context, true);
                    return;
                }

                if self.header.take_step() {
                    if let Some(continuation) = self.header.take_continuation() {
                        context.defer(continuation);
                    }
                }

                self.watch_token(&waker);
                drop(waker);

                if !self.header.suspend() {
                    requeue(self);
                }
            }
        }
    }

    fn cancel(self: Arc<Self>, context: &mut ExecutorContext) {
        if !self.header.claim() {
            return;
        }

        self.unwatch_token();
        unsafe { self.drop_future() };
        self.header.complete(context, true);
    }

    fn release(&self) {
        if !self.header.claim() {
            return;
        }

        self.unwatch_token();
        unsafe { self.drop_future() };
        drop(self.header.finish(true));
    }
}

impl<F> Promise<F::Output> for Frame<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    fn header(&self) -> &Header {
        &self.header
    }

    fn executable(self: Arc<Self>) -> Arc<dyn Executable> {
        self
    }

    fn take_result(&self) -> Option<F::Output> {
        // Safety: the result is never written again after COMPLETED, and the
        // handle owning this promise is the only reader.
        unsafe { (*self.result.get()).take() }
    }
}
