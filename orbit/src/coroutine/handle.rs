use super::frame::{Frame, Promise};
use crate::cancellation::CancellationToken;
use crate::context;
use crate::error::Error;
use crate::executable::{Executable, Header};
use crate::executor::Executor;
use crate::executor::context::Continuation;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

type SharedPromise<T> = Arc<dyn Promise<T> + Send + Sync>;

/// Handle to an asynchronous function invocation.
///
/// An `Async` is lazy: its body does not run until it is awaited from a
/// running frame or admitted into an [`Executor`]. Awaiting it yields the
/// function's `Result`. Errors travel up the continuation chain as plain
/// values.
///
/// Dropping the handle of a frame that is still pending detaches it: the
/// frame keeps running to completion and its result is discarded.
///
/// # Examples
///
/// ```rust,ignore
/// fn double(x: u32) -> Async<u32> {
///     Async::new(async move { Ok(x * 2) })
/// }
///
/// let result = Async::<u32>::new(async {
///     let a = double(2).await?;
///     Ok(a + double(3).await?)
/// })
/// .sync();
///
/// assert_eq!(result.unwrap().unwrap(), 10);
/// ```
pub struct Async<V, E = Error> {
    promise: SharedPromise<Result<V, E>>,

    /// Set once the frame was scheduled on behalf of an awaiting frame.
    awaiting: bool,
    taken: bool,
}

impl<V, E> Async<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    /// Wraps `future` into a new, not yet started, frame.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<V, E>> + Send + 'static,
    {
        Self {
            promise: Frame::new(future),
            awaiting: false,
            taken: false,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.header().is_completed()
    }

    /// Returns `true` if the frame completed through cancellation.
    pub fn is_canceled(&self) -> bool {
        self.header().completed_canceled()
    }

    /// Scopes this invocation under `token` instead of the awaiting frame's.
    ///
    /// # Panics
    ///
    /// Panics if a token was already installed.
    pub fn set_cancellation_token(&mut self, token: CancellationToken) {
        self.header().set_token(token);
    }

    /// Moves the final result out of a completed frame.
    ///
    /// Returns `None` if the frame was canceled.
    ///
    /// # Panics
    ///
    /// Panics if the frame has not completed yet, or if the result was
    /// already moved out.
    pub fn move_result_out(&mut self) -> Option<Result<V, E>> {
        assert!(
            self.is_completed(),
            "result of an Async queried before completion"
        );
        self.take()
    }

    /// Admits this invocation into `executor` and drains it.
    ///
    /// Returns `None` if the invocation was canceled or did not complete
    /// before the executor stopped.
    pub fn run(mut self, executor: &Executor) -> Option<Result<V, E>> {
        executor.enqueue(&self);
        executor.run();

        if self.is_completed() {
            self.take()
        } else {
            None
        }
    }

    /// Runs this invocation to completion on a fresh single-core executor.
    pub fn sync(self) -> Option<Result<V, E>> {
        let executor = Executor::new();
        self.run(&executor)
    }

    /// Awaits the value, aborting on error.
    ///
    /// Use it where a failure of the callee is a bug in the caller.
    pub fn propagate(self) -> Propagate<V, E> {
        Propagate { inner: self }
    }

    /// Awaits completion and discards the result.
    pub fn no_return(self) -> NoReturn<V, E> {
        NoReturn { inner: self }
    }

    pub(crate) fn header(&self) -> &Header {
        self.promise.header()
    }

    pub(crate) fn executable(&self) -> Arc<dyn Executable> {
        self.promise.clone().executable()
    }

    /// Moves the result out of a completed frame, once.
    pub(crate) fn take(&mut self) -> Option<Result<V, E>> {
        assert!(!self.taken, "result of an Async was already moved out");
        self.taken = true;
        self.promise.take_result()
    }
}

/// Suspension protocol shared by every awaiter.
///
/// Returns `true` when `header` completed before the awaiting frame could be
/// registered as its continuation.
pub(crate) fn await_frame(header: &Header, executable: impl FnOnce() -> Arc<dyn Executable>) -> bool {
    let registered = context::with_current(|current, context| {
        header.propagate_from(current.header());

        match header.set_continuation(Continuation::Executable(current.clone())) {
            Ok(()) => {
                context.then_enqueue_executable(executable());
                true
            }
            Err(_) => false,
        }
    });

    match registered {
        Some(registered) => !registered,
        None => panic!("Async awaited outside of an executor"),
    }
}

impl<V, E> Future for Async<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    type Output = Result<V, E>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if !this.is_completed() {
            if this.awaiting {
                return Poll::Pending;
            }

            if !await_frame(this.header(), || this.executable()) {
                this.awaiting = true;
                return Poll::Pending;
            }
        }

        match this.take() {
            Some(result) => Poll::Ready(result),
            None => {
                // A canceled callee cancels its awaiter.
                context::cancel_current();
                Poll::Pending
            }
        }
    }
}

impl<V, E> fmt::Debug for Async<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Async")
            .field("completed", &self.promise.header().is_completed())
            .field("awaiting", &self.awaiting)
            .finish()
    }
}

/// Awaiter returned by [`Async::propagate`].
#[must_use = "futures do nothing unless awaited"]
pub struct Propagate<V, E> {
    inner: Async<V, E>,
}

impl<V, E> Future for Propagate<V, E>
where
    V: Send + 'static,
    E: fmt::Debug + Send + 'static,
{
    type Output = V;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<V> {
        match Pin::new(&mut self.inner).poll(cx) {
            Poll::Ready(Ok(value)) => Poll::Ready(value),
            Poll::Ready(Err(error)) => panic!("propagated asynchronous call failed: {error:?}"),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Awaiter returned by [`Async::no_return`].
#[must_use = "futures do nothing unless awaited"]
pub struct NoReturn<V, E> {
    inner: Async<V, E>,
}

impl<V, E> Future for NoReturn<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        Pin::new(&mut self.inner).poll(cx).map(drop)
    }
}
