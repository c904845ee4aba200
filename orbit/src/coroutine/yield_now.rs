use crate::context;
use crate::executable::schedule;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Awaiter returned by [`yield_now`].
#[must_use = "yield_now does nothing unless awaited"]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;

        // Scheduling a running frame flags it NOTIFIED, so the run loop
        // pushes it behind the current queue content once this poll returns.
        let requeued = context::with_current(|executable, _| schedule(executable.clone()));
        if requeued.is_none() {
            cx.waker().wake_by_ref();
        }

        Poll::Pending
    }
}

/// Explicit suspension point.
///
/// Lets every other ready frame run once before the caller continues.
///
/// # Examples
///
/// ```rust,ignore
/// Async::<()>::new(async {
///     while !done() {
///         yield_now().await;
///     }
///     Ok(())
/// })
/// ```
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}
