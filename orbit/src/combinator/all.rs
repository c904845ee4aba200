use super::{AsyncTuple, JoinState, Mode, launch};
use crate::context;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Future returned by [`all`].
#[must_use = "futures do nothing unless awaited"]
pub struct All<T> {
    branches: T,
    join: Option<Arc<JoinState>>,
}

/// Runs every branch concurrently and waits for all of them.
///
/// Resolves to the tuple of their results, in branch order. If any branch
/// is canceled, the awaiting frame is canceled too.
///
/// # Examples
///
/// ```rust,ignore
/// let (a, b) = all((fetch(1), fetch(2))).await;
/// ```
pub fn all<T: AsyncTuple>(branches: T) -> All<T> {
    All {
        branches,
        join: None,
    }
}

impl<T: AsyncTuple> All<T> {
    fn is_settled(&self) -> bool {
        (0..T::LEN).all(|index| self.branches.branch(index).0.header().is_completed())
    }
}

impl<T: AsyncTuple> Future for All<T> {
    type Output = T::Results;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.join.is_none() {
            this.join = launch(Mode::All, &this.branches);
            if this.join.is_some() {
                return Poll::Pending;
            }
        } else if !this.is_settled() {
            return Poll::Pending;
        }

        match this.branches.take_results() {
            Some(results) => Poll::Ready(results),
            None => {
                context::cancel_current();
                Poll::Pending
            }
        }
    }
}
