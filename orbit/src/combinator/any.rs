use super::{AsyncTuple, JoinState, Mode, launch};
use crate::context;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Future returned by [`any`].
#[must_use = "futures do nothing unless awaited"]
pub struct Any<T> {
    branches: T,
    join: Option<Arc<JoinState>>,
}

/// Runs every branch concurrently and waits for the first one to succeed.
///
/// Resolves to a tuple of options where only the winner's slot is `Some`.
/// Losing branches are not canceled: they keep running detached unless the
/// caller cancels their token. If every branch is canceled, the awaiting
/// frame is canceled too.
///
/// # Examples
///
/// ```rust,ignore
/// let (fast, slow) = any((fetch_cached(), fetch_remote())).await;
/// ```
pub fn any<T: AsyncTuple>(branches: T) -> Any<T> {
    Any {
        branches,
        join: None,
    }
}

impl<T: AsyncTuple> Any<T> {
    /// First branch that already completed without being canceled.
    fn completed_winner(&self) -> Option<usize> {
        (0..T::LEN).find(|&index| {
            let branch = self.branches.branch(index);
            let header = branch.0.header();
            header.is_completed() && !header.completed_canceled()
        })
    }

    fn settle(&mut self, winner: Option<usize>) -> Poll<T::Options> {
        match winner {
            Some(index) => Poll::Ready(self.branches.take_option(index)),
            None => {
                context::cancel_current();
                Poll::Pending
            }
        }
    }
}

impl<T: AsyncTuple> Future for Any<T> {
    type Output = T::Options;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        let state = this
            .join
            .as_ref()
            .map(|join| (join.is_drained(), join.winner()));

        match state {
            None => {
                if let Some(index) = this.completed_winner() {
                    return this.settle(Some(index));
                }

                this.join = launch(Mode::Any, &this.branches);
                match this.join {
                    Some(_) => Poll::Pending,
                    // Every branch had already been canceled.
                    None => this.settle(None),
                }
            }
            Some((_, Some(index))) => this.settle(Some(index)),
            Some((true, None)) => this.settle(None),
            Some((false, None)) => Poll::Pending,
        }
    }
}
