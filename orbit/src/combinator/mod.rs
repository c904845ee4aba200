//! Structured concurrency over tuples of [`Async`](crate::Async) values.
//!
//! - [`all`]: waits for every branch and yields a tuple of results
//! - [`any`]: waits for the first branch to succeed and yields a tuple of
//!   options holding exactly one value
//!
//! Branches run concurrently on the awaiting frame's executor and inherit
//! its cancellation token unless they carry their own.

mod all;
mod any;
mod tuple;

pub use all::{All, all};
pub use any::{Any, any};
pub use tuple::{AssertHasValue, AsyncTuple, Branch, Slot};

use crate::context;
use crate::executable::{Executable, schedule};
use crate::executor::context::{Callback, Continuation, OnTerminate};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const NO_WINNER: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    All,
    Any,
}

/// Termination counter shared by the branches of one combinator.
struct JoinState {
    mode: Mode,
    remaining: AtomicUsize,
    winner: AtomicUsize,
    caller: Arc<dyn Executable>,
}

impl JoinState {
    fn new(mode: Mode, pending: usize, caller: Arc<dyn Executable>) -> Self {
        Self {
            mode,
            remaining: AtomicUsize::new(pending),
            winner: AtomicUsize::new(NO_WINNER),
            caller,
        }
    }

    fn winner(&self) -> Option<usize> {
        match self.winner.load(Ordering::Acquire) {
            NO_WINNER => None,
            index => Some(index),
        }
    }

    fn is_drained(&self) -> bool {
        self.remaining.load(Ordering::Acquire) == 0
    }
}

impl OnTerminate for JoinState {
    fn on_terminate(&self, slot: usize, canceled: bool) -> Option<Arc<dyn Executable>> {
        // The winner is claimed before the count drops, so a drained state
        // always carries the final winner.
        let won = self.mode == Mode::Any
            && !canceled
            && self
                .winner
                .compare_exchange(NO_WINNER, slot, Ordering::AcqRel, Ordering::Acquire)
                .is_ok();
        let last = self.remaining.fetch_sub(1, Ordering::AcqRel) == 1;

        let resume = match self.mode {
            Mode::All => last,
            Mode::Any => won || (last && self.winner().is_none()),
        };

        tracing::trace!(mode = ?self.mode, slot, canceled, resume, "branch terminated");
        resume.then(|| self.caller.clone())
    }
}

/// Starts every branch of `branches` that has not completed yet.
///
/// Returns `None` if no branch is pending, in which case nothing was
/// registered and the caller can settle right away.
///
/// # Panics
///
/// Panics when called outside of a frame poll.
fn launch<T: AsyncTuple>(mode: Mode, branches: &T) -> Option<Arc<JoinState>> {
    let launched = context::with_current(|current, _| {
        let mut pending = 0u16;
        for index in 0..T::LEN {
            if !branches.branch(index).0.header().is_completed() {
                pending |= 1 << index;
            }
        }

        if pending == 0 {
            return None;
        }

        let join = Arc::new(JoinState::new(
            mode,
            pending.count_ones() as usize,
            current.clone(),
        ));

        for index in (0..T::LEN).filter(|&index| pending & (1 << index) != 0) {
            let Branch(branch) = branches.branch(index);
            let header = branch.header();
            header.propagate_from(current.header());

            let callback = Continuation::Callback(Callback::new(join.clone(), index));
            match header.set_continuation(callback) {
                Ok(()) => schedule(branch),
                // Completed since it was counted.
                Err(_) => {
                    if let Some(next) = join.on_terminate(index, header.completed_canceled()) {
                        schedule(next);
                    }
                }
            }
        }

        Some(join)
    });

    match launched {
        Some(join) => join,
        None => panic!("combinator awaited outside of an executor"),
    }
}
