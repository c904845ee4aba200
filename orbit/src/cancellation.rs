//! Cooperative cancellation tree.
//!
//! A [`CancellationToken`] is a node in a parent/child hierarchy. Triggering
//! a node cancels it and its whole subtree in one pass; ancestors are never
//! affected. Parents hold only weak references to their children, so a child
//! may be dropped at any time without leaving a dangling registration.
//!
//! Cancellation is advisory: it flips state that asynchronous functions (and
//! the executor, before resuming a frame) observe at their suspension points.

use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll, Waker};

const NOT_CANCELED: u8 = 0;
const CANCELED_LOCALLY: u8 = 1;
const CANCELED_BY_ANCESTOR: u8 = 2;

/// Observable state of a [`CancellationToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelState {
    NotCanceled,
    /// [`CancellationToken::trigger`] was called on this token.
    CanceledLocally,
    /// An ancestor was triggered.
    CanceledByAncestor,
}

struct Node {
    state: AtomicU8,
    parent: Mutex<Option<Weak<Node>>>,
    children: Mutex<Vec<Weak<Node>>>,
    wakers: Mutex<Vec<Waker>>,
}

impl Node {
    /// Moves the node out of `NOT_CANCELED`. Returns `false` if it already was.
    fn cancel(&self, state: u8) -> bool {
        if self
            .state
            .compare_exchange(NOT_CANCELED, state, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let wakers = mem::take(&mut *self.wakers.lock().unwrap());
        for waker in wakers {
            waker.wake();
        }

        true
    }

    fn is_canceled(&self) -> bool {
        self.state.load(Ordering::Acquire) != NOT_CANCELED
    }
}

/// Handle to a node of the cancellation tree.
///
/// Cloning the handle shares the node.
#[derive(Clone)]
pub struct CancellationToken {
    node: Arc<Node>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            node: Arc::new(Node {
                state: AtomicU8::new(NOT_CANCELED),
                parent: Mutex::new(None),
                children: Mutex::new(Vec::new()),
                wakers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Creates a new token already attached to `self`.
    pub fn child(&self) -> Self {
        let child = Self::new();
        child.attach_to(self);
        child
    }

    /// Registers this token as a child of `parent`.
    ///
    /// If `parent` is already canceled, this token becomes canceled by its
    /// ancestor before the call returns.
    ///
    /// # Panics
    ///
    /// Panics if the token is already attached to a parent.
    pub fn attach_to(&self, parent: &CancellationToken) {
        {
            let mut slot = self.node.parent.lock().unwrap();
            assert!(
                slot.is_none(),
                "cancellation token is already attached to a parent"
            );
            *slot = Some(Arc::downgrade(&parent.node));
        }

        {
            let mut children = parent.node.children.lock().unwrap();
            children.retain(|child| child.strong_count() > 0);
            children.push(Arc::downgrade(&self.node));
        }

        // A trigger that took the children lock before our push has already
        // published its flag, so it is visible here.
        if parent.node.is_canceled() {
            self.cancel_subtree(CANCELED_BY_ANCESTOR);
        }
    }

    /// Unregisters this token from its parent, if any.
    ///
    /// The current cancel state is kept.
    pub fn detach(&self) {
        let Some(parent) = self.node.parent.lock().unwrap().take() else {
            return;
        };

        if let Some(parent) = parent.upgrade() {
            let me = Arc::downgrade(&self.node);
            parent
                .children
                .lock()
                .unwrap()
                .retain(|child| !child.ptr_eq(&me) && child.strong_count() > 0);
        }
    }

    /// Cancels this token and all of its descendants.
    ///
    /// Calling it more than once has no further effect.
    pub fn trigger(&self) {
        self.cancel_subtree(CANCELED_LOCALLY);
    }

    pub fn is_canceled(&self) -> bool {
        self.node.is_canceled()
    }

    pub fn state(&self) -> CancelState {
        match self.node.state.load(Ordering::Acquire) {
            NOT_CANCELED => CancelState::NotCanceled,
            CANCELED_LOCALLY => CancelState::CanceledLocally,
            _ => CancelState::CanceledByAncestor,
        }
    }

    /// Wakes `waker` once this token gets canceled.
    ///
    /// The waker is woken immediately if the token is already canceled.
    pub fn register_waker(&self, waker: &Waker) {
        let mut wakers = self.node.wakers.lock().unwrap();

        if self.node.is_canceled() {
            drop(wakers);
            waker.wake_by_ref();
            return;
        }

        if !wakers.iter().any(|w| w.data() == waker.data()) {
            wakers.push(waker.clone());
        }
    }

    /// Forgets every registered waker whose data pointer is `data`.
    pub(crate) fn forget_waker(&self, data: *const ()) {
        self.node
            .wakers
            .lock()
            .unwrap()
            .retain(|w| w.data() != data);
    }

    /// Returns a future that resolves once this token is canceled.
    pub fn canceled(&self) -> Canceled {
        Canceled {
            token: self.clone(),
        }
    }

    /// Returns `true` if both handles refer to the same node.
    pub fn same_as(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    fn cancel_subtree(&self, state: u8) {
        if !self.node.cancel(state) {
            return;
        }

        // Iterative walk keeps deep hierarchies off the native stack.
        let mut pending = vec![self.node.clone()];

        while let Some(node) = pending.pop() {
            let children = node
                .children
                .lock()
                .unwrap()
                .iter()
                .filter_map(Weak::upgrade)
                .collect::<Vec<_>>();

            for child in children {
                if child.cancel(CANCELED_BY_ANCESTOR) {
                    pending.push(child);
                }
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("state", &self.state())
            .finish()
    }
}

/// Future returned by [`CancellationToken::canceled`].
pub struct Canceled {
    token: CancellationToken,
}

impl Future for Canceled {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.token.is_canceled() {
            return Poll::Ready(());
        }

        self.token.register_waker(cx.waker());

        if self.token.is_canceled() {
            return Poll::Ready(());
        }

        Poll::Pending
    }
}
