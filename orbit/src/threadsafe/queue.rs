use std::cell::UnsafeCell;
use std::hint;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};

/// Intrusive link embedded in every element of a [`NonOwningQueue`].
///
/// The link lives inside the caller's storage, so the queue itself never
/// allocates. An element can be a member of at most one queue at a time.
pub struct QueueLink<T> {
    next: AtomicPtr<T>,
    linked: AtomicBool,
}

impl<T> QueueLink<T> {
    pub const fn new() -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
            linked: AtomicBool::new(false),
        }
    }

    /// Returns `true` while the owning element is a member of a queue.
    pub fn is_linked(&self) -> bool {
        self.linked.load(Ordering::Acquire)
    }
}

impl<T> Default for QueueLink<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Types that embed a [`QueueLink`].
///
/// # Safety
///
/// `queue_link` must always return the same link for a given element, and
/// that link must not be used by any other queue.
pub unsafe trait QueueElement: Sized {
    fn queue_link(&self) -> &QueueLink<Self>;
}

/// Lock-free intrusive FIFO linking caller-owned elements.
///
/// Producers push onto an atomic stack with a compare-and-swap retry loop.
/// A consumer claims the queue, detaches the whole stack in a single swap
/// and reverses it into a private list that later pops drain first. Because
/// nodes are only ever removed by detaching the entire stack, the push loop
/// is immune to ABA.
///
/// Elements pushed by the same producer are popped in push order. No order
/// is guaranteed between producers. Concurrent consumers never block: a pop
/// that loses the consumer claim to another thread reports the queue as
/// empty and the caller retries on its next iteration.
pub struct NonOwningQueue<'a, T: QueueElement> {
    /// Producer side, most recent push first.
    head: AtomicPtr<T>,

    /// Consumer side in FIFO order; only touched while `popping` is held.
    drained: UnsafeCell<*mut T>,

    popping: AtomicBool,
    len: AtomicUsize,
    _elements: PhantomData<&'a T>,
}

// Safety: elements are shared between threads by reference, and `drained`
// is only accessed by the holder of the `popping` claim.
unsafe impl<T: QueueElement + Sync> Send for NonOwningQueue<'_, T> {}
unsafe impl<T: QueueElement + Sync> Sync for NonOwningQueue<'_, T> {}

impl<'a, T: QueueElement> NonOwningQueue<'a, T> {
    pub const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            drained: UnsafeCell::new(ptr::null_mut()),
            popping: AtomicBool::new(false),
            len: AtomicUsize::new(0),
            _elements: PhantomData,
        }
    }

    /// Links `element` into the queue.
    ///
    /// # Panics
    ///
    /// Panics if the element is already a member of a queue.
    pub fn push_front(&self, element: &'a T) {
        let link = element.queue_link();
        assert!(
            !link.linked.swap(true, Ordering::AcqRel),
            "element is already linked into a queue"
        );

        // Counted before publication so a racing pop never underflows.
        self.len.fetch_add(1, Ordering::Relaxed);

        let node = element as *const T as *mut T;
        let mut head = self.head.load(Ordering::Relaxed);

        loop {
            link.next.store(head, Ordering::Relaxed);

            // Release publishes the element and its link to the consumer that
            // detaches the stack; failed attempts publish nothing.
            match self.head.compare_exchange_weak(
                head,
                node,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => {
                    head = current;
                    hint::spin_loop();
                }
            }
        }
    }

    /// Unlinks the oldest element, if any.
    ///
    /// Returns `None` when the queue is empty or when another consumer is
    /// currently popping.
    pub fn pop_back(&self) -> Option<&'a T> {
        if self
            .popping
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }

        // Safety: the `popping` claim grants exclusive access to `drained`.
        let drained = unsafe { &mut *self.drained.get() };

        if drained.is_null() {
            // Acquire pairs with the Release of every push in the detached stack.
            let mut stack = self.head.swap(ptr::null_mut(), Ordering::Acquire);
            let mut reversed = ptr::null_mut();

            while !stack.is_null() {
                // Safety: linked elements outlive their membership ('a).
                let link = unsafe { (*stack).queue_link() };
                let next = link.next.load(Ordering::Relaxed);
                link.next.store(reversed, Ordering::Relaxed);
                reversed = stack;
                stack = next;
            }

            *drained = reversed;
        }

        let node = *drained;
        let element = if node.is_null() {
            None
        } else {
            // Safety: see above.
            let element: &'a T = unsafe { &*node };
            let link = element.queue_link();
            *drained = link.next.load(Ordering::Relaxed);
            link.next.store(ptr::null_mut(), Ordering::Relaxed);
            Some(element)
        };

        self.popping.store(false, Ordering::Release);

        if let Some(element) = element {
            self.len.fetch_sub(1, Ordering::Relaxed);
            element.queue_link().linked.store(false, Ordering::Release);
        }

        element
    }

    /// Approximate number of linked elements.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: QueueElement> Default for NonOwningQueue<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}
