use super::spin::SpinMutex;

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

/// Intrusive link embedded in every element of a [`NonOwningRingSpin`].
pub struct RingLink<T> {
    next: UnsafeCell<*const T>,
    linked: AtomicBool,
}

// Safety: `next` is only read or written while the owning ring is locked.
unsafe impl<T> Send for RingLink<T> {}
unsafe impl<T> Sync for RingLink<T> {}

impl<T> RingLink<T> {
    pub const fn new() -> Self {
        Self {
            next: UnsafeCell::new(ptr::null()),
            linked: AtomicBool::new(false),
        }
    }

    pub fn is_linked(&self) -> bool {
        self.linked.load(Ordering::Acquire)
    }
}

impl<T> Default for RingLink<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Types that embed a [`RingLink`].
///
/// # Safety
///
/// `ring_link` must always return the same link for a given element, and
/// that link must not be used by any other ring.
pub unsafe trait RingElement: Sized {
    fn ring_link(&self) -> &RingLink<Self>;
}

struct Ends<T> {
    head: *const T,
    tail: *const T,
    len: usize,
}

/// Intrusive circular list guarded by a spin lock.
///
/// Supports pushing at both ends and popping from the front. A filtered
/// pop rotates non-matching elements to the back, so repeated scans visit
/// members fairly.
pub struct NonOwningRingSpin<'a, T: RingElement> {
    ends: SpinMutex<Ends<T>>,
    _elements: PhantomData<&'a T>,
}

// Safety: the raw pointers in `Ends` refer to `&'a T` elements shared across
// threads, and are only dereferenced under the lock.
unsafe impl<T: RingElement + Sync> Send for NonOwningRingSpin<'_, T> {}
unsafe impl<T: RingElement + Sync> Sync for NonOwningRingSpin<'_, T> {}

impl<'a, T: RingElement> NonOwningRingSpin<'a, T> {
    pub const fn new() -> Self {
        Self {
            ends: SpinMutex::new(Ends {
                head: ptr::null(),
                tail: ptr::null(),
                len: 0,
            }),
            _elements: PhantomData,
        }
    }

    /// Appends `element` behind the current tail.
    pub fn push_back(&self, element: &'a T) {
        let mut ends = self.ends.lock();
        Self::link(&mut ends, element);
        ends.tail = element;
    }

    /// Inserts `element` before the current head.
    pub fn push_front(&self, element: &'a T) {
        let mut ends = self.ends.lock();
        Self::link(&mut ends, element);
        ends.head = element;
    }

    /// Removes the first element for which `predicate` holds.
    ///
    /// Elements that do not match are rotated to the back of the ring. Every
    /// member is visited at most once per call.
    pub fn pop_front_if(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<&'a T> {
        let mut ends = self.ends.lock();

        for _ in 0..ends.len {
            // Safety: members outlive their membership ('a).
            let head: &'a T = unsafe { &*ends.head };

            if !predicate(head) {
                ends.tail = ends.head;
                ends.head = unsafe { *head.ring_link().next.get() };
                continue;
            }

            if ends.len == 1 {
                ends.head = ptr::null();
                ends.tail = ptr::null();
            } else {
                // Safety: the lock is held, so every `next` cell is exclusive.
                unsafe {
                    ends.head = *head.ring_link().next.get();
                    *(*ends.tail).ring_link().next.get() = ends.head;
                }
            }

            ends.len -= 1;
            drop(ends);

            let link = head.ring_link();
            unsafe { *link.next.get() = ptr::null() };
            link.linked.store(false, Ordering::Release);

            return Some(head);
        }

        None
    }

    pub fn pop_front(&self) -> Option<&'a T> {
        self.pop_front_if(|_| true)
    }

    /// Unlinks every member.
    pub fn clear(&self) {
        while self.pop_front().is_some() {}
    }

    pub fn len(&self) -> usize {
        self.ends.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visits every member in ring order while holding the lock.
    pub fn for_each(&self, mut f: impl FnMut(&T)) {
        let ends = self.ends.lock();
        let mut node = ends.head;

        for _ in 0..ends.len {
            // Safety: members outlive their membership and the lock is held.
            let element = unsafe { &*node };
            f(element);
            node = unsafe { *element.ring_link().next.get() };
        }
    }

    /// Splices `element` between tail and head; callers fix up the ends.
    fn link(ends: &mut Ends<T>, element: &'a T) {
        let link = element.ring_link();
        assert!(
            !link.linked.swap(true, Ordering::AcqRel),
            "element is already linked into a ring"
        );

        let node = element as *const T;

        // Safety: the lock is held by the caller.
        unsafe {
            if ends.len == 0 {
                *link.next.get() = node;
                ends.head = node;
                ends.tail = node;
            } else {
                *link.next.get() = ends.head;
                *(*ends.tail).ring_link().next.get() = node;
            }
        }

        ends.len += 1;
    }
}

impl<T: RingElement> Default for NonOwningRingSpin<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}
