use super::frame::Frame;
use crate::executable::schedule;

use std::marker::PhantomData;
use std::mem;
use std::sync::Arc;
use std::task::{RawWaker, RawWakerVTable, Waker};

/// Per-future-type vtable holder.
struct VTable<F>(PhantomData<F>);

impl<F> VTable<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    /// Every function receives a pointer obtained from `Arc::into_raw` on an
    /// `Arc<Frame<F>>` and keeps its reference count balanced.
    const VTABLE: RawWakerVTable = RawWakerVTable::new(
        clone_raw::<F>,
        wake_raw::<F>,
        wake_by_ref_raw::<F>,
        drop_raw::<F>,
    );
}

fn vtable<F>() -> &'static RawWakerVTable
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    &VTable::<F>::VTABLE
}

/// Creates a [`Waker`] that schedules `frame` when woken.
pub(crate) fn make_waker<F>(frame: Arc<Frame<F>>) -> Waker
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    unsafe {
        Waker::from_raw(RawWaker::new(
            Arc::into_raw(frame) as *const (),
            vtable::<F>(),
        ))
    }
}

fn clone_raw<F>(ptr: *const ()) -> RawWaker
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let arc = unsafe { Arc::<Frame<F>>::from_raw(ptr as *const Frame<F>) };
    let cloned = arc.clone();
    mem::forget(arc);

    RawWaker::new(Arc::into_raw(cloned) as *const (), vtable::<F>())
}

/// Consumes the waker's reference.
fn wake_raw<F>(ptr: *const ())
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let arc = unsafe { Arc::<Frame<F>>::from_raw(ptr as *const Frame<F>) };
    schedule(arc);
}

fn wake_by_ref_raw<F>(ptr: *const ())
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let arc = unsafe { Arc::<Frame<F>>::from_raw(ptr as *const Frame<F>) };
    schedule(arc.clone());
    mem::forget(arc);
}

fn drop_raw<F>(ptr: *const ())
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    unsafe { Arc::<Frame<F>>::from_raw(ptr as *const Frame<F>) };
}
