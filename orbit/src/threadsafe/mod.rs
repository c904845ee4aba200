//! Allocation-free concurrent containers.
//!
//! Both containers are *non-owning*: elements embed their own link and live
//! in caller storage. The containers only thread pointers through those
//! links, and callers guarantee that an element outlives its membership.
//!
//! - [`NonOwningQueue`] is a lock-free multi-producer, multi-consumer FIFO.
//! - [`NonOwningRingSpin`] is a spin-locked circular list with filtered pops.

mod queue;
mod ring;
mod spin;

pub use queue::{NonOwningQueue, QueueElement, QueueLink};
pub use ring::{NonOwningRingSpin, RingElement, RingLink};
pub use spin::{SpinGuard, SpinMutex};
