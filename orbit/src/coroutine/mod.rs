//! Asynchronous functions and sequences.
//!
//! - [`Async`]: single-shot handle over an invocation frame
//! - [`Generator`]: lazy sequence produced through an [`Emitter`]
//! - [`Propagate`] and [`NoReturn`]: specialized awaiters
//! - [`yield_now`]: explicit suspension point

mod frame;
mod generator;
mod handle;
mod waker;
mod yield_now;

pub use generator::{Emit, Emitter, Generator, Next};
pub use handle::{Async, NoReturn, Propagate};
pub use yield_now::{YieldNow, yield_now};
