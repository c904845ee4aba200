//! # Orbit
//!
//! **Orbit** is a cooperative execution engine for asynchronous functions,
//! built for the **Nebula** ecosystem where every core runs a tight loop over
//! a shared, lock-free ready queue.
//!
//! Unlike general-purpose runtimes, Orbit has no reactor and no timer wheel.
//! It focuses on the scheduling core:
//!
//! - **Lazy invocations**: an [`Async`] does nothing until it is awaited or
//!   admitted into an [`Executor`], and its frame is a single allocation
//! - **Continuation passing**: a completed frame hands its caller straight
//!   back to the run loop, with no intermediate wake-up queue
//! - **Intrusive queues**: the ready queue and the core registry never
//!   allocate
//! - **Cancellation trees**: every invocation inherits its caller's
//!   [`CancellationToken`]
//! - **Structured concurrency**: [`all`] and [`any`] over tuples of
//!   invocations
//! - **Ergonomic macros** like `#[orbit::main]`, `#[orbit::test]`, `all!` and
//!   `any!`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use orbit::Async;
//!
//! fn fibonacci(n: u64) -> Async<u64> {
//!     Async::new(async move {
//!         if n < 2 {
//!             return Ok(n);
//!         }
//!         let (a, b) = orbit::all!(fibonacci(n - 1), fibonacci(n - 2)).await;
//!         Ok(a? + b?)
//!     })
//! }
//!
//! #[orbit::main]
//! async fn main() {
//!     let value = fibonacci(10).await?;
//!     println!("fibonacci(10) = {value}");
//! }
//! ```
//!
//! ## Modules
//!
//! - [`coroutine`]: asynchronous functions, generators and awaiters
//! - [`executor`]: run loop, multi-core binding and profiling hook
//! - [`combinator`]: `all` and `any`
//! - [`cancellation`]: the cancellation tree
//! - [`platform`]: the [`Core`] abstraction and its back-ends
//! - [`threadsafe`]: non-owning queue and ring
//! - [`time`]: clocks, `delay` and `timeout`
//!
//! ## Getting Started
//!
//! Add Orbit to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! orbit = { git = "https://github.com/Nebula-ecosystem/Orbit", package = "orbit" }
//! ```

mod context;
mod error;
mod executable;

pub mod cancellation;
pub mod combinator;
pub mod coroutine;
pub mod executor;
pub mod platform;
pub mod threadsafe;
pub mod time;

pub use cancellation::{CancelState, CancellationToken};
pub use combinator::{AssertHasValue, all, any};
pub use context::current_token;
pub use coroutine::{Async, Emitter, Generator, yield_now};
pub use error::{ClockError, CoreError, Error};
pub use executor::{
    ExecutableKind, Executor, ExecutorBuilder, MultiCoreExecutor, NoopProfiler, Profiler,
    ProfilerEvent, TracingProfiler,
};
#[cfg(target_os = "linux")]
pub use platform::PosixCore;
pub use platform::{Core, CoreId, StackSize, ThreadCore};

pub use orbit_macros::*;
