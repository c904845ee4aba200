//! Hardware execution units.
//!
//! The executor only talks to cores through the four operations of the
//! [`Core`] trait. Back-ends provided here:
//!
//! - [`ThreadCore`]: portable, backed by `std::thread`
//! - [`PosixCore`]: Linux `pthread` on a caller-sized, instrumented stack

#[cfg(target_os = "linux")]
mod posix;
mod thread;

#[cfg(target_os = "linux")]
pub use posix::PosixCore;
pub use thread::ThreadCore;

use crate::error::CoreError;

use std::fmt;
use std::sync::Arc;

/// Identifier of a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CoreId(pub u32);

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stack consumption of a core, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StackSize {
    /// High-water mark, or `0` when the back-end cannot measure it.
    pub used: usize,
    pub total: usize,
}

/// Function run by a core. Receives the id of the core running it.
pub type Workload = Arc<dyn Fn(CoreId) + Send + Sync>;

/// A hardware or platform execution unit.
pub trait Core: Send + Sync {
    /// Starts running `workload` on this core and returns immediately.
    fn start(&self, workload: Workload) -> Result<(), CoreError>;

    /// Blocks until the workload returned.
    fn stop(&self) -> Result<(), CoreError>;

    fn stack_usage(&self) -> StackSize;

    fn id(&self) -> CoreId;
}
