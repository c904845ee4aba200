use crate::platform::CoreId;

use std::io;
use thiserror::Error;

/// Errors carried as values through asynchronous call chains.
///
/// Functions signal failure by returning one of these instead of their
/// success value. The awaiting frame receives it through the same
/// continuation link a value would take.
#[derive(Debug, Error)]
pub enum Error {
    /// A deadline elapsed before the guarded operation completed.
    #[error("operation timed out")]
    Timeout,

    /// The operation was canceled through its cancellation token.
    ///
    /// The engine itself reports a canceled frame as a missing result
    /// (`None` from [`Async::move_result_out`](crate::Async::move_result_out)).
    /// This variant is returned by asynchronous functions that check
    /// [`current_token`](crate::current_token) and bail out on their own.
    #[error("operation was canceled")]
    Canceled,

    /// A hardware or platform core failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The clock collaborator could not report the current time.
    #[error(transparent)]
    Clock(#[from] ClockError),

    /// A user-defined failure with a diagnostic message.
    #[error("{0}")]
    Failed(String),
}

impl Error {
    /// Builds a [`Error::Failed`] from any displayable message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Failures reported by a [`Core`](crate::platform::Core) back-end.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("core is already running a workload")]
    AlreadyStarted,

    #[error("core was never started")]
    NotStarted,

    #[error("failed to spawn core thread: {0}")]
    Spawn(#[from] io::Error),

    #[error("{call} failed with code {code}")]
    Os { call: &'static str, code: i32 },

    #[error("workload on core {id} panicked")]
    Panicked { id: CoreId },
}

/// Failures reported by a [`Clock`](crate::time::Clock).
#[derive(Debug, Error)]
pub enum ClockError {
    #[error("clock source is unavailable")]
    Unavailable,
}
