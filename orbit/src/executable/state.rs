/// Frame exists but was never scheduled.
pub(crate) const CREATED: u8 = 0;

/// Frame is linked into an executor's ready queue.
pub(crate) const QUEUED: u8 = 1;

/// Frame is being polled by a core.
///
/// At most one core may observe this state at a time.
pub(crate) const RUNNING: u8 = 2;

/// Frame was woken while running.
///
/// It is re-queued once the current poll returns.
pub(crate) const NOTIFIED: u8 = 3;

/// Frame is parked at a suspension point, waiting to be re-scheduled.
pub(crate) const SUSPENDED: u8 = 4;

/// Frame has produced its result (or was canceled) and will never run again.
pub(crate) const COMPLETED: u8 = 5;
