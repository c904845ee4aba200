use super::clock::{Clock, Millisecond};
use crate::coroutine::{Async, yield_now};
use crate::error::Error;

use std::sync::Arc;

/// Completes once `clock` has moved `duration` past the first poll.
///
/// The frame yields between clock reads, so other ready frames keep running
/// while it waits. Fails with [`Error::Clock`] if the clock cannot be read.
pub fn delay(clock: Arc<dyn Clock>, duration: impl Into<Millisecond>) -> Async<(), Error> {
    let duration = duration.into();

    Async::new(async move {
        let deadline = clock.get_time()? + duration;

        while clock.get_time()? < deadline {
            yield_now().await;
        }

        Ok(())
    })
}
