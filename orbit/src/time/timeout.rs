use super::clock::{Clock, Millisecond};
use super::delay::delay;
use crate::cancellation::CancellationToken;
use crate::combinator::any;
use crate::context::current_token;
use crate::coroutine::Async;
use crate::error::Error;

use std::sync::Arc;

/// Bounds `operation` to `duration` as measured by `clock`.
///
/// Both run under a scope token attached to the caller's token. Whichever
/// finishes first decides the result, and the other one is canceled through
/// the scope. Expiry yields [`Error::Timeout`] converted into `E`.
///
/// An operation that already carries its own cancellation token keeps it and
/// is left running when the delay wins.
///
/// # Examples
///
/// ```rust,ignore
/// let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
/// let value = timeout(clock, Duration::from_millis(50), fetch()).await?;
/// ```
pub fn timeout<V, E>(
    clock: Arc<dyn Clock>,
    duration: impl Into<Millisecond>,
    operation: Async<V, E>,
) -> Async<V, E>
where
    V: Send + 'static,
    E: From<Error> + Send + 'static,
{
    let duration = duration.into();

    Async::new(async move {
        let scope = CancellationToken::new();
        if let Some(parent) = current_token() {
            scope.attach_to(&parent);
        }

        let expiry = delay(clock, duration);
        expiry.header().ensure_token(|| scope.clone());
        operation.header().ensure_token(|| scope.clone());

        let (value, expired) = any((operation, expiry)).await;

        scope.trigger();
        scope.detach();

        match (value, expired) {
            (Some(result), _) => result,
            (None, Some(Err(error))) => Err(error.into()),
            (None, _) => {
                tracing::trace!(%duration, "operation timed out");
                Err(Error::Timeout.into())
            }
        }
    })
}
